//! Apply engine
//!
//! Writes a patch to the live tree and returns whatever could not be
//! applied as a residual patch. Order is removals, then additions, then
//! updates. Nothing here fails the whole call: unsupported classes, bad
//! references and rejected writes all end up in the residual.

use crate::decode::decode_value;
use crate::instance_map::InstanceMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};
use treesync_core::{LiveHandle, LiveTree, PatchSet, PatchUpdate, Removal, Variant};

/// Apply `patch`, returning the residual of everything not applied
///
/// Every handle written to is paused in `instances` so the host can tell
/// its own change notifications apart from ours.
pub fn apply<T: LiveTree + ?Sized>(
    instances: &mut InstanceMap,
    tree: &mut T,
    patch: &PatchSet,
) -> PatchSet {
    let mut applier = Applier {
        instances,
        tree,
        patch,
        residual: PatchSet::new(),
        residual_updates: BTreeMap::new(),
        deferred_refs: Vec::new(),
        visited: BTreeSet::new(),
    };

    applier.apply_removals();
    applier.apply_additions();
    applier.apply_updates();

    let residual = applier.finish();
    if patch.is_empty() {
        return residual;
    }

    info!(
        "Applied patch with {} changes ({} left unapplied)",
        patch.count_changes(),
        residual.count_changes()
    );
    residual
}

/// A property holding an identity reference, written once every addition exists
struct DeferredRef {
    id: String,
    property: String,
    value: Variant,
}

struct Applier<'a, T: LiveTree + ?Sized> {
    instances: &'a mut InstanceMap,
    tree: &'a mut T,
    patch: &'a PatchSet,
    residual: PatchSet,
    /// Per-property failures, keyed by id, folded into `residual.updated`
    residual_updates: BTreeMap<String, PatchUpdate>,
    deferred_refs: Vec<DeferredRef>,
    /// Additions already created or failed
    visited: BTreeSet<&'a str>,
}

impl<'a, T: LiveTree + ?Sized> Applier<'a, T> {
    fn apply_removals(&mut self) {
        let patch = self.patch;
        for removal in &patch.removed {
            let handle = match removal {
                Removal::Id(id) => match self.instances.get_handle(id) {
                    Some(handle) => handle,
                    None => continue,
                },
                Removal::Handle(handle) => *handle,
            };

            if !self.tree.contains(handle) {
                self.instances.remove_by_handle(handle);
                continue;
            }
            if self.tree.is_deletion_protected(handle) {
                debug!("Not removing protected node {}", handle);
                continue;
            }
            self.instances.destroy_by_handle(self.tree, handle);
        }
    }

    fn apply_additions(&mut self) {
        let patch = self.patch;

        // Phase 1: create each connected subtree from its topmost pending node
        for (id, node) in &patch.added {
            let parent_pending = node
                .parent
                .as_ref()
                .is_some_and(|parent| patch.added.contains_key(parent));
            if parent_pending || self.visited.contains(id.as_str()) {
                continue;
            }

            let parent_handle = node
                .parent
                .as_deref()
                .and_then(|parent| self.instances.get_handle(parent))
                .filter(|handle| self.tree.contains(*handle));
            match parent_handle {
                Some(parent_handle) => self.create_subtree(id, parent_handle),
                None => {
                    warn!("Cannot add {}: parent {:?} is not live", id, node.parent);
                    self.fail_subtree(id);
                }
            }
        }

        // Anything not reached from a live parent (a parent cycle, say)
        for (id, node) in &patch.added {
            if !self.visited.contains(id.as_str()) {
                warn!("Addition {} is not reachable from a live parent", id);
                self.residual.added.insert(id.clone(), node.clone());
            }
        }

        // Phase 2: references, now that every sibling exists
        for deferred in std::mem::take(&mut self.deferred_refs) {
            let Some(handle) = self.instances.get_handle(&deferred.id) else {
                continue;
            };
            let written = decode_value(&deferred.property, &deferred.value, self.instances)
                .and_then(|decoded| self.tree.write_property(handle, &deferred.property, decoded));
            if let Err(e) = written {
                debug!("Reference {} on {} not applied: {}", deferred.property, deferred.id, e);
                self.residual_property(&deferred.id, &deferred.property, deferred.value);
            }
        }
    }

    fn create_subtree(&mut self, id: &str, parent: LiveHandle) {
        let patch = self.patch;
        let Some((id, node)) = patch.added.get_key_value(id) else {
            return;
        };
        if !self.visited.insert(id.as_str()) {
            return;
        }

        let handle = match self.existing_handle(id) {
            Some(handle) => {
                if self.tree.parent(handle) != Some(parent) {
                    if let Err(e) = self.tree.reparent(handle, Some(parent)) {
                        warn!("Failed to move {}: {}", id, e);
                        self.fail_subtree(id);
                        return;
                    }
                }
                handle
            }
            None => {
                let handle = match self.tree.create_node(&node.class_name) {
                    Ok(handle) => handle,
                    Err(e) => {
                        warn!("Failed to create {} ({}): {}", id, node.class_name, e);
                        self.fail_subtree(id);
                        return;
                    }
                };

                self.tree.set_name(handle, &node.name);
                for (property, value) in &node.properties {
                    if value.is_identity_ref() {
                        self.deferred_refs.push(DeferredRef {
                            id: id.to_string(),
                            property: property.clone(),
                            value: value.clone(),
                        });
                        continue;
                    }
                    if let Err(e) = self.tree.write_property(handle, property, value.clone()) {
                        debug!("Property {} on new node {} not applied: {}", property, id, e);
                        self.residual_property(id, property, value.clone());
                    }
                }

                if let Err(e) = self.tree.reparent(handle, Some(parent)) {
                    warn!("Failed to attach {}: {}", id, e);
                    self.tree.destroy_node(handle);
                    self.residual_updates.remove(id.as_str());
                    self.deferred_refs.retain(|deferred| deferred.id != *id);
                    self.fail_subtree(id);
                    return;
                }

                self.instances.insert(id, handle);
                handle
            }
        };
        self.instances.pause(handle);

        for child in self.children_of(id) {
            self.create_subtree(child, handle);
        }
    }

    /// Pending additions to create under `id`: the ones it lists as
    /// children plus the ones naming it as parent
    ///
    /// Merged patches can add a child without the parent listing it.
    fn children_of(&self, id: &str) -> Vec<&'a str> {
        let patch = self.patch;
        let mut children: Vec<&'a str> = patch
            .added
            .get(id)
            .map(|node| {
                node.children
                    .iter()
                    .map(String::as_str)
                    .filter(|child| patch.added.contains_key(*child))
                    .collect()
            })
            .unwrap_or_default();

        for (child, node) in &patch.added {
            if node.parent.as_deref() == Some(id) && !children.contains(&child.as_str()) {
                children.push(child.as_str());
            }
        }
        children
    }

    /// Live handle already registered for an addition, if any
    fn existing_handle(&self, id: &str) -> Option<LiveHandle> {
        self.instances
            .get_handle(id)
            .filter(|handle| self.tree.contains(*handle))
    }

    /// Report `id` and its pending descendants as unapplied additions
    fn fail_subtree(&mut self, id: &str) {
        let patch = self.patch;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some((current, node)) = patch.added.get_key_value(current) else {
                continue;
            };
            self.visited.insert(current.as_str());
            self.residual.added.insert(current.clone(), node.clone());
            stack.extend(
                self.children_of(current)
                    .into_iter()
                    .filter(|child| !self.visited.contains(child)),
            );
        }
    }

    fn apply_updates(&mut self) {
        let patch = self.patch;

        for update in &patch.updated {
            let Some(mut handle) = self.existing_handle(&update.id) else {
                debug!("Update for untracked id {} left unapplied", update.id);
                self.residual.updated.push(update.clone());
                continue;
            };

            if let Some(class_name) = &update.changed_class_name {
                match self.recreate(&update.id, handle, class_name) {
                    Some(new_handle) => handle = new_handle,
                    None => {
                        self.residual.updated.push(update.clone());
                        continue;
                    }
                }
            }

            if let Some(name) = &update.changed_name {
                self.tree.set_name(handle, name);
            }

            for (property, value) in &update.changed_properties {
                let written = decode_value(property, value, self.instances)
                    .and_then(|decoded| self.tree.write_property(handle, property, decoded));
                if let Err(e) = written {
                    debug!("Property {} on {} not applied: {}", property, update.id, e);
                    self.residual_property(&update.id, property, value.clone());
                }
            }

            if let Some(metadata) = &update.changed_metadata {
                self.residual_updates
                    .entry(update.id.clone())
                    .or_insert_with(|| PatchUpdate::new(update.id.clone()))
                    .changed_metadata = Some(metadata.clone());
            }

            self.instances.pause(handle);
        }
    }

    /// Replace `old` with a node of `class_name`, keeping name, readable
    /// properties, children and position in the tree
    fn recreate(&mut self, id: &str, old: LiveHandle, class_name: &str) -> Option<LiveHandle> {
        let new = match self.tree.create_node(class_name) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to change class of {} to {}: {}", id, class_name, e);
                return None;
            }
        };

        if let Some(name) = self.tree.name(old).map(str::to_string) {
            self.tree.set_name(new, &name);
        }
        for property in self.tree.property_names(old) {
            if let Ok(Some(value)) = self.tree.read_property(old, &property) {
                if let Err(e) = self.tree.write_property(new, &property, value) {
                    debug!("Property {} not carried over to new {}: {}", property, class_name, e);
                }
            }
        }

        let parent = self.tree.parent(old);
        if let Err(e) = self.tree.reparent(new, parent) {
            warn!("Failed to attach replacement for {}: {}", id, e);
            self.tree.destroy_node(new);
            return None;
        }

        for child in self.tree.children(old) {
            if let Err(e) = self.tree.reparent(child, Some(new)) {
                warn!("Failed to move child {} of {}: {}", child, id, e);
            }
        }

        self.instances.insert(id, new);
        self.tree.replaced(old, new);
        self.tree.destroy_node(old);
        Some(new)
    }

    fn residual_property(&mut self, id: &str, property: &str, value: Variant) {
        self.residual_updates
            .entry(id.to_string())
            .or_insert_with(|| PatchUpdate::new(id))
            .changed_properties
            .insert(property.to_string(), value);
    }

    fn finish(mut self) -> PatchSet {
        // Failed additions already carry every property
        let failed_additions = &self.residual.added;
        self.residual.updated.extend(
            self.residual_updates
                .into_values()
                .filter(|update| !failed_additions.contains_key(&update.id)),
        );
        self.residual
    }
}
