//! Patch (change-set) model
//!
//! A `PatchSet` describes how to move the live tree toward the virtual
//! tree: nodes to remove, subtrees to add, and per-node updates. Within one
//! well-formed patch an id appears in at most one of the three categories.

use crate::live::LiveHandle;
use crate::node::{NodeMetadata, VirtualNode};
use crate::variant::Variant;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Target of a removal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Removal {
    /// A node known to the identity registry
    Id(String),
    /// A live node that never had an identity
    Handle(LiveHandle),
}

/// Changes to one existing node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchUpdate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_class_name: Option<String>,
    #[serde(default)]
    pub changed_properties: BTreeMap<String, Variant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_metadata: Option<NodeMetadata>,
}

impl PatchUpdate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// True when the update would change nothing
    pub fn is_empty(&self) -> bool {
        self.changed_name.is_none()
            && self.changed_class_name.is_none()
            && self.changed_properties.is_empty()
            && self.changed_metadata.is_none()
    }

    /// Number of individual changes this update carries
    pub fn change_count(&self) -> usize {
        self.changed_properties.len()
            + usize::from(self.changed_name.is_some())
            + usize::from(self.changed_class_name.is_some())
    }

    /// Fold a later update for the same node into this one
    fn coalesce(&mut self, later: &PatchUpdate) {
        if later.changed_name.is_some() {
            self.changed_name = later.changed_name.clone();
        }
        if later.changed_class_name.is_some() {
            self.changed_class_name = later.changed_class_name.clone();
        }
        if later.changed_metadata.is_some() {
            self.changed_metadata = later.changed_metadata.clone();
        }
        for (name, value) in &later.changed_properties {
            self.changed_properties.insert(name.clone(), value.clone());
        }
    }

    /// Drop every field that already matches the live node
    fn prune_against(&mut self, lookup: &dyn LiveLookup) {
        if lookup.tracks(&self.id) {
            let id = self.id.clone();
            if let Some(name) = &self.changed_name {
                if lookup.name_matches(&id, name) {
                    self.changed_name = None;
                }
            }
            if let Some(class_name) = &self.changed_class_name {
                if lookup.class_name_matches(&id, class_name) {
                    self.changed_class_name = None;
                }
            }
            self.changed_properties
                .retain(|property, value| !lookup.property_matches(&id, property, value));
        }
    }
}

/// Read access to the current live state, keyed by identity
///
/// Used by `PatchSet::merge` to drop changes that the live tree already
/// reflects.
pub trait LiveLookup {
    /// Whether `id` maps to a live node
    fn tracks(&self, id: &str) -> bool;

    fn name_matches(&self, id: &str, name: &str) -> bool;

    fn class_name_matches(&self, id: &str, class_name: &str) -> bool;

    /// Whether the live property already equals `value`
    fn property_matches(&self, id: &str, property: &str, value: &Variant) -> bool;
}

/// A set of changes to apply to the live tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchSet {
    #[serde(default)]
    pub removed: Vec<Removal>,
    #[serde(default)]
    pub added: BTreeMap<String, VirtualNode>,
    #[serde(default)]
    pub updated: Vec<PatchUpdate>,
}

impl PatchSet {
    /// Create an empty patch
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.updated.is_empty()
    }

    pub fn has_additions(&self) -> bool {
        !self.added.is_empty()
    }

    pub fn has_removes(&self) -> bool {
        !self.removed.is_empty()
    }

    pub fn has_updates(&self) -> bool {
        !self.updated.is_empty()
    }

    /// Count individual changes
    ///
    /// One per removal, one per property across additions and updates,
    /// one per name or type change.
    pub fn count_changes(&self) -> usize {
        let added: usize = self.added.values().map(|node| node.properties.len()).sum();
        let updated: usize = self.updated.iter().map(PatchUpdate::change_count).sum();
        self.removed.len() + added + updated
    }

    /// Count distinct nodes touched by this patch
    pub fn count_instances(&self) -> usize {
        let mut ids: HashSet<&str> = HashSet::new();
        let mut handles: HashSet<LiveHandle> = HashSet::new();

        for removal in &self.removed {
            match removal {
                Removal::Id(id) => {
                    ids.insert(id.as_str());
                }
                Removal::Handle(handle) => {
                    handles.insert(*handle);
                }
            }
        }
        ids.extend(self.added.keys().map(String::as_str));
        ids.extend(self.updated.iter().map(|update| update.id.as_str()));

        ids.len() + handles.len()
    }

    /// Whether `id` is removed, added or updated by this patch
    pub fn contains_id(&self, id: &str) -> bool {
        self.added.contains_key(id)
            || self.updated.iter().any(|update| update.id == id)
            || self
                .removed
                .iter()
                .any(|removal| matches!(removal, Removal::Id(removed) if removed == id))
    }

    /// Whether `id` is the only node this (non-empty) patch touches
    pub fn contains_only_id(&self, id: &str) -> bool {
        if self.is_empty() {
            return false;
        }
        self.added.keys().all(|added| added == id)
            && self.updated.iter().all(|update| update.id == id)
            && self
                .removed
                .iter()
                .all(|removal| matches!(removal, Removal::Id(removed) if removed == id))
    }

    pub fn get_update_for_id(&self, id: &str) -> Option<&PatchUpdate> {
        self.updated.iter().find(|update| update.id == id)
    }

    pub fn added_id_list(&self) -> Vec<String> {
        self.added.keys().cloned().collect()
    }

    pub fn updated_id_list(&self) -> Vec<String> {
        self.updated.iter().map(|update| update.id.clone()).collect()
    }

    /// Structural equality
    pub fn is_equal(&self, other: &PatchSet) -> bool {
        self == other
    }

    /// Merge `source` into this patch
    ///
    /// - Removing an id this patch still adds cancels the addition (and
    ///   the added subtree under it) instead of recording a removal.
    /// - Additions from `source` overwrite pending additions.
    /// - Updates for the same id coalesce; later values win.
    ///
    /// With a `lookup`, merged updates lose every change the live tree
    /// already reflects, and updates that net out to nothing are dropped.
    pub fn merge(&mut self, source: &PatchSet, lookup: Option<&dyn LiveLookup>) {
        for removal in &source.removed {
            if let Removal::Id(id) = removal {
                if self.added.contains_key(id) {
                    self.cancel_addition(id);
                    continue;
                }
                self.updated.retain(|update| &update.id != id);
            }
            if !self.removed.contains(removal) {
                self.removed.push(removal.clone());
            }
        }

        for (id, node) in &source.added {
            self.updated.retain(|update| &update.id != id);
            self.added.insert(id.clone(), node.clone());
        }

        let mut touched: BTreeSet<String> = BTreeSet::new();
        for update in &source.updated {
            if let Some(node) = self.added.get_mut(&update.id) {
                fold_into_addition(node, update);
                continue;
            }

            match self.updated.iter_mut().find(|existing| existing.id == update.id) {
                Some(existing) => existing.coalesce(update),
                None => self.updated.push(update.clone()),
            }
            touched.insert(update.id.clone());
        }

        if let Some(lookup) = lookup {
            for update in self.updated.iter_mut() {
                if touched.contains(&update.id) {
                    update.prune_against(lookup);
                }
            }
            self.updated
                .retain(|update| !(touched.contains(&update.id) && update.is_empty()));
        }
    }

    /// Merge every source, left to right
    pub fn assign<'a>(
        &mut self,
        sources: impl IntoIterator<Item = &'a PatchSet>,
        lookup: Option<&dyn LiveLookup>,
    ) {
        for source in sources {
            self.merge(source, lookup);
        }
    }

    /// Drop a pending addition and every added node beneath it
    ///
    /// Descendants are found through `children` and through `parent`, since
    /// a merged-in child need not be listed by its added parent.
    fn cancel_addition(&mut self, id: &str) {
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.added.remove(&current) {
                stack.extend(node.children);
            }
            stack.extend(
                self.added
                    .iter()
                    .filter(|(_, node)| node.parent.as_deref() == Some(current.as_str()))
                    .map(|(child, _)| child.clone()),
            );
        }
    }
}

fn fold_into_addition(node: &mut VirtualNode, update: &PatchUpdate) {
    if let Some(name) = &update.changed_name {
        node.name = name.clone();
    }
    if let Some(class_name) = &update.changed_class_name {
        node.class_name = class_name.clone();
    }
    if let Some(metadata) = &update.changed_metadata {
        node.metadata = Some(metadata.clone());
    }
    for (property, value) in &update.changed_properties {
        node.properties.insert(property.clone(), value.clone());
    }
}
