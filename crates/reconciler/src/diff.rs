//! Diff
//!
//! Computes the patch that moves an already-hydrated live tree toward the
//! virtual tree. Never assigns identities; nodes without one are either
//! added (virtual side) or removed (live side).
//!
//! Duplicate siblings left unpaired by hydration are not special-cased.
//! They show up as ordinary additions and removals.

use crate::cooperative::YieldBudget;
use crate::decode::decode_value;
use crate::error::{ReconcileError, Result};
use crate::instance_map::InstanceMap;
use ahash::AHashSet;
use tracing::debug;
use treesync_core::{
    variant_eq, LiveHandle, LiveTree, PatchSet, PatchUpdate, Removal, VirtualNode, VirtualNodes,
};

/// Classes that stay removable under a parent that ignores unknown children
const ALWAYS_PRUNABLE_CLASSES: &[&str] = &["Script", "LocalScript", "ModuleScript"];

/// Diff the subtree rooted at `root_id` against its live counterpart
pub fn diff<T: LiveTree + ?Sized>(
    instances: &InstanceMap,
    tree: &T,
    nodes: &VirtualNodes,
    root_id: &str,
    budget: &mut YieldBudget<'_>,
) -> Result<PatchSet> {
    if !nodes.contains_key(root_id) {
        return Err(ReconcileError::MissingRoot(root_id.to_string()));
    }
    let root_handle = instances
        .get_handle(root_id)
        .filter(|handle| tree.contains(*handle))
        .ok_or_else(|| ReconcileError::UnmappedRoot(root_id.to_string()))?;

    let mut differ = Differ {
        instances,
        tree,
        nodes,
        budget,
        patch: PatchSet::new(),
    };
    differ.visit(root_id, root_handle)?;

    debug!(
        "Diff of {} found {} changes",
        root_id,
        differ.patch.count_changes()
    );
    Ok(differ.patch)
}

struct Differ<'a, 'b, T: LiveTree + ?Sized> {
    instances: &'a InstanceMap,
    tree: &'a T,
    nodes: &'a VirtualNodes,
    budget: &'a mut YieldBudget<'b>,
    patch: PatchSet,
}

impl<T: LiveTree + ?Sized> Differ<'_, '_, T> {
    fn visit(&mut self, id: &str, handle: LiveHandle) -> Result<()> {
        self.budget.tick()?;

        let nodes = self.nodes;
        let node = nodes
            .get(id)
            .ok_or_else(|| ReconcileError::MissingRoot(id.to_string()))?;

        self.diff_node(node, handle);

        for child in &node.children {
            if !nodes.contains_key(child) {
                return Err(ReconcileError::DanglingChild {
                    parent: id.to_string(),
                    child: child.clone(),
                });
            }
        }
        let virtual_children: AHashSet<&str> =
            node.children.iter().map(String::as_str).collect();

        // Live side: anything not accounted for by this node's virtual children
        for live_child in self.tree.children(handle) {
            match self.instances.get_id(live_child) {
                Some(child_id) if virtual_children.contains(child_id) => {}
                Some(_) if self.tree.is_deletion_protected(live_child) => {}
                // Moved under another virtual parent, where it is re-added
                // under the same id
                Some(child_id) if nodes.contains_key(child_id) => {
                    self.patch.removed.push(Removal::Handle(live_child));
                }
                Some(child_id) => {
                    self.patch.removed.push(Removal::Id(child_id.to_string()));
                }
                None => {
                    if self.should_prune_unknown(node, live_child) {
                        self.patch.removed.push(Removal::Handle(live_child));
                    }
                }
            }
        }

        // Virtual side: recurse into mapped children, add the rest
        for child_id in &node.children {
            let live_child = self
                .instances
                .get_handle(child_id)
                .filter(|child| self.tree.parent(*child) == Some(handle));
            match live_child {
                Some(child_handle) => self.visit(child_id, child_handle)?,
                None => self.add_subtree(child_id, id)?,
            }
        }

        Ok(())
    }

    fn should_prune_unknown(&self, parent: &VirtualNode, live_child: LiveHandle) -> bool {
        if self.tree.is_deletion_protected(live_child) {
            return false;
        }
        if !parent.ignores_unknown_children() {
            return true;
        }
        self.tree
            .class_name(live_child)
            .is_some_and(|class_name| ALWAYS_PRUNABLE_CLASSES.contains(&class_name))
    }

    /// Compare one node with its live counterpart, ignoring children
    fn diff_node(&mut self, node: &VirtualNode, handle: LiveHandle) {
        let mut update = PatchUpdate::new(node.id.clone());

        if self.tree.class_name(handle) != Some(node.class_name.as_str()) {
            update.changed_class_name = Some(node.class_name.clone());
        }
        if self.tree.name(handle) != Some(node.name.as_str()) {
            update.changed_name = Some(node.name.clone());
        }

        for (property, value) in &node.properties {
            let current = match self.tree.read_property(handle, property) {
                Ok(current) => current,
                Err(e) => {
                    debug!("Skipping property {} of {}: {}", property, node.id, e);
                    continue;
                }
            };
            let decoded = match decode_value(property, value, self.instances) {
                Ok(decoded) => decoded,
                Err(e) => {
                    debug!("Skipping property {} of {}: {}", property, node.id, e);
                    continue;
                }
            };
            if !variant_eq(Some(&decoded), current.as_ref()) {
                update
                    .changed_properties
                    .insert(property.clone(), value.clone());
            }
        }

        if !update.is_empty() {
            self.patch.updated.push(update);
        }
    }

    /// Record `id` and every virtual descendant as an addition
    fn add_subtree(&mut self, id: &str, parent_id: &str) -> Result<()> {
        self.budget.tick()?;

        let nodes = self.nodes;
        let node = nodes.get(id).ok_or_else(|| ReconcileError::DanglingChild {
            parent: parent_id.to_string(),
            child: id.to_string(),
        })?;

        let mut added = node.clone();
        added.parent = Some(parent_id.to_string());
        self.patch.added.insert(id.to_string(), added);

        for child in &node.children {
            self.add_subtree(child, id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::apply;
    use crate::hydrate::hydrate;
    use treesync_core::{MemoryTree, NodeMetadata, Ref, Variant, VirtualSnapshot};

    fn hydrated(snapshot: &VirtualSnapshot, tree: &MemoryTree) -> InstanceMap {
        let mut instances = InstanceMap::new();
        hydrate(
            &mut instances,
            tree,
            &snapshot.instances,
            &snapshot.root_id,
            tree.root(),
            None,
            &mut YieldBudget::default(),
        )
        .unwrap();
        instances
    }

    fn run(snapshot: &VirtualSnapshot, tree: &MemoryTree, instances: &InstanceMap) -> PatchSet {
        diff(
            instances,
            tree,
            &snapshot.instances,
            &snapshot.root_id,
            &mut YieldBudget::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_identical_trees_produce_empty_patch() {
        let mut snapshot = VirtualSnapshot::new(VirtualNode::new("root", "Folder", "Root"));
        snapshot.add_child(
            "root",
            VirtualNode::new("p", "Part", "P").with_property("Transparency", 0.5),
        );

        let mut tree = MemoryTree::new("Folder", "Root");
        let root = tree.root();
        tree.insert(
            root,
            "Part",
            "P",
            [("Transparency".to_string(), Variant::Float64(0.50004))],
        );

        let instances = hydrated(&snapshot, &tree);
        assert!(run(&snapshot, &tree, &instances).is_empty());
    }

    #[test]
    fn test_property_and_name_changes_become_updates() {
        let mut snapshot = VirtualSnapshot::new(VirtualNode::new("root", "Folder", "Root"));
        snapshot.add_child(
            "root",
            VirtualNode::new("p", "Part", "P").with_property("Transparency", 0.9),
        );

        let mut tree = MemoryTree::new("Folder", "Root");
        let root = tree.root();
        let part = tree.insert(
            root,
            "Part",
            "P",
            [("Transparency".to_string(), Variant::Float64(0.1))],
        );

        let instances = hydrated(&snapshot, &tree);
        tree.set_name(part, "Renamed");

        let patch = run(&snapshot, &tree, &instances);
        let update = patch.get_update_for_id("p").unwrap();
        assert_eq!(update.changed_name.as_deref(), Some("P"));
        assert_eq!(update.changed_class_name, None);
        assert_eq!(
            update.changed_properties.get("Transparency"),
            Some(&Variant::Float64(0.9))
        );
    }

    #[test]
    fn test_class_change_detected_independently_of_name() {
        let snapshot = VirtualSnapshot::new(VirtualNode::new("root", "Model", "Root"));
        let tree = MemoryTree::new("Folder", "Root");
        let mut instances = InstanceMap::new();
        instances.insert("root", tree.root());

        let patch = run(&snapshot, &tree, &instances);
        let update = patch.get_update_for_id("root").unwrap();
        assert_eq!(update.changed_class_name.as_deref(), Some("Model"));
        assert_eq!(update.changed_name, None);
    }

    #[test]
    fn test_unknown_live_children_are_removed_unless_protected() {
        let snapshot = VirtualSnapshot::new(VirtualNode::new("root", "Folder", "Root"));
        let mut tree = MemoryTree::new("Folder", "Root");
        let root = tree.root();
        let stray = tree.insert(root, "Part", "Stray", []);
        let guarded = tree.insert(root, "Part", "Guarded", []);
        tree.protect(guarded);

        let instances = hydrated(&snapshot, &tree);
        let patch = run(&snapshot, &tree, &instances);
        assert_eq!(patch.removed, vec![Removal::Handle(stray)]);
    }

    #[test]
    fn test_ignore_unknown_keeps_everything_but_scripts() {
        let mut root = VirtualNode::new("root", "Folder", "Root");
        root.metadata = Some(NodeMetadata {
            ignore_unknown_instances: true,
        });
        let snapshot = VirtualSnapshot::new(root);

        let mut tree = MemoryTree::new("Folder", "Root");
        let root = tree.root();
        tree.insert(root, "Part", "UserPart", []);
        let script = tree.insert(root, "Script", "Stale", []);

        let instances = hydrated(&snapshot, &tree);
        let patch = run(&snapshot, &tree, &instances);
        assert_eq!(patch.removed, vec![Removal::Handle(script)]);
    }

    #[test]
    fn test_mapped_child_dropped_from_virtual_tree_is_removed_by_id() {
        let mut snapshot = VirtualSnapshot::new(VirtualNode::new("root", "Folder", "Root"));
        snapshot.add_child("root", VirtualNode::new("gone", "Folder", "Gone"));

        let mut tree = MemoryTree::new("Folder", "Root");
        let root = tree.root();
        tree.insert(root, "Folder", "Gone", []);
        let instances = hydrated(&snapshot, &tree);

        let mut next = VirtualSnapshot::new(VirtualNode::new("root", "Folder", "Root"));
        next.instances.get_mut("root").unwrap().children.clear();
        let patch = run(&next, &tree, &instances);
        assert_eq!(patch.removed, vec![Removal::Id("gone".into())]);
    }

    #[test]
    fn test_node_moved_between_parents_keeps_id_in_one_category() {
        let mut snapshot = VirtualSnapshot::new(VirtualNode::new("root", "Folder", "Root"));
        snapshot.add_child("root", VirtualNode::new("a", "Folder", "A"));
        snapshot.add_child("root", VirtualNode::new("b", "Folder", "B"));
        snapshot.add_child("a", VirtualNode::new("x", "Part", "X"));

        let mut tree = MemoryTree::new("Folder", "Root");
        let root = tree.root();
        let a = tree.insert(root, "Folder", "A", []);
        tree.insert(root, "Folder", "B", []);
        let x = tree.insert(a, "Part", "X", []);
        let mut instances = hydrated(&snapshot, &tree);
        assert_eq!(instances.get_handle("x"), Some(x));

        let mut moved = snapshot.clone();
        moved.instances.get_mut("a").unwrap().children.clear();
        moved.instances.get_mut("b").unwrap().children.push("x".into());
        moved.instances.get_mut("x").unwrap().parent = Some("b".into());

        let patch = run(&moved, &tree, &instances);
        assert_eq!(patch.removed, vec![Removal::Handle(x)]);
        assert_eq!(patch.added_id_list(), vec!["x"]);
        assert_eq!(patch.added["x"].parent.as_deref(), Some("b"));
        assert!(patch.updated.is_empty());

        let residual = apply(&mut instances, &mut tree, &patch);
        assert!(residual.is_empty());
        let new_x = instances.get_handle("x").unwrap();
        assert_eq!(tree.name(tree.parent(new_x).unwrap()), Some("B"));
        assert!(run(&moved, &tree, &instances).is_empty());
    }

    #[test]
    fn test_new_virtual_subtree_is_added_whole() {
        let mut snapshot = VirtualSnapshot::new(VirtualNode::new("root", "Folder", "Root"));
        snapshot.add_child("root", VirtualNode::new("m", "Model", "M"));
        snapshot.add_child("m", VirtualNode::new("m.a", "Part", "A"));
        snapshot.add_child("m", VirtualNode::new("m.b", "Part", "B"));

        let tree = MemoryTree::new("Folder", "Root");
        let instances = hydrated(&snapshot, &tree);
        let patch = run(&snapshot, &tree, &instances);

        assert_eq!(patch.added_id_list(), vec!["m", "m.a", "m.b"]);
        assert_eq!(patch.added["m"].parent.as_deref(), Some("root"));
        assert_eq!(patch.added["m.a"].parent.as_deref(), Some("m"));
        assert!(patch.updated.is_empty());
    }

    #[test]
    fn test_unreadable_and_undecodable_properties_are_skipped() {
        let mut snapshot = VirtualSnapshot::new(VirtualNode::new("root", "Folder", "Root"));
        snapshot.add_child(
            "root",
            VirtualNode::new("m", "Model", "M")
                .with_property("Secret", 1.0)
                .with_property("PrimaryPart", Variant::Ref(Ref::Id("missing".into()))),
        );

        let mut tree = MemoryTree::new("Folder", "Root");
        let root = tree.root();
        tree.insert(root, "Model", "M", []);
        tree.hide_property("Secret");

        let instances = hydrated(&snapshot, &tree);
        assert!(run(&snapshot, &tree, &instances).is_empty());
    }

    #[test]
    fn test_resolved_references_compare_by_handle() {
        let mut snapshot = VirtualSnapshot::new(VirtualNode::new("root", "Folder", "Root"));
        snapshot.add_child(
            "root",
            VirtualNode::new("m", "Model", "M")
                .with_property("PrimaryPart", Variant::Ref(Ref::Id("m.p".into()))),
        );
        snapshot.add_child("m", VirtualNode::new("m.p", "Part", "P"));

        let mut tree = MemoryTree::new("Folder", "Root");
        let root = tree.root();
        let model = tree.insert(root, "Model", "M", []);
        let part = tree.insert(model, "Part", "P", []);
        tree.write_property(model, "PrimaryPart", Variant::Ref(Ref::Handle(part)))
            .unwrap();

        let instances = hydrated(&snapshot, &tree);
        assert!(run(&snapshot, &tree, &instances).is_empty());

        tree.write_property(model, "PrimaryPart", Variant::null_ref())
            .unwrap();
        let patch = run(&snapshot, &tree, &instances);
        assert_eq!(
            patch.get_update_for_id("m").unwrap().changed_properties["PrimaryPart"],
            Variant::Ref(Ref::Id("m.p".into()))
        );
    }

    #[test]
    fn test_structural_errors() {
        let snapshot = VirtualSnapshot::new(VirtualNode::new("root", "Folder", "Root"));
        let tree = MemoryTree::new("Folder", "Root");
        let instances = InstanceMap::new();

        let unmapped = diff(
            &instances,
            &tree,
            &snapshot.instances,
            "root",
            &mut YieldBudget::default(),
        );
        assert_eq!(unmapped, Err(ReconcileError::UnmappedRoot("root".into())));

        let mut broken = snapshot.clone();
        broken
            .instances
            .get_mut("root")
            .unwrap()
            .children
            .push("ghost".into());
        let mut instances = InstanceMap::new();
        instances.insert("root", tree.root());
        let dangling = diff(
            &instances,
            &tree,
            &broken.instances,
            "root",
            &mut YieldBudget::default(),
        );
        assert_eq!(
            dangling,
            Err(ReconcileError::DanglingChild {
                parent: "root".into(),
                child: "ghost".into()
            })
        );
    }
}
