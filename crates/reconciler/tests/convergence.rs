//! End-to-end reconciliation: hydrate, diff, apply, diff again

use reconciler::{
    apply, diff, hydrate, match_children, InstanceMap, MatchingSession, YieldBudget,
    UNMATCHED_PENALTY,
};
use treesync_core::{
    LiveTree, MemoryTree, NodeMetadata, PatchSet, PatchUpdate, Ref, Variant, Vector3,
    VirtualNode, VirtualSnapshot,
};

fn hydrate_all(snapshot: &VirtualSnapshot, tree: &MemoryTree) -> InstanceMap {
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
    .expect("hydrate");
    instances
}

fn diff_all(snapshot: &VirtualSnapshot, tree: &MemoryTree, instances: &InstanceMap) -> PatchSet {
    diff(
        instances,
        tree,
        &snapshot.instances,
        &snapshot.root_id,
        &mut YieldBudget::default(),
    )
    .expect("diff")
}

/// A workspace-like virtual tree with nesting, duplicates and references
fn game_snapshot() -> VirtualSnapshot {
    let mut snapshot = VirtualSnapshot::new(VirtualNode::new("root", "Folder", "Game"));
    snapshot.add_child(
        "root",
        VirtualNode::new("model", "Model", "Bridge")
            .with_property("PrimaryPart", Variant::Ref(Ref::Id("deck".into()))),
    );
    snapshot.add_child(
        "model",
        VirtualNode::new("deck", "Part", "Deck")
            .with_property("Size", Vector3::new(40.0, 1.0, 8.0))
            .with_property("Anchored", true),
    );
    for (i, transparency) in [0.1, 0.2, 0.3].into_iter().enumerate() {
        snapshot.add_child(
            "model",
            VirtualNode::new(format!("rail{}", i), "Part", "Rail")
                .with_property("Transparency", transparency),
        );
    }
    snapshot.add_child(
        "root",
        VirtualNode::new("scripts", "Folder", "Scripts").with_property(
            "Tags",
            Variant::Tags(vec!["server".into(), "core".into()]),
        ),
    );
    snapshot.add_child(
        "scripts",
        VirtualNode::new("main", "Script", "Main").with_property("Source", "print('hi')"),
    );
    snapshot
}

#[test]
fn test_empty_live_tree_converges_in_one_apply() {
    let snapshot = game_snapshot();
    let mut tree = MemoryTree::new("Folder", "Game");

    let mut instances = hydrate_all(&snapshot, &tree);
    let patch = diff_all(&snapshot, &tree, &instances);
    assert_eq!(patch.added.len(), snapshot.instances.len() - 1);

    let residual = apply(&mut instances, &mut tree, &patch);
    assert!(residual.is_empty(), "residual: {:?}", residual);
    assert!(diff_all(&snapshot, &tree, &instances).is_empty());

    let model = instances.get_handle("model").unwrap();
    let deck = instances.get_handle("deck").unwrap();
    assert_eq!(
        tree.read_property(model, "PrimaryPart"),
        Ok(Some(Variant::Ref(Ref::Handle(deck))))
    );
}

#[test]
fn test_drifted_live_tree_converges() {
    let snapshot = game_snapshot();

    // Build the live tree from the snapshot, then drift it
    let mut tree = MemoryTree::new("Folder", "Game");
    let mut instances = hydrate_all(&snapshot, &tree);
    let patch = diff_all(&snapshot, &tree, &instances);
    apply(&mut instances, &mut tree, &patch);

    let deck = instances.get_handle("deck").unwrap();
    let rail = instances.get_handle("rail1").unwrap();
    let scripts = instances.get_handle("scripts").unwrap();
    tree.write_property(deck, "Anchored", Variant::Bool(false)).unwrap();
    tree.set_name(rail, "Handrail");
    tree.insert(scripts, "Script", "Leftover", []);
    tree.insert(tree.root(), "Folder", "Junk", []);

    // Fresh session: identities come from hydration alone
    let mut instances = hydrate_all(&snapshot, &tree);
    let patch = diff_all(&snapshot, &tree, &instances);
    // Junk, Leftover and the renamed rail, which is re-added under its old name
    assert_eq!(patch.removed.len(), 3);
    assert_eq!(patch.added_id_list(), vec!["rail1"]);
    assert!(patch.get_update_for_id("deck").is_some());

    let residual = apply(&mut instances, &mut tree, &patch);
    assert!(residual.is_empty(), "residual: {:?}", residual);
    assert!(diff_all(&snapshot, &tree, &instances).is_empty());
    assert!(tree.find_child(tree.root(), "Junk").is_none());
}

#[test]
fn test_ignore_unknown_instances_keeps_user_content() {
    let mut root = VirtualNode::new("root", "Folder", "Game");
    root.metadata = Some(NodeMetadata {
        ignore_unknown_instances: true,
    });
    let snapshot = VirtualSnapshot::new(root);

    let mut tree = MemoryTree::new("Folder", "Game");
    let root = tree.root();
    let user_part = tree.insert(root, "Part", "UserPart", []);
    let stale = tree.insert(root, "ModuleScript", "Stale", []);

    let mut instances = hydrate_all(&snapshot, &tree);
    let patch = diff_all(&snapshot, &tree, &instances);
    apply(&mut instances, &mut tree, &patch);

    assert!(tree.contains(user_part));
    assert!(!tree.contains(stale));
    assert!(diff_all(&snapshot, &tree, &instances).is_empty());
}

#[test]
fn test_reversed_duplicates_match_by_content() {
    let mut snapshot = VirtualSnapshot::new(VirtualNode::new("root", "Model", "Root"));
    snapshot.add_child(
        "root",
        VirtualNode::new("a", "Part", "Line").with_property("Transparency", 0.1),
    );
    snapshot.add_child(
        "root",
        VirtualNode::new("b", "Part", "Line").with_property("Transparency", 0.2),
    );

    let mut tree = MemoryTree::new("Model", "Root");
    let root = tree.root();
    let second = tree.insert(
        root,
        "Part",
        "Line",
        [("Transparency".to_string(), Variant::Float64(0.2))],
    );
    let first = tree.insert(
        root,
        "Part",
        "Line",
        [("Transparency".to_string(), Variant::Float64(0.1))],
    );

    let mut session = MatchingSession::new();
    let result = match_children(
        &mut session,
        &tree,
        &snapshot.root().unwrap().children,
        &tree.children(root),
        &snapshot.instances,
        None,
    );
    assert_eq!(result.total_cost, 0);
    assert_eq!(
        result.matched,
        vec![("a".to_string(), first), ("b".to_string(), second)]
    );

    let instances = hydrate_all(&snapshot, &tree);
    assert!(diff_all(&snapshot, &tree, &instances).is_empty());
}

#[test]
fn test_unmatched_children_cost_at_least_penalty_each() {
    let mut snapshot = VirtualSnapshot::new(VirtualNode::new("root", "Folder", "Root"));
    for i in 0..3 {
        snapshot.add_child(
            "root",
            VirtualNode::new(format!("v{}", i), "Part", &format!("Virtual{}", i)),
        );
    }
    let mut tree = MemoryTree::new("Folder", "Root");
    let root = tree.root();
    tree.insert(root, "Part", "Virtual0", []);
    tree.insert(root, "Part", "LiveOnly", []);

    let result = match_children(
        &mut MatchingSession::new(),
        &tree,
        &snapshot.root().unwrap().children,
        &tree.children(root),
        &snapshot.instances,
        None,
    );
    let unmatched = (result.unmatched_virtual.len() + result.unmatched_live.len()) as u64;
    assert_eq!(unmatched, 3);
    assert!(result.total_cost >= UNMATCHED_PENALTY * unmatched);
}

#[test]
fn test_invalid_addition_does_not_block_sibling() {
    let mut tree = MemoryTree::new("Folder", "Root");
    tree.reject_class("X");
    let mut instances = InstanceMap::new();
    instances.insert("root", tree.root());

    let mut a = VirtualNode::new("a", "X", "A");
    a.parent = Some("root".into());
    let mut b = VirtualNode::new("b", "Y", "B");
    b.parent = Some("root".into());
    let mut patch = PatchSet::new();
    patch.added.insert("a".into(), a);
    patch.added.insert("b".into(), b);

    let residual = apply(&mut instances, &mut tree, &patch);
    assert_eq!(residual.added_id_list(), vec!["a"]);
    assert!(tree.find_child(tree.root(), "B").is_some());
}

#[test]
fn test_folder_to_model_keeps_children() {
    let mut snapshot = VirtualSnapshot::new(VirtualNode::new("root", "Folder", "Root"));
    snapshot.add_child("root", VirtualNode::new("box", "Model", "Box"));
    snapshot.add_child("box", VirtualNode::new("box.a", "Part", "A"));
    snapshot.add_child("box", VirtualNode::new("box.b", "Part", "B"));

    let mut tree = MemoryTree::new("Folder", "Root");
    let root = tree.root();
    let folder = tree.insert(root, "Folder", "Box", []);
    let a = tree.insert(folder, "Part", "A", []);
    let b = tree.insert(folder, "Part", "B", []);

    // Class is not part of the pairing key, so seed the identity directly
    let mut instances = InstanceMap::new();
    instances.insert("root", root);
    instances.insert("box", folder);
    instances.insert("box.a", a);
    instances.insert("box.b", b);

    let patch = diff_all(&snapshot, &tree, &instances);
    assert_eq!(
        patch.get_update_for_id("box").unwrap().changed_class_name.as_deref(),
        Some("Model")
    );

    let residual = apply(&mut instances, &mut tree, &patch);
    assert!(residual.is_empty());

    let model = instances.get_handle("box").unwrap();
    assert_eq!(tree.class_name(model), Some("Model"));
    assert_eq!(tree.name(model), Some("Box"));
    assert_eq!(tree.children(model), vec![a, b]);
    assert!(diff_all(&snapshot, &tree, &instances).is_empty());
}

#[test]
fn test_merge_then_apply_name_and_property() {
    let mut tree = MemoryTree::new("Folder", "Root");
    let root = tree.root();
    let value = tree.insert(root, "StringValue", "Old", []);
    let mut instances = InstanceMap::new();
    instances.insert("x", value);

    let mut rename = PatchUpdate::new("x");
    rename.changed_name = Some("New".into());
    let mut target = PatchSet::new();
    target.updated.push(rename);

    let mut set_value = PatchUpdate::new("x");
    set_value
        .changed_properties
        .insert("Value".into(), Variant::String("A".into()));
    let mut source = PatchSet::new();
    source.updated.push(set_value);

    target.merge(&source, None);
    let merged = target.get_update_for_id("x").unwrap();
    assert_eq!(merged.changed_name.as_deref(), Some("New"));
    assert_eq!(
        merged.changed_properties.get("Value"),
        Some(&Variant::String("A".into()))
    );

    assert!(apply(&mut instances, &mut tree, &target).is_empty());
    assert_eq!(tree.name(value), Some("New"));
    assert_eq!(
        tree.read_property(value, "Value"),
        Ok(Some(Variant::String("A".into())))
    );
}
