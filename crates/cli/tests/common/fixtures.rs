//! Snapshot fixtures written into a temporary directory

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use treesync_core::{MemoryTree, Variant, VirtualNode, VirtualSnapshot};

/// A temporary directory holding a virtual snapshot and a live dump path
pub struct TestProject {
    pub dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn virtual_path(&self) -> PathBuf {
        self.path().join("virtual.json")
    }

    pub fn live_path(&self) -> PathBuf {
        self.path().join("live.json")
    }

    pub fn write_snapshot(&self, snapshot: &VirtualSnapshot) {
        let json = serde_json::to_string_pretty(snapshot).expect("serialize snapshot");
        std::fs::write(self.virtual_path(), json).expect("write snapshot");
    }

    pub fn write_live(&self, tree: &MemoryTree) {
        tree.save(&self.live_path()).expect("write live tree");
    }

    pub fn read_live(&self) -> MemoryTree {
        MemoryTree::load(&self.live_path()).expect("read live tree")
    }
}

/// A small scene: a model with two parts and a script folder
pub fn scene(rail_transparency: f64) -> VirtualSnapshot {
    let mut snapshot = VirtualSnapshot::new(VirtualNode::new("root", "Folder", "Workspace"));
    snapshot.add_child("root", VirtualNode::new("model", "Model", "Bridge"));
    snapshot.add_child(
        "model",
        VirtualNode::new("deck", "Part", "Deck").with_property("Anchored", true),
    );
    snapshot.add_child(
        "model",
        VirtualNode::new("rail", "Part", "Rail").with_property("Transparency", rail_transparency),
    );
    snapshot.add_child("root", VirtualNode::new("scripts", "Folder", "Scripts"));
    snapshot.add_child(
        "scripts",
        VirtualNode::new("main", "Script", "Main")
            .with_property("Source", Variant::String("print('hi')".into())),
    );
    snapshot
}
