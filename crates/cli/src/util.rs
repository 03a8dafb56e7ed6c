//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use reconciler::{SyncConfig, SyncSession};
use std::io::{self, Write};
use std::path::Path;
use treesync_core::{MemoryTree, VirtualSnapshot};

/// Read a virtual snapshot from a JSON file
pub fn load_snapshot(path: &Path) -> Result<VirtualSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read virtual tree {}", path.display()))?;
    VirtualSnapshot::from_json(&content)
        .with_context(|| format!("Failed to parse virtual tree {}", path.display()))
}

/// Read a live tree dump, or start one from the snapshot's root
///
/// A missing file yields a tree holding only a root shaped like the
/// snapshot's root node.
pub fn load_live_tree(path: &Path, snapshot: &VirtualSnapshot) -> Result<MemoryTree> {
    if path.exists() {
        return MemoryTree::load(path)
            .with_context(|| format!("Failed to load live tree {}", path.display()));
    }

    let root = snapshot
        .root()
        .with_context(|| format!("Virtual tree has no root node {}", snapshot.root_id))?;
    tracing::info!("{} does not exist, starting from an empty root", path.display());
    Ok(MemoryTree::new(&root.class_name, &root.name))
}

pub fn save_live_tree(tree: &MemoryTree, path: &Path) -> Result<()> {
    tree.save(path)
        .with_context(|| format!("Failed to write live tree {}", path.display()))
}

/// Load both trees and start a session over the live one
pub fn open_session(
    virtual_path: &Path,
    live_path: &Path,
    config: SyncConfig,
) -> Result<(VirtualSnapshot, SyncSession<MemoryTree>)> {
    let snapshot = load_snapshot(virtual_path)?;
    let tree = load_live_tree(live_path, &snapshot)?;
    let root = tree.root();
    Ok((snapshot, SyncSession::new(tree, root, config)))
}

/// Ask a yes/no question on stderr
pub fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{} [y/N]: ", prompt);
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read confirmation")?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}
