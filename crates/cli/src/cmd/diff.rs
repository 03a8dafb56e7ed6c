//! Show the patch between a virtual tree and a live tree

use crate::{display, system_config, util};
use anyhow::{Context, Result};
use reconciler::SyncConfig;
use std::path::Path;
use treesync_core::PatchSet;

pub async fn run(virtual_path: &Path, live_path: &Path, json: bool) -> Result<()> {
    let config = system_config::load()?;
    let sync = SyncConfig {
        auto_accept: false,
        ..config.sync
    };

    let (snapshot, mut session) = util::open_session(virtual_path, live_path, sync)?;
    session
        .refresh(&snapshot)
        .context("Failed to diff virtual tree against live tree")?;

    let empty = PatchSet::new();
    let patch = session.pending().map(|pending| &pending.patch).unwrap_or(&empty);

    if json {
        let rendered = serde_json::to_string_pretty(patch).context("Failed to serialize patch")?;
        println!("{}", rendered);
    } else {
        display::print_patch(patch, session.tree(), session.instances());
    }

    Ok(())
}
