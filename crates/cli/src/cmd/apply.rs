//! Apply the patch between a virtual tree and a live tree

use crate::{display, system_config, util};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use reconciler::SyncConfig;
use std::path::Path;

pub async fn run(virtual_path: &Path, live_path: &Path, yes: bool, dry_run: bool) -> Result<()> {
    let config = system_config::load()?;
    let skip_prompt = yes || config.sync.auto_accept;
    let sync = SyncConfig {
        auto_accept: false,
        ..config.sync
    };

    let (snapshot, mut session) = util::open_session(virtual_path, live_path, sync)?;
    session
        .refresh(&snapshot)
        .context("Failed to diff virtual tree against live tree")?;

    let Some(pending) = session.pending() else {
        println!("{}", "Live tree is up to date".dimmed());
        return Ok(());
    };
    display::print_patch(&pending.patch, session.tree(), session.instances());

    if dry_run {
        println!("\n{}", "Dry run: live tree not modified".yellow());
        return Ok(());
    }

    if !skip_prompt && !util::confirm("Apply these changes?")? {
        session.reject();
        println!("{}", "Aborted".yellow());
        return Ok(());
    }

    let residual = session.accept().unwrap_or_default();
    println!();
    display::print_residual(&residual, session.tree(), session.instances());

    let tree = session.into_tree();
    util::save_live_tree(&tree, live_path)?;
    Ok(())
}
