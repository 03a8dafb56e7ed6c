//! Keep a live tree in sync with a virtual snapshot file
//!
//! Polls the snapshot on a fixed interval. Whenever its modification time
//! changes the snapshot is re-read, diffed, applied and the live tree
//! written back.

use crate::{system_config, util};
use anyhow::Result;
use reconciler::{SyncConfig, SyncOutcome, SyncSession};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use treesync_core::{MemoryTree, VirtualSnapshot};

pub async fn run(virtual_path: &Path, live_path: &Path, interval_ms: Option<u64>) -> Result<()> {
    let config = system_config::load()?;
    let period = Duration::from_millis(interval_ms.unwrap_or(config.watch.interval_ms));

    println!(
        "Watching {} (every {:?}), Ctrl-C to stop",
        virtual_path.display(),
        period
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let applied = watch_loop(
        virtual_path.to_path_buf(),
        live_path.to_path_buf(),
        period,
        config.sync,
        shutdown,
    )
    .await?;
    println!("Stopped after {} sync passes", applied);
    Ok(())
}

/// Sync until `shutdown` resolves; returns the number of patches applied
pub async fn watch_loop(
    virtual_path: PathBuf,
    live_path: PathBuf,
    period: Duration,
    sync: SyncConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<usize> {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let sync = SyncConfig {
        auto_accept: true,
        ..sync
    };
    let mut session: Option<SyncSession<MemoryTree>> = None;
    let mut last_modified: Option<SystemTime> = None;
    let mut applied = 0usize;

    info!("Starting watch loop (interval: {:?})", period);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = timer.tick() => {}
        }

        let modified = match tokio::fs::metadata(&virtual_path).await {
            Ok(metadata) => metadata.modified().ok(),
            Err(e) => {
                debug!("Virtual tree not readable yet: {}", e);
                continue;
            }
        };
        if modified.is_some() && modified == last_modified {
            continue;
        }

        let snapshot = match read_snapshot(&virtual_path).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Skipping unreadable virtual tree: {:#}", e);
                continue;
            }
        };
        last_modified = modified;

        if session.is_none() {
            let tree = util::load_live_tree(&live_path, &snapshot)?;
            let root = tree.root();
            session = Some(SyncSession::new(tree, root, sync.clone()));
        }
        let Some(active) = session.as_mut() else {
            continue;
        };

        match active.refresh(&snapshot) {
            Ok(SyncOutcome::Applied { residual }) => {
                applied += 1;
                if residual.is_empty() {
                    info!("Live tree synced");
                } else {
                    warn!("{} changes could not be applied", residual.count_changes());
                }
                util::save_live_tree(active.tree(), &live_path)?;
            }
            Ok(SyncOutcome::UpToDate) => debug!("Live tree already up to date"),
            Ok(SyncOutcome::Pending(id)) => debug!("Patch {} left pending", id),
            Err(e) => warn!("Sync pass failed: {}", e),
        }
    }

    info!("Watch loop stopped");
    Ok(applied)
}

async fn read_snapshot(path: &Path) -> Result<VirtualSnapshot> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(VirtualSnapshot::from_json(&content)?)
}
