//! Sync session
//!
//! Ties the engine together for a host: one live tree, one identity
//! registry, one review queue. Hydrates once, then turns every snapshot
//! refresh or incoming patch into a pending patch that the host accepts or
//! rejects.

use crate::apply::apply;
use crate::cooperative::{YieldBudget, DEFAULT_YIELD_INTERVAL};
use crate::decode::LiveView;
use crate::diff::diff;
use crate::error::Result;
use crate::hydrate::hydrate;
use crate::instance_map::InstanceMap;
use crate::pending::{PendingPatch, ReviewQueue};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use tracing::{debug, info, warn};
use treesync_core::{LiveHandle, LiveTree, PatchSet, VirtualSnapshot};
use ulid::Ulid;

/// Session behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Nodes processed between cooperative yields (0 disables yielding)
    pub yield_interval: usize,
    /// Apply patches as soon as they are produced instead of queueing them
    pub auto_accept: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            yield_interval: DEFAULT_YIELD_INTERVAL,
            auto_accept: false,
        }
    }
}

/// What a refresh or incoming patch led to
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Live tree already matches
    UpToDate,
    /// A patch is waiting for review
    Pending(Ulid),
    /// Applied immediately; `residual` holds what did not apply
    Applied { residual: PatchSet },
}

type HostHook = Box<dyn FnMut(usize) -> ControlFlow<()>>;

pub struct SyncSession<T: LiveTree> {
    tree: T,
    root: LiveHandle,
    root_id: Option<String>,
    instances: InstanceMap,
    queue: ReviewQueue,
    config: SyncConfig,
    yield_hook: Option<HostHook>,
    hydrated: bool,
}

impl<T: LiveTree> SyncSession<T> {
    /// Create a session syncing the subtree of `tree` under `root`
    pub fn new(tree: T, root: LiveHandle, config: SyncConfig) -> Self {
        Self {
            tree,
            root,
            root_id: None,
            instances: InstanceMap::new(),
            queue: ReviewQueue::new(),
            config,
            yield_hook: None,
            hydrated: false,
        }
    }

    /// Hook called every `yield_interval` processed nodes during traversals
    pub fn set_yield_hook(&mut self, hook: impl FnMut(usize) -> ControlFlow<()> + 'static) {
        self.yield_hook = Some(Box::new(hook));
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn instances(&self) -> &InstanceMap {
        &self.instances
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn pending(&self) -> Option<&PendingPatch> {
        self.queue.peek()
    }

    /// Live handle of the synced root
    pub fn root(&self) -> LiveHandle {
        self.root
    }

    /// Give the live tree back, ending the session without destroying
    /// anything
    pub fn into_tree(mut self) -> T {
        self.queue.reject();
        self.instances.release();
        self.tree
    }

    /// Assign identities using `snapshot` as the guide
    ///
    /// Only the first call does anything.
    pub fn hydrate(&mut self, snapshot: &VirtualSnapshot) -> Result<()> {
        if self.hydrated {
            debug!("Session already hydrated");
            return Ok(());
        }

        let mut budget = make_budget(&mut self.yield_hook, self.config.yield_interval);
        hydrate(
            &mut self.instances,
            &self.tree,
            &snapshot.instances,
            &snapshot.root_id,
            self.root,
            None,
            &mut budget,
        )?;

        self.root_id = Some(snapshot.root_id.clone());
        self.hydrated = true;
        info!("Session hydrated with {} tracked nodes", self.instances.size());
        Ok(())
    }

    /// Diff `snapshot` against the live tree and queue the result
    pub fn refresh(&mut self, snapshot: &VirtualSnapshot) -> Result<SyncOutcome> {
        self.hydrate(snapshot)?;

        let patch = {
            let mut budget = make_budget(&mut self.yield_hook, self.config.yield_interval);
            diff(
                &self.instances,
                &self.tree,
                &snapshot.instances,
                &snapshot.root_id,
                &mut budget,
            )?
        };

        Ok(self.enqueue(patch))
    }

    /// Queue an incremental patch received from upstream
    pub fn receive_patch(&mut self, patch: PatchSet) -> SyncOutcome {
        self.enqueue(patch)
    }

    fn enqueue(&mut self, patch: PatchSet) -> SyncOutcome {
        let queued = {
            let view = LiveView::new(&self.instances, &self.tree);
            self.queue.offer(patch, Some(&view))
        };

        match queued {
            None => SyncOutcome::UpToDate,
            Some(_) if self.config.auto_accept => match self.accept() {
                Some(residual) => SyncOutcome::Applied { residual },
                None => SyncOutcome::UpToDate,
            },
            Some(id) => SyncOutcome::Pending(id),
        }
    }

    /// Apply the pending patch, returning its residual
    pub fn accept(&mut self) -> Option<PatchSet> {
        let pending = self.queue.take()?;
        let residual = apply(&mut self.instances, &mut self.tree, &pending.patch);
        self.instances.unpause_all();

        // A class change on the root replaces its node
        let root = self
            .root_id
            .as_deref()
            .and_then(|id| self.instances.get_handle(id));
        if let Some(root) = root {
            self.root = root;
        }

        if residual.is_empty() {
            info!("Patch {} applied", pending.id);
        } else {
            warn!(
                "Patch {} applied with {} changes left over",
                pending.id,
                residual.count_changes()
            );
        }
        Some(residual)
    }

    /// Discard the pending patch; returns whether there was one
    pub fn reject(&mut self) -> bool {
        self.queue.reject().is_some()
    }

    /// Tear the session down: drop any pending patch and destroy every
    /// tracked live node
    pub fn stop(&mut self) {
        self.queue.reject();
        self.instances.stop(&mut self.tree);
        self.root_id = None;
        self.hydrated = false;
    }
}

fn make_budget(hook: &mut Option<HostHook>, interval: usize) -> YieldBudget<'_> {
    match hook {
        Some(hook) => YieldBudget::with_hook(interval, move |processed| (*hook)(processed)),
        None => YieldBudget::new(interval),
    }
}
