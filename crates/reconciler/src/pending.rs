//! Pending-patch review queue
//!
//! Holds at most one patch awaiting review. Changes arriving while a patch
//! is pending are merged into it instead of queueing a second, overlapping
//! apply.

use tracing::debug;
use treesync_core::{LiveLookup, PatchSet};
use ulid::Ulid;

/// A patch waiting for the host to accept or reject it
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPatch {
    pub id: Ulid,
    pub patch: PatchSet,
    /// How many offered patches were merged into this one
    pub merged: usize,
}

#[derive(Debug, Default)]
pub struct ReviewQueue {
    pending: Option<PendingPatch>,
}

impl ReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `patch`, merging it into the pending one if there is one
    ///
    /// Returns the id of the pending patch afterwards, or `None` when
    /// nothing is left to review.
    pub fn offer(&mut self, patch: PatchSet, lookup: Option<&dyn LiveLookup>) -> Option<Ulid> {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.patch.merge(&patch, lookup);
                pending.merged += 1;

                if pending.patch.is_empty() {
                    debug!("Pending patch {} netted out to no change", pending.id);
                    self.pending = None;
                    return None;
                }
                Some(pending.id)
            }
            None if patch.is_empty() => None,
            None => {
                let id = Ulid::new();
                debug!(
                    "Queued patch {} with {} changes",
                    id,
                    patch.count_changes()
                );
                self.pending = Some(PendingPatch {
                    id,
                    patch,
                    merged: 1,
                });
                Some(id)
            }
        }
    }

    pub fn peek(&self) -> Option<&PendingPatch> {
        self.pending.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Hand the pending patch to the caller for application
    pub fn take(&mut self) -> Option<PendingPatch> {
        self.pending.take()
    }

    /// Discard the pending patch
    pub fn reject(&mut self) -> Option<PendingPatch> {
        let rejected = self.pending.take();
        if let Some(pending) = &rejected {
            debug!("Rejected patch {}", pending.id);
        }
        rejected
    }
}
