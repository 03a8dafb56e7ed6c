//! Structural reconciliation errors
//!
//! Only failures that make the whole call meaningless end up here. Per-node
//! and per-property failures are returned as a residual patch instead.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// Root id is not part of the virtual tree
    #[error("virtual tree has no node with root id {0}")]
    MissingRoot(String),

    /// Root id has no live counterpart in the identity registry
    #[error("root id {0} is not mapped to a live node")]
    UnmappedRoot(String),

    /// A node lists a child id the virtual tree does not contain
    #[error("node {parent} lists child {child} which is not in the virtual tree")]
    DanglingChild { parent: String, child: String },

    /// The host asked the traversal to stop
    #[error("traversal cancelled after {processed} nodes")]
    Cancelled { processed: usize },
}

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, ReconcileError>;
