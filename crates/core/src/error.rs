//! Errors reported by live tree adapters

use crate::live::LiveHandle;
use thiserror::Error;

/// Failure of a single live tree operation
///
/// None of these are fatal: the reconciler folds them into the residual
/// patch and moves on to the next node or property.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LiveTreeError {
    /// Property does not exist on this node, or cannot be read
    #[error("unknown property {property} on {class_name}")]
    UnknownProperty {
        class_name: String,
        property: String,
    },

    /// Node type cannot be created by the host
    #[error("unsupported node type: {0}")]
    UnsupportedClass(String),

    /// Host refused the property write
    #[error("cannot write {property}: {reason}")]
    WriteRejected { property: String, reason: String },

    /// Handle no longer refers to a node in the live tree
    #[error("invalid live handle {0}")]
    InvalidHandle(LiveHandle),

    /// Virtual value could not be turned into a live value
    #[error("cannot decode {property}: {reason}")]
    DecodeFailed { property: String, reason: String },
}
