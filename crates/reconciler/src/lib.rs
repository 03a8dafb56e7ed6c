//! Tree reconciliation engine
//!
//! Keeps a host-owned live tree in sync with a virtual tree:
//! - Hydration assigns stable identities to existing live nodes
//! - Diff computes the patch between the two trees
//! - Apply writes a patch and reports what did not apply
//! - `SyncSession` wires these together behind a review queue

pub mod apply;
pub mod cooperative;
pub mod decode;
pub mod diff;
pub mod error;
pub mod hydrate;
pub mod instance_map;
pub mod matching;
pub mod pending;
pub mod session;

pub use apply::apply;
pub use cooperative::{YieldBudget, DEFAULT_YIELD_INTERVAL};
pub use decode::{decode_value, LiveView};
pub use diff::diff;
pub use error::{ReconcileError, Result};
pub use hydrate::hydrate;
pub use instance_map::InstanceMap;
pub use matching::{match_children, MatchResult, MatchingSession, UNMATCHED_PENALTY};
pub use pending::{PendingPatch, ReviewQueue};
pub use session::{SyncConfig, SyncOutcome, SyncSession};
