//! Core data model for Treesync
//!
//! This crate provides:
//! - `Variant` property values and fuzzy value equality
//! - Virtual tree nodes and snapshots
//! - The `LiveTree` adapter trait (plus an in-memory implementation)
//! - `PatchSet` change-sets with merge/cancellation

pub mod error;
pub mod live;
pub mod memory;
pub mod node;
pub mod patch;
pub mod variant;
pub mod variant_eq;

// Re-exports
pub use error::LiveTreeError;
pub use live::{LiveHandle, LiveTree};
pub use memory::MemoryTree;
pub use node::{NodeMetadata, VirtualNode, VirtualNodes, VirtualSnapshot};
pub use patch::{LiveLookup, PatchSet, PatchUpdate, Removal};
pub use variant::{CFrame, Color3, EnumItem, NumberRange, Ref, Variant, Vector2, Vector3};
pub use variant_eq::{variant_eq, values_eq};
