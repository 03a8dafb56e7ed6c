//! Adapter boundary to the externally-owned live tree

use crate::error::LiveTreeError;
use crate::variant::Variant;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque reference to a node in the live tree
///
/// Compared by identity: two distinct nodes with identical content are
/// still different handles.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LiveHandle(u64);

impl LiveHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Debug for LiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LiveHandle({})", self.0)
    }
}

impl std::fmt::Display for LiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Host tree operations the reconciler needs
///
/// The host owns every node. The reconciler only holds handles and asks
/// the adapter to read or mutate through them.
pub trait LiveTree {
    /// Create a detached node of the given type
    fn create_node(&mut self, class_name: &str) -> Result<LiveHandle, LiveTreeError>;

    /// Destroy a node and its whole subtree
    fn destroy_node(&mut self, handle: LiveHandle);

    /// Move a node under a new parent (`None` detaches it)
    fn reparent(
        &mut self,
        handle: LiveHandle,
        parent: Option<LiveHandle>,
    ) -> Result<(), LiveTreeError>;

    /// Whether the handle still refers to a node
    fn contains(&self, handle: LiveHandle) -> bool;

    /// Ordered children of a node (empty for unknown handles)
    fn children(&self, handle: LiveHandle) -> Vec<LiveHandle>;

    fn parent(&self, handle: LiveHandle) -> Option<LiveHandle>;

    fn name(&self, handle: LiveHandle) -> Option<&str>;

    fn class_name(&self, handle: LiveHandle) -> Option<&str>;

    fn set_name(&mut self, handle: LiveHandle, name: &str);

    /// Read a property
    ///
    /// `Ok(None)` means the property exists but holds no value.
    /// `Err(UnknownProperty)` means it cannot be read at all.
    fn read_property(
        &self,
        handle: LiveHandle,
        property: &str,
    ) -> Result<Option<Variant>, LiveTreeError>;

    fn write_property(
        &mut self,
        handle: LiveHandle,
        property: &str,
        value: Variant,
    ) -> Result<(), LiveTreeError>;

    /// Names of the properties this node currently carries
    ///
    /// Hosts that cannot enumerate properties return nothing, in which
    /// case callers only look at the keys a virtual node specifies.
    fn property_names(&self, _handle: LiveHandle) -> Vec<String> {
        Vec::new()
    }

    /// Nodes the host refuses to have deleted
    fn is_deletion_protected(&self, handle: LiveHandle) -> bool;

    /// `new` has taken the place of `old`, which is about to be destroyed
    ///
    /// Hosts that keep their own references to nodes (a root handle, say)
    /// move them over here.
    fn replaced(&mut self, _old: LiveHandle, _new: LiveHandle) {}

    fn tags(&self, handle: LiveHandle) -> Vec<String> {
        match self.read_property(handle, "Tags") {
            Ok(Some(Variant::Tags(tags))) => tags,
            _ => Vec::new(),
        }
    }

    fn attributes(&self, handle: LiveHandle) -> BTreeMap<String, Variant> {
        match self.read_property(handle, "Attributes") {
            Ok(Some(Variant::Attributes(attributes))) => attributes,
            _ => BTreeMap::new(),
        }
    }
}
