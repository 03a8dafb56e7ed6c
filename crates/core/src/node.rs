//! Virtual tree representation
//!
//! A virtual tree is the desired shape of the live tree, received as a flat
//! map from identity to node. Nodes reference their children by id.

use crate::variant::Variant;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flat id -> node lookup for one virtual tree
pub type VirtualNodes = AHashMap<String, VirtualNode>;

/// Per-node flags carried alongside a virtual node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    /// Leave live children that have no virtual counterpart alone
    #[serde(default)]
    pub ignore_unknown_instances: bool,
}

/// One node of the virtual tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VirtualNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub class_name: String,
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Variant>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NodeMetadata>,
}

impl VirtualNode {
    /// Create a node with no properties or children
    pub fn new(id: impl Into<String>, class_name: &str, name: &str) -> Self {
        Self {
            id: id.into(),
            parent: None,
            class_name: class_name.to_string(),
            name: name.to_string(),
            properties: BTreeMap::new(),
            children: Vec::new(),
            metadata: None,
        }
    }

    /// Builder-style property setter
    pub fn with_property(mut self, name: &str, value: impl Into<Variant>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    pub fn ignores_unknown_children(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(|metadata| metadata.ignore_unknown_instances)
    }
}

/// A complete virtual tree plus the id of its root
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualSnapshot {
    pub root_id: String,
    pub instances: VirtualNodes,
}

impl VirtualSnapshot {
    /// Start a snapshot from its root node
    pub fn new(root: VirtualNode) -> Self {
        let root_id = root.id.clone();
        let mut instances = VirtualNodes::new();
        instances.insert(root_id.clone(), root);
        Self { root_id, instances }
    }

    /// Add `node` as the last child of `parent_id`
    ///
    /// Returns the id of the inserted node.
    pub fn add_child(&mut self, parent_id: &str, mut node: VirtualNode) -> String {
        let id = node.id.clone();
        node.parent = Some(parent_id.to_string());
        if let Some(parent) = self.instances.get_mut(parent_id) {
            parent.children.push(id.clone());
        }
        self.instances.insert(id.clone(), node);
        id
    }

    pub fn get(&self, id: &str) -> Option<&VirtualNode> {
        self.instances.get(id)
    }

    pub fn root(&self) -> Option<&VirtualNode> {
        self.instances.get(&self.root_id)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
