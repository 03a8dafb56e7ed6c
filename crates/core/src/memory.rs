//! In-memory live tree
//!
//! A `LiveTree` backed by an arena of nodes. Hosts without a tree of their
//! own (the CLI, tests, benchmarks) use it as the live side. It serializes
//! to a JSON dump so a live tree can be persisted between runs.

use crate::error::LiveTreeError;
use crate::live::{LiveHandle, LiveTree};
use crate::variant::Variant;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// A single node stored in a `MemoryTree`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryNode {
    pub class_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<LiveHandle>,
    #[serde(default)]
    pub children: Vec<LiveHandle>,
    #[serde(default)]
    pub properties: BTreeMap<String, Variant>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub protected: bool,
}

/// Arena-backed live tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryTree {
    root: LiveHandle,
    next_handle: u64,
    nodes: AHashMap<LiveHandle, MemoryNode>,
    /// Node types `create_node` refuses
    #[serde(default)]
    rejected_classes: BTreeSet<String>,
    /// Properties whose writes are refused
    #[serde(default)]
    locked_properties: BTreeSet<String>,
    /// Properties that cannot be read
    #[serde(default)]
    hidden_properties: BTreeSet<String>,
}

impl MemoryTree {
    /// Create a tree holding only a root node
    pub fn new(root_class: &str, root_name: &str) -> Self {
        let root = LiveHandle::new(1);
        let mut nodes = AHashMap::new();
        nodes.insert(
            root,
            MemoryNode {
                class_name: root_class.to_string(),
                name: root_name.to_string(),
                parent: None,
                children: Vec::new(),
                properties: BTreeMap::new(),
                protected: false,
            },
        );

        Self {
            root,
            next_handle: 2,
            nodes,
            rejected_classes: BTreeSet::new(),
            locked_properties: BTreeSet::new(),
            hidden_properties: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> LiveHandle {
        self.root
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, handle: LiveHandle) -> Option<&MemoryNode> {
        self.nodes.get(&handle)
    }

    /// Insert a fully-formed child under `parent`
    pub fn insert(
        &mut self,
        parent: LiveHandle,
        class_name: &str,
        name: &str,
        properties: impl IntoIterator<Item = (String, Variant)>,
    ) -> LiveHandle {
        let handle = self.allocate(class_name);
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.name = name.to_string();
            node.properties = properties.into_iter().collect();
        }
        self.attach(handle, parent);
        handle
    }

    /// Find a direct child by name
    pub fn find_child(&self, parent: LiveHandle, name: &str) -> Option<LiveHandle> {
        self.nodes
            .get(&parent)?
            .children
            .iter()
            .copied()
            .find(|child| self.name(*child) == Some(name))
    }

    /// Make `create_node` fail for this type
    pub fn reject_class(&mut self, class_name: &str) {
        self.rejected_classes.insert(class_name.to_string());
    }

    /// Make `write_property` fail for this property
    pub fn lock_property(&mut self, property: &str) {
        self.locked_properties.insert(property.to_string());
    }

    /// Make `read_property` fail for this property
    pub fn hide_property(&mut self, property: &str) {
        self.hidden_properties.insert(property.to_string());
    }

    /// Flag a node as non-deletable
    pub fn protect(&mut self, handle: LiveHandle) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.protected = true;
        }
    }

    /// Load a tree from a JSON dump
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }

    /// Write the tree as a JSON dump
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, content)
    }

    fn allocate(&mut self, class_name: &str) -> LiveHandle {
        let handle = LiveHandle::new(self.next_handle);
        self.next_handle += 1;
        self.nodes.insert(
            handle,
            MemoryNode {
                class_name: class_name.to_string(),
                name: class_name.to_string(),
                parent: None,
                children: Vec::new(),
                properties: BTreeMap::new(),
                protected: false,
            },
        );
        handle
    }

    fn attach(&mut self, handle: LiveHandle, parent: LiveHandle) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.parent = Some(parent);
        }
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(handle);
        }
    }

    fn detach(&mut self, handle: LiveHandle) {
        let old_parent = self.nodes.get_mut(&handle).and_then(|node| node.parent.take());
        if let Some(old_parent) = old_parent {
            if let Some(parent_node) = self.nodes.get_mut(&old_parent) {
                parent_node.children.retain(|child| *child != handle);
            }
        }
    }

    fn is_ancestor(&self, ancestor: LiveHandle, mut handle: LiveHandle) -> bool {
        loop {
            if handle == ancestor {
                return true;
            }
            match self.parent(handle) {
                Some(parent) => handle = parent,
                None => return false,
            }
        }
    }
}

impl LiveTree for MemoryTree {
    fn create_node(&mut self, class_name: &str) -> Result<LiveHandle, LiveTreeError> {
        if class_name.is_empty() || self.rejected_classes.contains(class_name) {
            return Err(LiveTreeError::UnsupportedClass(class_name.to_string()));
        }
        Ok(self.allocate(class_name))
    }

    fn destroy_node(&mut self, handle: LiveHandle) {
        if !self.nodes.contains_key(&handle) {
            return;
        }
        self.detach(handle);

        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }
    }

    fn reparent(
        &mut self,
        handle: LiveHandle,
        parent: Option<LiveHandle>,
    ) -> Result<(), LiveTreeError> {
        if !self.nodes.contains_key(&handle) {
            return Err(LiveTreeError::InvalidHandle(handle));
        }
        if let Some(parent) = parent {
            if !self.nodes.contains_key(&parent) {
                return Err(LiveTreeError::InvalidHandle(parent));
            }
            // Refuse cycles
            if self.is_ancestor(handle, parent) {
                return Err(LiveTreeError::InvalidHandle(parent));
            }
        }

        self.detach(handle);
        if let Some(parent) = parent {
            self.attach(handle, parent);
        }
        Ok(())
    }

    fn contains(&self, handle: LiveHandle) -> bool {
        self.nodes.contains_key(&handle)
    }

    fn children(&self, handle: LiveHandle) -> Vec<LiveHandle> {
        self.nodes
            .get(&handle)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    fn parent(&self, handle: LiveHandle) -> Option<LiveHandle> {
        self.nodes.get(&handle)?.parent
    }

    fn name(&self, handle: LiveHandle) -> Option<&str> {
        self.nodes.get(&handle).map(|node| node.name.as_str())
    }

    fn class_name(&self, handle: LiveHandle) -> Option<&str> {
        self.nodes.get(&handle).map(|node| node.class_name.as_str())
    }

    fn set_name(&mut self, handle: LiveHandle, name: &str) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.name = name.to_string();
        }
    }

    fn read_property(
        &self,
        handle: LiveHandle,
        property: &str,
    ) -> Result<Option<Variant>, LiveTreeError> {
        let node = self
            .nodes
            .get(&handle)
            .ok_or(LiveTreeError::InvalidHandle(handle))?;

        if self.hidden_properties.contains(property) {
            return Err(LiveTreeError::UnknownProperty {
                class_name: node.class_name.clone(),
                property: property.to_string(),
            });
        }

        Ok(node.properties.get(property).cloned())
    }

    fn write_property(
        &mut self,
        handle: LiveHandle,
        property: &str,
        value: Variant,
    ) -> Result<(), LiveTreeError> {
        if self.locked_properties.contains(property) {
            return Err(LiveTreeError::WriteRejected {
                property: property.to_string(),
                reason: "property is read-only".to_string(),
            });
        }

        let node = self
            .nodes
            .get_mut(&handle)
            .ok_or(LiveTreeError::InvalidHandle(handle))?;
        node.properties.insert(property.to_string(), value);
        Ok(())
    }

    fn property_names(&self, handle: LiveHandle) -> Vec<String> {
        self.nodes
            .get(&handle)
            .map(|node| {
                node.properties
                    .keys()
                    .filter(|key| !self.hidden_properties.contains(*key))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn is_deletion_protected(&self, handle: LiveHandle) -> bool {
        self.nodes.get(&handle).is_some_and(|node| node.protected)
    }

    fn replaced(&mut self, old: LiveHandle, new: LiveHandle) {
        if self.root == old {
            self.root = new;
        }
    }
}
