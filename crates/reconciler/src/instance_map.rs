//! Identity registry
//!
//! Bidirectional map between stable string identities and live handles.
//! Also tracks which handles have change notifications paused while the
//! reconciler itself writes to them.

use ahash::{AHashMap, AHashSet};
use treesync_core::{LiveHandle, LiveTree};

#[derive(Debug, Default)]
pub struct InstanceMap {
    from_ids: AHashMap<String, LiveHandle>,
    from_handles: AHashMap<LiveHandle, String>,
    paused: AHashSet<LiveHandle>,
}

impl InstanceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked identities
    pub fn size(&self) -> usize {
        self.from_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from_ids.is_empty()
    }

    /// Map `id` to `handle`
    ///
    /// Any previous mapping of either side is replaced, so the registry
    /// never holds two ids for one handle or two handles for one id.
    pub fn insert(&mut self, id: &str, handle: LiveHandle) {
        if let Some(old_handle) = self.from_ids.remove(id) {
            self.from_handles.remove(&old_handle);
        }
        if let Some(old_id) = self.from_handles.remove(&handle) {
            self.from_ids.remove(&old_id);
        }

        self.from_ids.insert(id.to_string(), handle);
        self.from_handles.insert(handle, id.to_string());
    }

    pub fn get_handle(&self, id: &str) -> Option<LiveHandle> {
        self.from_ids.get(id).copied()
    }

    pub fn get_id(&self, handle: LiveHandle) -> Option<&str> {
        self.from_handles.get(&handle).map(String::as_str)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.from_ids.contains_key(id)
    }

    pub fn contains_handle(&self, handle: LiveHandle) -> bool {
        self.from_handles.contains_key(&handle)
    }

    /// Forget `id` (no-op when absent)
    pub fn remove_by_id(&mut self, id: &str) {
        if let Some(handle) = self.from_ids.remove(id) {
            self.from_handles.remove(&handle);
            self.paused.remove(&handle);
        }
    }

    /// Forget `handle` (no-op when absent)
    pub fn remove_by_handle(&mut self, handle: LiveHandle) {
        if let Some(id) = self.from_handles.remove(&handle) {
            self.from_ids.remove(&id);
        }
        self.paused.remove(&handle);
    }

    /// Destroy the node mapped to `id` along with its subtree
    pub fn destroy_by_id<T: LiveTree + ?Sized>(&mut self, tree: &mut T, id: &str) {
        if let Some(handle) = self.get_handle(id) {
            self.destroy_by_handle(tree, handle);
        }
    }

    /// Destroy `handle` and its subtree
    ///
    /// Every registry entry beneath it is dropped before the adapter
    /// destroys the nodes.
    pub fn destroy_by_handle<T: LiveTree + ?Sized>(&mut self, tree: &mut T, handle: LiveHandle) {
        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            stack.extend(tree.children(current));
            self.remove_by_handle(current);
        }
        tree.destroy_node(handle);
    }

    /// Suppress change notifications for `handle`
    pub fn pause(&mut self, handle: LiveHandle) {
        self.paused.insert(handle);
    }

    pub fn unpause(&mut self, handle: LiveHandle) {
        self.paused.remove(&handle);
    }

    pub fn unpause_all(&mut self) {
        self.paused.clear();
    }

    /// Whether change notifications for `handle` should be ignored
    pub fn is_paused(&self, handle: LiveHandle) -> bool {
        self.paused.contains(&handle)
    }

    /// Iterate over every (id, handle) pair
    pub fn iter(&self) -> impl Iterator<Item = (&str, LiveHandle)> {
        self.from_ids
            .iter()
            .map(|(id, handle)| (id.as_str(), *handle))
    }

    /// Destroy every tracked node and clear the registry
    ///
    /// Session teardown. Nodes already gone with a destroyed ancestor are
    /// skipped.
    pub fn stop<T: LiveTree + ?Sized>(&mut self, tree: &mut T) {
        for handle in self.from_handles.keys() {
            if tree.contains(*handle) {
                tree.destroy_node(*handle);
            }
        }
        self.release();
    }

    /// Forget every tracked handle, leaving the nodes to the host
    pub fn release(&mut self) {
        self.from_ids.clear();
        self.from_handles.clear();
        self.paused.clear();
    }
}
