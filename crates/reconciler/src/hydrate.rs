//! Hydration
//!
//! Assigns identities to an existing live tree using a virtual tree as the
//! guide. Runs once per session; Diff relies on the mappings it leaves in
//! the registry.

use crate::cooperative::YieldBudget;
use crate::error::{ReconcileError, Result};
use crate::instance_map::InstanceMap;
use crate::matching::{match_children, MatchingSession};
use tracing::{debug, info, warn};
use treesync_core::{LiveHandle, LiveTree, VirtualNodes};

/// Map `root_id` to `root_handle` and recursively pair up their descendants
///
/// Child ids missing from `nodes` are logged and skipped. A fresh matching
/// session is used when `session` is `None`.
pub fn hydrate<T: LiveTree + ?Sized>(
    instances: &mut InstanceMap,
    tree: &T,
    nodes: &VirtualNodes,
    root_id: &str,
    root_handle: LiveHandle,
    session: Option<&mut MatchingSession>,
    budget: &mut YieldBudget<'_>,
) -> Result<()> {
    if !nodes.contains_key(root_id) {
        return Err(ReconcileError::MissingRoot(root_id.to_string()));
    }

    let mut local = MatchingSession::new();
    let session = session.unwrap_or(&mut local);

    let before = instances.size();
    hydrate_node(instances, tree, nodes, root_id, root_handle, session, budget)?;

    info!(
        "Hydration mapped {} nodes under {}",
        instances.size().saturating_sub(before),
        root_id
    );
    Ok(())
}

fn hydrate_node<T: LiveTree + ?Sized>(
    instances: &mut InstanceMap,
    tree: &T,
    nodes: &VirtualNodes,
    id: &str,
    handle: LiveHandle,
    session: &mut MatchingSession,
    budget: &mut YieldBudget<'_>,
) -> Result<()> {
    instances.insert(id, handle);
    budget.tick()?;

    let Some(node) = nodes.get(id) else {
        return Ok(());
    };

    let valid_children: Vec<String> = node
        .children
        .iter()
        .filter(|child| {
            let known = nodes.contains_key(child.as_str());
            if !known {
                warn!("Node {} lists unknown child {}, skipping", id, child);
            }
            known
        })
        .cloned()
        .collect();

    let live_children = tree.children(handle);
    if valid_children.is_empty() && live_children.is_empty() {
        return Ok(());
    }

    let result = match_children(
        session,
        tree,
        &valid_children,
        &live_children,
        nodes,
        Some((id, handle)),
    );

    for (child_id, child_handle) in &result.matched {
        hydrate_node(instances, tree, nodes, child_id, *child_handle, session, budget)?;
    }

    if !result.unmatched_virtual.is_empty() {
        debug!(
            "{} children of {} have no live counterpart: {:?}",
            result.unmatched_virtual.len(),
            id,
            result.unmatched_virtual
        );
    }

    Ok(())
}
