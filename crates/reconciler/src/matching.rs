//! Cost-based child matching
//!
//! Pairs the virtual children of one node with the live children of its
//! live counterpart:
//!
//! - **Grouping**: both sides are bucketed by `(name, class name)`.
//! - **Unambiguous pass**: a bucket with exactly one candidate per side is
//!   paired immediately.
//! - **Ambiguous pass**: every remaining candidate pair in a bucket is
//!   scored by how many changes pairing them would cause, recursively
//!   through their own children. Pairs are then assigned greedily,
//!   cheapest first, ties going to the pair scored first.
//!
//! Every child left unpaired adds `UNMATCHED_PENALTY` to the total, which
//! dwarfs any realistic per-node diff cost, so leaving two compatible
//! candidates apart is never cheaper than pairing them.
//!
//! Results are memoized in a `MatchingSession` that lives for one
//! hydration pass.

use ahash::AHashMap;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::debug;
use treesync_core::{variant_eq, LiveHandle, LiveTree, Variant, VirtualNode, VirtualNodes};

/// Cost of leaving one child without a partner
pub const UNMATCHED_PENALTY: u64 = 10_000;

/// Properties compared as tag/attribute sets rather than plain values
const TAGS_PROPERTY: &str = "Tags";
const ATTRIBUTES_PROPERTY: &str = "Attributes";

/// Outcome of matching one set of siblings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    /// Paired (virtual id, live handle), in virtual child order
    pub matched: Vec<(String, LiveHandle)>,
    /// Virtual children with no live partner (to be added)
    pub unmatched_virtual: Vec<String>,
    /// Live children with no virtual partner (candidates for removal)
    pub unmatched_live: Vec<LiveHandle>,
    pub total_cost: u64,
}

/// Memoization for one hydration pass
///
/// Live tree shapes change between refreshes, so a session must not
/// outlive the pass it was created for.
#[derive(Debug, Default)]
pub struct MatchingSession {
    cost_cache: AHashMap<(String, LiveHandle), u64>,
    match_cache: AHashMap<(String, LiveHandle), Rc<MatchResult>>,
}

impl MatchingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached full cost of pairing `id` with `handle`
    pub fn cached_cost(&self, id: &str, handle: LiveHandle) -> Option<u64> {
        self.cost_cache.get(&(id.to_string(), handle)).copied()
    }

    /// Number of memoized sibling matches
    pub fn cached_matches(&self) -> usize {
        self.match_cache.len()
    }
}

/// Candidates sharing one `(name, class name)` key
#[derive(Default)]
struct Group {
    virtual_indices: SmallVec<[usize; 4]>,
    live_indices: SmallVec<[usize; 4]>,
}

/// A scored candidate pair from the ambiguous pass
struct Candidate {
    cost: u64,
    virtual_index: usize,
    live_index: usize,
}

/// Match `virtual_children` against `live_children`
///
/// When `parent` (the virtual id and live handle owning these children) is
/// given, the result is memoized and later calls return the same `Rc`.
pub fn match_children<T: LiveTree + ?Sized>(
    session: &mut MatchingSession,
    tree: &T,
    virtual_children: &[String],
    live_children: &[LiveHandle],
    nodes: &VirtualNodes,
    parent: Option<(&str, LiveHandle)>,
) -> Rc<MatchResult> {
    // 1. Cache check
    let cache_key = parent.map(|(id, handle)| (id.to_string(), handle));
    if let Some(key) = &cache_key {
        if let Some(cached) = session.match_cache.get(key) {
            return Rc::clone(cached);
        }
    }

    let virtual_nodes: Vec<&VirtualNode> = virtual_children
        .iter()
        .filter_map(|id| {
            let node = nodes.get(id);
            if node.is_none() {
                debug!("Skipping child id {} missing from virtual tree", id);
            }
            node
        })
        .collect();
    let live_nodes: Vec<LiveHandle> = live_children
        .iter()
        .copied()
        .filter(|handle| tree.contains(*handle))
        .collect();

    // 2. Grouping by (name, class name), in first-seen order
    let mut groups: Vec<Group> = Vec::new();
    let mut group_index: AHashMap<(&str, &str), usize> = AHashMap::new();

    for (i, node) in virtual_nodes.iter().enumerate() {
        let key = (node.name.as_str(), node.class_name.as_str());
        let slot = *group_index.entry(key).or_insert_with(|| {
            groups.push(Group::default());
            groups.len() - 1
        });
        groups[slot].virtual_indices.push(i);
    }
    for (i, handle) in live_nodes.iter().enumerate() {
        let (Some(name), Some(class_name)) = (tree.name(*handle), tree.class_name(*handle)) else {
            continue;
        };
        if let Some(&slot) = group_index.get(&(name, class_name)) {
            groups[slot].live_indices.push(i);
        }
    }

    let mut virtual_taken = vec![false; virtual_nodes.len()];
    let mut live_taken = vec![false; live_nodes.len()];
    let mut pairs: Vec<(usize, usize)> = Vec::new();

    // 3. Unambiguous pass
    for group in &groups {
        if group.virtual_indices.len() == 1 && group.live_indices.len() == 1 {
            let (vi, li) = (group.virtual_indices[0], group.live_indices[0]);
            virtual_taken[vi] = true;
            live_taken[li] = true;
            pairs.push((vi, li));
        }
    }

    // 4. Ambiguous pass: score every candidate pair
    let mut candidates: Vec<Candidate> = Vec::new();
    for group in &groups {
        if group.virtual_indices.is_empty() || group.live_indices.is_empty() {
            continue;
        }
        if group.virtual_indices.len() == 1 && group.live_indices.len() == 1 {
            continue;
        }

        let mut best = u64::MAX;
        for &vi in &group.virtual_indices {
            for &li in &group.live_indices {
                let cost =
                    score_pair(session, tree, nodes, virtual_nodes[vi], live_nodes[li], best);
                best = best.min(cost);
                candidates.push(Candidate {
                    cost,
                    virtual_index: vi,
                    live_index: li,
                });
            }
        }
    }

    // 5. Greedy assignment, cheapest first; stable sort keeps scoring order on ties
    if !candidates.is_empty() {
        candidates.sort_by_key(|candidate| candidate.cost);
        let mut resolved = 0usize;
        for candidate in &candidates {
            if virtual_taken[candidate.virtual_index] || live_taken[candidate.live_index] {
                continue;
            }
            virtual_taken[candidate.virtual_index] = true;
            live_taken[candidate.live_index] = true;
            pairs.push((candidate.virtual_index, candidate.live_index));
            resolved += 1;
        }
        debug!(
            "Resolved {} ambiguous pairs from {} candidates",
            resolved,
            candidates.len()
        );
    }

    pairs.sort_unstable();

    // 6. Residual penalty
    let unmatched_virtual: Vec<String> = virtual_nodes
        .iter()
        .zip(&virtual_taken)
        .filter(|(_, taken)| !**taken)
        .map(|(node, _)| node.id.clone())
        .collect();
    let unmatched_live: Vec<LiveHandle> = live_nodes
        .iter()
        .zip(&live_taken)
        .filter(|(_, taken)| !**taken)
        .map(|(handle, _)| *handle)
        .collect();
    let mut total_cost =
        UNMATCHED_PENALTY * (unmatched_virtual.len() + unmatched_live.len()) as u64;

    // 7. Sum matched pair costs and memoize
    let mut matched = Vec::with_capacity(pairs.len());
    for (vi, li) in pairs {
        let node = virtual_nodes[vi];
        let handle = live_nodes[li];
        total_cost += pair_cost(session, tree, nodes, node, handle);
        matched.push((node.id.clone(), handle));
    }

    let result = Rc::new(MatchResult {
        matched,
        unmatched_virtual,
        unmatched_live,
        total_cost,
    });

    if let Some(key) = cache_key {
        session.match_cache.insert(key, Rc::clone(&result));
    }
    result
}

/// Full cost of pairing `node` with `handle`, memoized
pub fn pair_cost<T: LiveTree + ?Sized>(
    session: &mut MatchingSession,
    tree: &T,
    nodes: &VirtualNodes,
    node: &VirtualNode,
    handle: LiveHandle,
) -> u64 {
    score_pair(session, tree, nodes, node, handle, u64::MAX)
}

/// Score a candidate pair
///
/// When the node's own cost already exceeds `best`, the subtree is not
/// explored and the (partial) own cost is returned uncached.
fn score_pair<T: LiveTree + ?Sized>(
    session: &mut MatchingSession,
    tree: &T,
    nodes: &VirtualNodes,
    node: &VirtualNode,
    handle: LiveHandle,
    best: u64,
) -> u64 {
    let key = (node.id.clone(), handle);
    if let Some(&cost) = session.cost_cache.get(&key) {
        return cost;
    }

    let own = own_cost(tree, nodes, node, handle);
    if own > best {
        return own;
    }

    let virtual_children: Vec<String> = node
        .children
        .iter()
        .filter(|id| nodes.contains_key(*id))
        .cloned()
        .collect();
    let live_children = tree.children(handle);

    let children_cost = match (virtual_children.is_empty(), live_children.is_empty()) {
        (true, true) => 0,
        // One side has children the other can never match
        (true, false) | (false, true) => {
            UNMATCHED_PENALTY * (virtual_children.len() + live_children.len()) as u64
        }
        (false, false) => {
            match_children(
                session,
                tree,
                &virtual_children,
                &live_children,
                nodes,
                Some((&node.id, handle)),
            )
            .total_cost
        }
    };

    let total = own + children_cost;
    session.cost_cache.insert(key, total);
    total
}

/// Changes needed on the node itself, ignoring its children's content
fn own_cost<T: LiveTree + ?Sized>(
    tree: &T,
    nodes: &VirtualNodes,
    node: &VirtualNode,
    handle: LiveHandle,
) -> u64 {
    let mut cost = 0u64;

    let mut keys: BTreeSet<String> = node.properties.keys().cloned().collect();
    keys.extend(tree.property_names(handle));

    for key in &keys {
        if key == TAGS_PROPERTY || key == ATTRIBUTES_PROPERTY {
            continue;
        }
        let virtual_value = node.properties.get(key);
        // References cannot be compared before identities exist
        if matches!(virtual_value, Some(Variant::Ref(_))) {
            continue;
        }
        let Ok(live_value) = tree.read_property(handle, key) else {
            continue;
        };
        if matches!(live_value, Some(Variant::Ref(_))) {
            continue;
        }
        if !variant_eq(virtual_value, live_value.as_ref()) {
            cost += 1;
        }
    }

    cost += tag_mismatches(node, &tree.tags(handle));
    cost += attribute_mismatches(node, &tree.attributes(handle));

    let virtual_child_count = node
        .children
        .iter()
        .filter(|id| nodes.contains_key(*id))
        .count();
    if virtual_child_count != tree.children(handle).len() {
        cost += 1;
    }

    cost
}

fn tag_mismatches(node: &VirtualNode, live_tags: &[String]) -> u64 {
    let virtual_tags: BTreeSet<&str> = match node.properties.get(TAGS_PROPERTY) {
        Some(Variant::Tags(tags)) => tags.iter().map(String::as_str).collect(),
        _ => BTreeSet::new(),
    };
    let live_tags: BTreeSet<&str> = live_tags.iter().map(String::as_str).collect();
    virtual_tags.symmetric_difference(&live_tags).count() as u64
}

fn attribute_mismatches(
    node: &VirtualNode,
    live_attributes: &std::collections::BTreeMap<String, Variant>,
) -> u64 {
    let empty = std::collections::BTreeMap::new();
    let virtual_attributes = match node.properties.get(ATTRIBUTES_PROPERTY) {
        Some(Variant::Attributes(attributes)) => attributes,
        _ => &empty,
    };
    let keys: BTreeSet<&String> = virtual_attributes
        .keys()
        .chain(live_attributes.keys())
        .collect();
    keys.into_iter()
        .filter(|key| !variant_eq(virtual_attributes.get(*key), live_attributes.get(*key)))
        .count() as u64
}
