use indexmap::IndexMap;

use super::node::{RouteKey, RouteNode};

/// merge
///
/// Combines constant and authorized routes into one ordered tree. Nodes sharing a key are
/// de-duplicated with the later one winning; the winner keeps the slot of the first
/// occurrence. The result is stably sorted by `order`, recursively.
pub fn merge(constant: &[RouteNode], authorized: &[RouteNode]) -> Vec<RouteNode> {
    let mut by_key: IndexMap<RouteKey, RouteNode> = IndexMap::new();
    for node in constant.iter().chain(authorized) {
        if by_key.insert(node.key.clone(), node.clone()).is_some() {
            tracing::debug!(key = %node.key, "route overridden during merge");
        }
    }
    sort_by_order(by_key.into_values().collect())
}

/// sort_by_order
///
/// Ascending by `order`, ties keep their relative position. The top level is only sorted.
/// Children of groups are first de-duplicated by key (later sibling wins, in the slot of the
/// first) and then sorted with the same rule, at every depth.
pub fn sort_by_order(mut tree: Vec<RouteNode>) -> Vec<RouteNode> {
    // Stable: equal orders keep declaration order.
    tree.sort_by_key(|node| node.order);
    for node in &mut tree {
        if let Some(children) = node.children_mut() {
            let taken = std::mem::take(children);
            *children = merge(&[], &taken);
        }
    }
    tree
}
