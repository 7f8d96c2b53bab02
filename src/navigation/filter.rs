use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::node::{RouteKind, RouteNode};

/// AuthoritySet
///
/// Role codes held by the current session, plus the super flag that bypasses
/// permission filtering entirely.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthoritySet {
    pub roles: BTreeSet<String>,
    pub super_bypass: bool,
}

impl AuthoritySet {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            super_bypass: false,
        }
    }

    pub fn super_user() -> Self {
        Self {
            roles: BTreeSet::new(),
            super_bypass: true,
        }
    }

    /// True when at least one of `required` is held.
    pub fn grants_any(&self, required: &[String]) -> bool {
        required.iter().any(|role| self.roles.contains(role))
    }
}

/// EmptyAuthorityPolicy
///
/// What a caller who is not super and holds no role at all may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyAuthorityPolicy {
    /// No authorized route at all.
    #[default]
    DenyAll,
    /// Only the routes that declare no role requirement.
    UnrestrictedOnly,
}

impl EmptyAuthorityPolicy {
    pub fn parse(value: &str) -> Self {
        match value {
            "unrestricted" | "unrestricted_only" => Self::UnrestrictedOnly,
            _ => Self::DenyAll,
        }
    }
}

/// filter
///
/// Narrows `tree` to the nodes the caller may reach. A node is kept iff it declares no
/// role requirement or shares a role with `authority`. Children are only visited for kept
/// nodes, and a group left with no children is dropped. Order is preserved.
pub fn filter(
    tree: &[RouteNode],
    authority: &AuthoritySet,
    policy: EmptyAuthorityPolicy,
) -> Vec<RouteNode> {
    if authority.super_bypass {
        return tree.to_vec();
    }
    if authority.roles.is_empty() && policy == EmptyAuthorityPolicy::DenyAll {
        return Vec::new();
    }
    tree.iter()
        .filter_map(|node| filter_node(node, authority))
        .collect()
}

fn filter_node(node: &RouteNode, authority: &AuthoritySet) -> Option<RouteNode> {
    let required = &node.meta.roles;
    if !required.is_empty() && !authority.grants_any(required) {
        return None;
    }

    match &node.kind {
        RouteKind::Group { children } => {
            let kept: Vec<RouteNode> = children
                .iter()
                .filter_map(|child| filter_node(child, authority))
                .collect();
            if kept.is_empty() {
                return None;
            }
            Some(RouteNode {
                kind: RouteKind::Group { children: kept },
                ..node.clone()
            })
        }
        _ => Some(node.clone()),
    }
}
