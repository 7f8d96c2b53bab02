use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// RouteKey
///
/// Opaque identifier of a route node. Stable across locale and session changes, so it is
/// the handle used for cache tracking, breadcrumb lookups and the home route.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, Default)]
#[serde(transparent)]
#[ts(export)]
pub struct RouteKey(String);

impl RouteKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RouteKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RouteKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// RouteMeta
///
/// Display and access metadata attached to every route node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, Default)]
#[serde(default)]
#[ts(export)]
pub struct RouteMeta {
    /// Fallback title, used when the locale has no entry for `i18n_key`.
    pub title: String,
    pub i18n_key: Option<String>,
    pub icon: Option<String>,
    pub hide_in_menu: bool,
    /// Marks the view as eligible for view-state caching.
    pub keep_alive: bool,
    /// Role codes allowed to reach this node. Empty means unrestricted.
    pub roles: Vec<String>,
    /// Constant routes are reachable without authentication.
    pub constant: bool,
    /// External link opened instead of rendering a view.
    pub href: Option<String>,
}

/// RouteKind
///
/// Tagged variant of a route node. Only groups own children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum RouteKind {
    /// A page rendered by a view component.
    Leaf { component: String },
    /// Pure redirect to another route key.
    Redirect { to: RouteKey },
    /// A layout grouping; renders its children.
    Group { children: Vec<RouteNode> },
}

/// RouteNode
///
/// One entry in a hierarchical route tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RouteNode {
    pub key: RouteKey,
    /// Path template relative to the parent (absolute for top-level nodes).
    pub path: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub meta: RouteMeta,
    #[serde(flatten)]
    pub kind: RouteKind,
}

impl RouteNode {
    pub fn leaf(key: &str, path: &str, component: &str) -> Self {
        Self {
            key: RouteKey::new(key),
            path: path.to_string(),
            order: 0,
            meta: RouteMeta {
                title: key.to_string(),
                ..RouteMeta::default()
            },
            kind: RouteKind::Leaf {
                component: component.to_string(),
            },
        }
    }

    pub fn redirect(key: &str, path: &str, to: &str) -> Self {
        Self {
            key: RouteKey::new(key),
            path: path.to_string(),
            order: 0,
            meta: RouteMeta {
                title: key.to_string(),
                hide_in_menu: true,
                ..RouteMeta::default()
            },
            kind: RouteKind::Redirect {
                to: RouteKey::new(to),
            },
        }
    }

    pub fn group(key: &str, path: &str, children: Vec<RouteNode>) -> Self {
        Self {
            key: RouteKey::new(key),
            path: path.to_string(),
            order: 0,
            meta: RouteMeta {
                title: key.to_string(),
                ..RouteMeta::default()
            },
            kind: RouteKind::Group { children },
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.meta.roles = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_meta(mut self, update: impl FnOnce(&mut RouteMeta)) -> Self {
        update(&mut self.meta);
        self
    }

    pub fn children(&self) -> &[RouteNode] {
        match &self.kind {
            RouteKind::Group { children } => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<RouteNode>> {
        match &mut self.kind {
            RouteKind::Group { children } => Some(children),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, RouteKind::Group { .. })
    }

    /// A leaf is a page without children. Redirects are not leaves.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, RouteKind::Leaf { .. })
    }

    /// Pre-order traversal: the node itself, then its descendants.
    pub fn walk(&self) -> Vec<&RouteNode> {
        let mut out = vec![self];
        for child in self.children() {
            out.extend(child.walk());
        }
        out
    }
}

/// Every key in the tree, parents before children.
pub fn keys(tree: &[RouteNode]) -> Vec<RouteKey> {
    tree.iter()
        .flat_map(|node| node.walk())
        .map(|node| node.key.clone())
        .collect()
}

/// Depth-first lookup by key.
pub fn find<'a>(tree: &'a [RouteNode], key: &RouteKey) -> Option<&'a RouteNode> {
    tree.iter()
        .flat_map(|node| node.walk())
        .find(|node| &node.key == key)
}

/// Total node count including nested children.
pub fn count(tree: &[RouteNode]) -> usize {
    tree.iter().map(|node| node.walk().len()).sum()
}
