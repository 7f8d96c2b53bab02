use std::collections::HashMap;

use super::catalog::ROOT_ROUTE_KEY;
use super::node::{RouteKey, RouteKind, RouteMeta, RouteNode};

/// Materialized form of a route kind inside the live router.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    Leaf { component: String },
    Redirect { to: RouteKey },
    /// Groups redirect to their first child when visited directly.
    Group { first_child: Option<RouteKey> },
}

/// LiveNavigationEntry
///
/// A route node registered into the live router. `path` is absolute (joined with the
/// parent path), `parent` links nested entries back to their group.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveNavigationEntry {
    pub key: RouteKey,
    pub path: String,
    pub parent: Option<RouteKey>,
    pub kind: EntryKind,
    pub meta: RouteMeta,
}

impl LiveNavigationEntry {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, EntryKind::Leaf { .. })
    }
}

/// RetractionHandle
///
/// Opaque token returned by a registration. Not `Clone`: one registration, one handle.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RetractionHandle(u64);

/// LiveRouter
///
/// The navigation table routes are registered into. Retracting an already retracted
/// handle must be a no-op.
pub trait LiveRouter: Send + Sync {
    fn register(&mut self, entry: LiveNavigationEntry) -> RetractionHandle;
    fn retract(&mut self, handle: &RetractionHandle);
    fn resolve(&self, key: &RouteKey) -> Option<&LiveNavigationEntry>;
    fn entries(&self) -> Vec<&LiveNavigationEntry>;

    fn contains(&self, key: &RouteKey) -> bool {
        self.resolve(key).is_some()
    }
}

/// MemoryRouter
///
/// In-process router: entries keyed by handle id, with a key index for lookups.
/// Registration order is preserved for `entries()`.
#[derive(Debug, Default)]
pub struct MemoryRouter {
    next_id: u64,
    entries: HashMap<u64, LiveNavigationEntry>,
    by_key: HashMap<RouteKey, u64>,
}

impl MemoryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LiveRouter for MemoryRouter {
    fn register(&mut self, entry: LiveNavigationEntry) -> RetractionHandle {
        let id = self.next_id;
        self.next_id += 1;
        // A same-key registration replaces the previous entry, like a named route would.
        if let Some(previous) = self.by_key.insert(entry.key.clone(), id) {
            self.entries.remove(&previous);
        }
        self.entries.insert(id, entry);
        RetractionHandle(id)
    }

    fn retract(&mut self, handle: &RetractionHandle) {
        if let Some(entry) = self.entries.remove(&handle.0) {
            if self.by_key.get(&entry.key) == Some(&handle.0) {
                self.by_key.remove(&entry.key);
            }
        }
    }

    fn resolve(&self, key: &RouteKey) -> Option<&LiveNavigationEntry> {
        self.by_key.get(key).and_then(|id| self.entries.get(id))
    }

    fn entries(&self) -> Vec<&LiveNavigationEntry> {
        let mut ids: Vec<&u64> = self.entries.keys().collect();
        ids.sort();
        ids.into_iter().filter_map(|id| self.entries.get(id)).collect()
    }
}

/// RegistrationHandleSet
///
/// Every handle produced by one synchronization cycle, plus the slot of the root redirect
/// so it can be patched without touching the rest.
#[derive(Debug, Default)]
pub struct RegistrationHandleSet {
    handles: Vec<RetractionHandle>,
    root: Option<usize>,
}

impl RegistrationHandleSet {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// RouterSynchronizer
///
/// Sole owner of the live router. Every registration and retraction goes through here.
pub struct RouterSynchronizer {
    router: Box<dyn LiveRouter>,
}

impl RouterSynchronizer {
    pub fn new(router: Box<dyn LiveRouter>) -> Self {
        Self { router }
    }

    /// Read-only view of the live router.
    pub fn router(&self) -> &dyn LiveRouter {
        self.router.as_ref()
    }

    /// synchronize
    ///
    /// Retracts every handle of `previous`, then registers `tree` parents-first. On return
    /// the router holds exactly the nodes of `tree`.
    pub fn synchronize(
        &mut self,
        previous: RegistrationHandleSet,
        tree: &[RouteNode],
    ) -> RegistrationHandleSet {
        self.retract_all(previous);

        let mut next = RegistrationHandleSet::default();
        for node in tree {
            self.register_node(node, None, "", &mut next);
        }
        tracing::debug!(registered = next.len(), "router synchronized");
        next
    }

    /// patch_root_redirect
    ///
    /// Re-registers only the root redirect with `home` as its target. No-op when the tree
    /// carried no root route.
    pub fn patch_root_redirect(&mut self, handles: &mut RegistrationHandleSet, home: &RouteKey) {
        let Some(slot) = handles.root else {
            return;
        };
        let Some(current) = self.router.resolve(&RouteKey::new(ROOT_ROUTE_KEY)).cloned() else {
            return;
        };

        self.router.retract(&handles.handles[slot]);
        let patched = LiveNavigationEntry {
            kind: EntryKind::Redirect { to: home.clone() },
            ..current
        };
        handles.handles[slot] = self.router.register(patched);
        tracing::debug!(%home, "root redirect patched");
    }

    /// Retracts every handle of the set.
    pub fn retract_all(&mut self, handles: RegistrationHandleSet) {
        for handle in &handles.handles {
            self.router.retract(handle);
        }
    }

    fn register_node(
        &mut self,
        node: &RouteNode,
        parent: Option<&RouteKey>,
        parent_path: &str,
        out: &mut RegistrationHandleSet,
    ) {
        debug_assert!(
            !self.router.contains(&node.key),
            "duplicate route key {} in synchronized tree",
            node.key
        );

        let path = join_path(parent_path, &node.path);
        let kind = match &node.kind {
            RouteKind::Leaf { component } => EntryKind::Leaf {
                component: component.clone(),
            },
            RouteKind::Redirect { to } => EntryKind::Redirect { to: to.clone() },
            RouteKind::Group { children } => EntryKind::Group {
                first_child: children.first().map(|child| child.key.clone()),
            },
        };

        let handle = self.router.register(LiveNavigationEntry {
            key: node.key.clone(),
            path: path.clone(),
            parent: parent.cloned(),
            kind,
            meta: node.meta.clone(),
        });
        if parent.is_none() && node.key.as_str() == ROOT_ROUTE_KEY {
            out.root = Some(out.handles.len());
        }
        out.handles.push(handle);

        for child in node.children() {
            self.register_node(child, Some(&node.key), &path, out);
        }
    }
}

fn join_path(parent: &str, path: &str) -> String {
    if path.starts_with('/') || parent.is_empty() {
        return path.to_string();
    }
    format!("{}/{}", parent.trim_end_matches('/'), path)
}
