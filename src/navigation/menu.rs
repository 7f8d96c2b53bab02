use serde::Serialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::node::{RouteKey, RouteKind, RouteNode};

/// LocaleProvider
///
/// Supplies the active locale and translated titles for menu projection.
pub trait LocaleProvider: Send + Sync {
    fn locale(&self) -> String;
    fn resolve_title(&self, i18n_key: &str, locale: &str) -> Option<String>;
}

/// StaticLocale
///
/// Message bundles held in memory, keyed by locale then i18n key. The active locale can be
/// switched at runtime.
#[derive(Debug, Default)]
pub struct StaticLocale {
    active: RwLock<String>,
    bundles: HashMap<String, HashMap<String, String>>,
}

impl StaticLocale {
    pub fn new(active: &str) -> Self {
        Self {
            active: RwLock::new(active.to_string()),
            bundles: HashMap::new(),
        }
    }

    pub fn with_bundle<I, K, V>(mut self, locale: &str, messages: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.bundles.insert(
            locale.to_string(),
            messages
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn set_locale(&self, locale: &str) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = locale.to_string();
    }
}

impl LocaleProvider for StaticLocale {
    fn locale(&self) -> String {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn resolve_title(&self, i18n_key: &str, locale: &str) -> Option<String> {
        self.bundles.get(locale)?.get(i18n_key).cloned()
    }
}

/// MenuNode
///
/// Display entry derived from a visible route node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuNode {
    pub key: RouteKey,
    pub path: String,
    pub i18n_key: Option<String>,
    /// Fallback used when the locale has no translation.
    pub default_title: String,
    pub title: String,
    pub icon: Option<String>,
    pub children: Vec<MenuNode>,
}

/// SearchEntry
///
/// One searchable leaf menu: the chain of titles from the top-level menu down to the leaf.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchEntry {
    pub titles: Vec<String>,
    pub key: RouteKey,
}

impl SearchEntry {
    pub fn label(&self) -> String {
        self.titles.join(" / ")
    }
}

/// project
///
/// Builds the visible menu tree. Hidden nodes are skipped together with their subtree, as
/// are redirects and groups left without a visible child. Group paths are joined into their children's paths.
pub fn project(tree: &[RouteNode], locale: &dyn LocaleProvider) -> Vec<MenuNode> {
    let active = locale.locale();
    tree.iter()
        .filter_map(|node| project_node(node, "", locale, &active))
        .collect()
}

fn project_node(
    node: &RouteNode,
    parent_path: &str,
    locale: &dyn LocaleProvider,
    active: &str,
) -> Option<MenuNode> {
    if node.meta.hide_in_menu || matches!(node.kind, RouteKind::Redirect { .. }) {
        return None;
    }
    let path = if node.path.starts_with('/') || parent_path.is_empty() {
        node.path.clone()
    } else {
        format!("{}/{}", parent_path.trim_end_matches('/'), node.path)
    };
    let children: Vec<MenuNode> = node
        .children()
        .iter()
        .filter_map(|child| project_node(child, &path, locale, active))
        .collect();
    if children.is_empty() && matches!(node.kind, RouteKind::Group { .. }) {
        return None;
    }

    Some(MenuNode {
        key: node.key.clone(),
        title: translate(node.meta.i18n_key.as_deref(), &node.meta.title, locale, active),
        path,
        i18n_key: node.meta.i18n_key.clone(),
        default_title: node.meta.title.clone(),
        icon: node.meta.icon.clone(),
        children,
    })
}

fn translate(
    i18n_key: Option<&str>,
    fallback: &str,
    locale: &dyn LocaleProvider,
    active: &str,
) -> String {
    i18n_key
        .and_then(|key| locale.resolve_title(key, active))
        .unwrap_or_else(|| fallback.to_string())
}

/// relocalize
///
/// Rewrites only the titles of an existing menu tree for the active locale.
pub fn relocalize(menus: &mut [MenuNode], locale: &dyn LocaleProvider) {
    let active = locale.locale();
    relocalize_with(menus, locale, &active);
}

fn relocalize_with(menus: &mut [MenuNode], locale: &dyn LocaleProvider, active: &str) {
    for menu in menus {
        menu.title = translate(menu.i18n_key.as_deref(), &menu.default_title, locale, active);
        relocalize_with(&mut menu.children, locale, active);
    }
}

/// flatten
///
/// One entry per leaf menu, in menu order.
pub fn flatten(menus: &[MenuNode]) -> Vec<SearchEntry> {
    let mut out = Vec::new();
    for menu in menus {
        flatten_into(menu, &mut Vec::new(), &mut out);
    }
    out
}

fn flatten_into(menu: &MenuNode, trail: &mut Vec<String>, out: &mut Vec<SearchEntry>) {
    trail.push(menu.title.clone());
    if menu.children.is_empty() {
        out.push(SearchEntry {
            titles: trail.clone(),
            key: menu.key.clone(),
        });
    } else {
        for child in &menu.children {
            flatten_into(child, trail, out);
        }
    }
    trail.pop();
}

/// Case-insensitive fuzzy match: every character of `query` must appear in order in the
/// entry label. An empty query matches nothing.
pub fn search<'a>(entries: &'a [SearchEntry], query: &str) -> Vec<&'a SearchEntry> {
    let needle: Vec<char> = query.trim().to_lowercase().chars().collect();
    if needle.is_empty() {
        return Vec::new();
    }
    entries
        .iter()
        .filter(|entry| {
            let haystack = entry.label().to_lowercase();
            let mut wanted = needle.iter().peekable();
            for c in haystack.chars() {
                if wanted.peek() == Some(&&c) {
                    wanted.next();
                }
            }
            wanted.peek().is_none()
        })
        .collect()
}

/// Menu chain from the top level down to `key`. Empty when `key` has no menu entry.
pub fn breadcrumbs(menus: &[MenuNode], key: &RouteKey) -> Vec<MenuNode> {
    for menu in menus {
        if &menu.key == key {
            return vec![menu.clone()];
        }
        let mut below = breadcrumbs(&menu.children, key);
        if !below.is_empty() {
            below.insert(0, menu.clone());
            return below;
        }
    }
    Vec::new()
}

/// Keys from the top-level menu to `key`, used to expand the selected branch.
pub fn selected_key_path(menus: &[MenuNode], key: &RouteKey) -> Vec<RouteKey> {
    breadcrumbs(menus, key)
        .into_iter()
        .map(|menu| menu.key)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locale() -> StaticLocale {
        StaticLocale::new("en-US")
            .with_bundle(
                "en-US",
                [
                    ("route.manage", "System Manage"),
                    ("route.manage_user", "User Manage"),
                    ("route.manage_role", "Role Manage"),
                ],
            )
            .with_bundle(
                "zh-CN",
                [
                    ("route.manage", "系统管理"),
                    ("route.manage_user", "用户管理"),
                    ("route.manage_role", "角色管理"),
                ],
            )
    }

    fn tree() -> Vec<RouteNode> {
        vec![
            RouteNode::redirect("root", "/", "home"),
            RouteNode::leaf("home", "/home", "view.home"),
            RouteNode::leaf("login", "/login", "view.login").with_meta(|m| m.hide_in_menu = true),
            RouteNode::group(
                "manage",
                "/manage",
                vec![
                    RouteNode::leaf("manage_user", "user", "view.manage_user")
                        .with_meta(|m| m.i18n_key = Some("route.manage_user".into())),
                    RouteNode::leaf("manage_role", "role", "view.manage_role")
                        .with_meta(|m| m.i18n_key = Some("route.manage_role".into())),
                ],
            )
            .with_meta(|m| m.i18n_key = Some("route.manage".into())),
        ]
    }

    #[test]
    fn projection_skips_hidden_and_redirects() {
        let menus = project(&tree(), &locale());
        let keys: Vec<&str> = menus.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["home", "manage"]);
        assert_eq!(menus[1].title, "System Manage");
        assert_eq!(menus[1].children[0].path, "/manage/user");
        // no translation: falls back to the declared title
        assert_eq!(menus[0].title, "home");
    }

    #[test]
    fn group_with_only_hidden_children_is_dropped() {
        let mut tree = tree();
        tree.push(RouteNode::group(
            "exception",
            "/exception",
            vec![
                RouteNode::leaf("403", "403", "view.403").with_meta(|m| m.hide_in_menu = true),
                RouteNode::redirect("exception_root", "", "403"),
            ],
        ));

        let menus = project(&tree, &locale());
        let keys: Vec<&str> = menus.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["home", "manage"]);
        assert!(
            flatten(&menus)
                .iter()
                .all(|entry| entry.key.as_str() != "exception")
        );
    }

    #[test]
    fn relocalize_keeps_structure() {
        let locale = locale();
        let mut menus = project(&tree(), &locale);
        let before = menus.clone();

        locale.set_locale("zh-CN");
        relocalize(&mut menus, &locale);

        assert_eq!(menus[1].title, "系统管理");
        assert_eq!(menus[1].children[1].title, "角色管理");
        assert_eq!(menus.len(), before.len());
        assert_eq!(menus[1].children.len(), before[1].children.len());
        assert_eq!(menus[1].children[0].key, before[1].children[0].key);
    }

    #[test]
    fn flatten_and_search() {
        let menus = project(&tree(), &locale());
        let entries = flatten(&menus);
        let labels: Vec<String> = entries.iter().map(SearchEntry::label).collect();
        assert_eq!(
            labels,
            vec!["home", "System Manage / User Manage", "System Manage / Role Manage"]
        );

        let hits = search(&entries, "rolemng");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key.as_str(), "manage_role");
        assert!(search(&entries, "  ").is_empty());
    }

    #[test]
    fn breadcrumbs_for_unknown_key_are_empty() {
        let menus = project(&tree(), &locale());
        let crumbs = breadcrumbs(&menus, &RouteKey::new("manage_role"));
        let keys: Vec<&str> = crumbs.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["manage", "manage_role"]);
        assert!(breadcrumbs(&menus, &RouteKey::new("login")).is_empty());
        assert_eq!(
            selected_key_path(&menus, &RouteKey::new("manage_user")),
            vec![RouteKey::new("manage"), RouteKey::new("manage_user")]
        );
    }
}
