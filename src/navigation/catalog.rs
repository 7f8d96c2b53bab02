use serde::Deserialize;

use super::node::{RouteKey, RouteNode};

/// Key of the root redirect route (`/`). The synchronizer patches its target when a
/// new home route is determined.
pub const ROOT_ROUTE_KEY: &str = "root";

/// Key of the catch-all route that renders the 404 view for unknown paths.
pub const NOT_FOUND_ROUTE_KEY: &str = "not-found";

/// StaticCatalog
///
/// Statically declared routes, split between routes reachable by anyone (`constant`)
/// and routes that require a permission check (`authorized`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    pub constant: Vec<RouteNode>,
    #[serde(default)]
    pub authorized: Vec<RouteNode>,
}

/// RouteCatalog
///
/// Supplies the static route declarations. Pure and infallible: the catalog never
/// depends on network state.
pub trait RouteCatalog: Send + Sync {
    fn static_catalog(&self) -> StaticCatalog;
}

/// BuiltinCatalog
///
/// The console's own route declarations. Role requirements reference `sys_role.code`.
#[derive(Debug, Clone)]
pub struct BuiltinCatalog {
    catalog: StaticCatalog,
}

impl BuiltinCatalog {
    /// Builds the default console catalog. `super_role` is the role code granted every
    /// management page, `home` the initial target of the root redirect.
    pub fn new(super_role: &str, home: &str) -> Self {
        Self {
            catalog: StaticCatalog {
                constant: constant_routes(home),
                authorized: authorized_routes(super_role),
            },
        }
    }

    /// Loads a catalog override from a JSON document of the form
    /// `{"constant": [...], "authorized": [...]}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let catalog: StaticCatalog = serde_json::from_str(json)?;
        Ok(Self { catalog })
    }

    pub fn from_catalog(catalog: StaticCatalog) -> Self {
        Self { catalog }
    }
}

impl RouteCatalog for BuiltinCatalog {
    fn static_catalog(&self) -> StaticCatalog {
        self.catalog.clone()
    }
}

impl RouteCatalog for StaticCatalog {
    fn static_catalog(&self) -> StaticCatalog {
        self.clone()
    }
}

/// Returns true when `name` is declared anywhere in the catalog.
pub fn catalog_contains(catalog: &StaticCatalog, name: &str) -> bool {
    let key = RouteKey::new(name);
    super::node::find(&catalog.constant, &key).is_some()
        || super::node::find(&catalog.authorized, &key).is_some()
}

fn constant(node: RouteNode) -> RouteNode {
    node.with_meta(|meta| {
        meta.constant = true;
        meta.hide_in_menu = true;
    })
}

fn constant_routes(home: &str) -> Vec<RouteNode> {
    vec![
        constant(RouteNode::redirect(ROOT_ROUTE_KEY, "/", home)),
        constant(RouteNode::leaf("login", "/login", "layout.blank$view.login"))
            .with_meta(|meta| meta.i18n_key = Some("route.login".into())),
        constant(RouteNode::leaf("403", "/403", "layout.blank$view.403")),
        constant(RouteNode::leaf("404", "/404", "layout.blank$view.404")),
        constant(RouteNode::leaf("500", "/500", "layout.blank$view.500")),
        constant(RouteNode::leaf(
            NOT_FOUND_ROUTE_KEY,
            "/:pathMatch(.*)*",
            "layout.blank$view.404",
        ))
        .with_order(i32::MAX),
    ]
}

fn authorized_routes(super_role: &str) -> Vec<RouteNode> {
    vec![
        RouteNode::leaf("home", "/home", "layout.base$view.home")
            .with_order(1)
            .with_meta(|meta| {
                meta.i18n_key = Some("route.home".into());
                meta.icon = Some("mdi:monitor-dashboard".into());
                meta.keep_alive = true;
            }),
        RouteNode::group(
            "dashboard",
            "/dashboard",
            vec![
                RouteNode::leaf("dashboard_analysis", "analysis", "view.dashboard_analysis")
                    .with_order(1)
                    .with_meta(|meta| {
                        meta.i18n_key = Some("route.dashboard_analysis".into());
                        meta.keep_alive = true;
                    }),
                RouteNode::leaf("dashboard_workbench", "workbench", "view.dashboard_workbench")
                    .with_order(2)
                    .with_meta(|meta| meta.i18n_key = Some("route.dashboard_workbench".into())),
            ],
        )
        .with_order(2)
        .with_meta(|meta| {
            meta.i18n_key = Some("route.dashboard".into());
            meta.icon = Some("mdi:chart-areaspline".into());
        }),
        RouteNode::group(
            "manage",
            "/manage",
            vec![
                RouteNode::leaf("manage_user", "user", "view.manage_user")
                    .with_order(1)
                    .with_roles(&[super_role])
                    .with_meta(|meta| {
                        meta.i18n_key = Some("route.manage_user".into());
                        meta.keep_alive = true;
                    }),
                RouteNode::leaf("manage_role", "role", "view.manage_role")
                    .with_order(2)
                    .with_roles(&[super_role])
                    .with_meta(|meta| meta.i18n_key = Some("route.manage_role".into())),
                RouteNode::leaf("manage_menu", "menu", "view.manage_menu")
                    .with_order(3)
                    .with_roles(&[super_role])
                    .with_meta(|meta| meta.i18n_key = Some("route.manage_menu".into())),
            ],
        )
        .with_order(9)
        .with_roles(&[super_role])
        .with_meta(|meta| {
            meta.i18n_key = Some("route.manage".into());
            meta.icon = Some("carbon:cloud-service-management".into());
        }),
        RouteNode::leaf("about", "/about", "layout.base$view.about")
            .with_order(10)
            .with_meta(|meta| {
                meta.i18n_key = Some("route.about".into());
                meta.icon = Some("fluent:book-information-24-regular".into());
            }),
    ]
}
