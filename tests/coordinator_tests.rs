use admin_console::navigation::{
    AuthRouteOutcome, AuthSession, AuthoritySet, BuiltinCatalog, Collaborators,
    CoordinatorOptions, EmptyAuthorityPolicy, GuardDecision, MemoryRouter, NavigationError,
    RouteCatalog, RouteKey, RouteMode, RouteNode, RouteStage, SessionRouteCoordinator,
    StaticCatalog, StaticLocale, UserRoutes, ViewHost,
    authz::{AuthorizationService, MockAuthorizationService},
    filter::filter,
    merge::merge,
    node::keys,
};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

// --- Test Collaborators ---

#[derive(Default)]
struct TestSession {
    roles: Mutex<Vec<String>>,
    is_super: AtomicBool,
    resets: AtomicUsize,
}

impl TestSession {
    fn with_roles(roles: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            roles: Mutex::new(roles.iter().map(|r| r.to_string()).collect()),
            ..Self::default()
        })
    }

    fn super_user() -> Arc<Self> {
        let session = Self::with_roles(&[]);
        session.is_super.store(true, Ordering::SeqCst);
        session
    }

    fn set_roles(&self, roles: &[&str]) {
        *self.roles.lock().unwrap() = roles.iter().map(|r| r.to_string()).collect();
    }

    fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl AuthSession for TestSession {
    fn authority(&self) -> AuthoritySet {
        AuthoritySet::new(self.roles.lock().unwrap().clone())
    }

    fn is_super_bypass(&self) -> bool {
        self.is_super.load(Ordering::SeqCst)
    }

    fn reset_session(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct TestViews {
    home_tabs: Mutex<Vec<RouteKey>>,
    reloads: AtomicUsize,
}

#[async_trait]
impl ViewHost for TestViews {
    fn init_home_tab(&self, home: &RouteKey) {
        self.home_tabs.lock().unwrap().push(home.clone());
    }

    async fn reload_active_view(&self) {
        tokio::task::yield_now().await;
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    coordinator: SessionRouteCoordinator,
    session: Arc<TestSession>,
    views: Arc<TestViews>,
    locale: Arc<StaticLocale>,
}

fn locale() -> StaticLocale {
    StaticLocale::new("en-US")
        .with_bundle(
            "en-US",
            [
                ("route.home", "Home"),
                ("route.dashboard", "Dashboard"),
                ("route.dashboard_analysis", "Analysis"),
            ],
        )
        .with_bundle("zh-CN", [("route.home", "首页")])
}

fn harness(
    mode: RouteMode,
    session: Arc<TestSession>,
    authz: Arc<dyn AuthorizationService>,
    catalog: Arc<dyn RouteCatalog>,
) -> Harness {
    let views = Arc::new(TestViews::default());
    let locale = Arc::new(locale());
    let collab = Collaborators {
        catalog,
        authz,
        session: session.clone(),
        views: views.clone(),
        locale: locale.clone(),
    };
    let options = CoordinatorOptions {
        mode,
        ..CoordinatorOptions::default()
    };
    Harness {
        coordinator: SessionRouteCoordinator::new(options, collab, Box::new(MemoryRouter::new())),
        session,
        views,
        locale,
    }
}

fn static_harness(session: Arc<TestSession>) -> Harness {
    harness(
        RouteMode::Static,
        session,
        Arc::new(MockAuthorizationService::new_failing()),
        Arc::new(BuiltinCatalog::new("R_SUPER", "home")),
    )
}

fn dynamic_harness(authz: MockAuthorizationService) -> Harness {
    harness(
        RouteMode::Dynamic,
        TestSession::with_roles(&["R_ADMIN"]),
        Arc::new(authz),
        Arc::new(BuiltinCatalog::new("R_SUPER", "home")),
    )
}

fn key(k: &str) -> RouteKey {
    RouteKey::new(k)
}

fn live_keys(coordinator: &SessionRouteCoordinator) -> BTreeSet<RouteKey> {
    coordinator
        .router()
        .entries()
        .into_iter()
        .map(|entry| entry.key.clone())
        .collect()
}

// --- Constant Routes ---

#[tokio::test]
async fn test_init_constant_route_is_idempotent() {
    let mut h = static_harness(TestSession::with_roles(&["R_ADMIN"]));
    assert_eq!(h.coordinator.stage(), RouteStage::Uninitialized);

    h.coordinator.init_constant_route();
    let first = live_keys(&h.coordinator);
    h.coordinator.init_constant_route();

    assert_eq!(h.coordinator.stage(), RouteStage::ConstantReady);
    assert_eq!(live_keys(&h.coordinator), first);
    assert_eq!(first.len(), 6);
    assert!(first.contains(&key("root")));
    assert!(first.contains(&key("not-found")));
    // Constant routes are all hidden
    assert!(h.coordinator.menus().is_empty());
}

// --- Static Mode ---

#[tokio::test]
async fn test_static_mode_filters_catalog_by_roles() {
    let mut h = static_harness(TestSession::with_roles(&["R_ADMIN"]));

    assert_eq!(h.coordinator.init_auth_route().await, AuthRouteOutcome::Ready);
    assert_eq!(h.coordinator.stage(), RouteStage::AuthReady);

    let router = h.coordinator.router();
    assert!(router.contains(&key("home")));
    assert!(router.contains(&key("dashboard_analysis")));
    assert!(!router.contains(&key("manage")));
    assert!(!router.contains(&key("manage_user")));

    // Only keep-alive leaves are cacheable
    assert_eq!(
        h.coordinator.cache().allowed_keys(),
        vec![key("dashboard_analysis"), key("home")]
    );
    assert_eq!(*h.views.home_tabs.lock().unwrap(), vec![key("home")]);

    assert_eq!(
        h.coordinator.init_auth_route().await,
        AuthRouteOutcome::AlreadyReady
    );
    assert_eq!(h.views.home_tabs.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_static_mode_super_bypass_sees_everything() {
    let mut h = static_harness(TestSession::super_user());
    h.coordinator.init_auth_route().await;

    let router = h.coordinator.router();
    for k in ["manage", "manage_user", "manage_role", "manage_menu"] {
        assert!(router.contains(&key(k)), "{k}");
    }
    assert!(h.coordinator.cache().is_allowed(&key("manage_user")));
}

#[tokio::test]
async fn test_static_mode_empty_authority_policy() {
    // Default policy: no roles, no authorized routes
    let mut h = static_harness(TestSession::with_roles(&[]));
    h.coordinator.init_auth_route().await;
    assert!(!h.coordinator.router().contains(&key("home")));
    assert!(h.coordinator.menus().is_empty());

    let catalog: Arc<dyn RouteCatalog> = Arc::new(BuiltinCatalog::new("R_SUPER", "home"));
    let views = Arc::new(TestViews::default());
    let collab = Collaborators {
        catalog,
        authz: Arc::new(MockAuthorizationService::new_failing()),
        session: TestSession::with_roles(&[]),
        views,
        locale: Arc::new(locale()),
    };
    let options = CoordinatorOptions {
        empty_authority: EmptyAuthorityPolicy::UnrestrictedOnly,
        ..CoordinatorOptions::default()
    };
    let mut coordinator =
        SessionRouteCoordinator::new(options, collab, Box::new(MemoryRouter::new()));
    coordinator.init_auth_route().await;

    assert!(coordinator.router().contains(&key("home")));
    assert!(coordinator.router().contains(&key("about")));
    assert!(!coordinator.router().contains(&key("manage_user")));
}

#[tokio::test]
async fn test_menus_and_search() {
    let mut h = static_harness(TestSession::with_roles(&["R_ADMIN"]));
    h.coordinator.init_auth_route().await;

    let top: Vec<&str> = h.coordinator.menus().iter().map(|m| m.key.as_str()).collect();
    assert_eq!(top, vec!["home", "dashboard", "about"]);
    assert_eq!(h.coordinator.menus()[0].title, "Home");
    assert_eq!(h.coordinator.menus()[1].children[0].path, "/dashboard/analysis");

    let hits = h.coordinator.search_menus("analysis");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, key("dashboard_analysis"));
    assert_eq!(hits[0].label(), "Dashboard / Analysis");
    assert!(h.coordinator.search_menus("").is_empty());

    let crumbs: Vec<RouteKey> = h
        .coordinator
        .breadcrumbs(&key("dashboard_workbench"))
        .into_iter()
        .map(|m| m.key)
        .collect();
    assert_eq!(crumbs, vec![key("dashboard"), key("dashboard_workbench")]);
}

#[tokio::test]
async fn test_locale_change_retitles_menus() {
    let mut h = static_harness(TestSession::with_roles(&["R_ADMIN"]));
    h.coordinator.init_auth_route().await;
    let before = live_keys(&h.coordinator);

    h.locale.set_locale("zh-CN");
    h.coordinator.on_locale_change();

    assert_eq!(h.coordinator.menus()[0].title, "首页");
    // No translation: falls back to the declared title
    assert_eq!(h.coordinator.menus()[1].title, "dashboard");
    assert_eq!(live_keys(&h.coordinator), before);
}

// --- Dynamic Mode ---

fn admin_panel_routes() -> UserRoutes {
    UserRoutes {
        routes: vec![
            RouteNode::group(
                "adminPanel",
                "/admin",
                vec![
                    RouteNode::leaf("dashboard", "dashboard", "view.dashboard")
                        .with_meta(|meta| meta.keep_alive = true),
                ],
            )
            .with_meta(|meta| meta.keep_alive = true),
        ],
        home: key("dashboard"),
    }
}

#[tokio::test]
async fn test_dynamic_mode_applies_fetched_routes() {
    let mut h = dynamic_harness(MockAuthorizationService::new(admin_panel_routes()));

    assert_eq!(h.coordinator.init_auth_route().await, AuthRouteOutcome::Ready);
    assert_eq!(h.coordinator.home(), &key("dashboard"));

    // Groups are never cacheable, even when marked keep-alive
    let cache = h.coordinator.cache();
    assert!(cache.is_allowed(&key("dashboard")));
    assert!(!cache.is_allowed(&key("adminPanel")));

    // Root redirect now lands on the fetched home
    let landing = h.coordinator.navigate(&key("root")).unwrap();
    assert_eq!(landing.key, key("dashboard"));
    assert_eq!(landing.path, "/admin/dashboard");
    assert_eq!(landing.parent, Some(key("adminPanel")));

    assert_eq!(*h.views.home_tabs.lock().unwrap(), vec![key("dashboard")]);
    assert_eq!(h.session.resets(), 0);
}

#[tokio::test]
async fn test_dynamic_mode_fetch_failure_resets_session() {
    let mut h = dynamic_harness(MockAuthorizationService::new_failing());

    assert_eq!(
        h.coordinator.init_auth_route().await,
        AuthRouteOutcome::SessionReset
    );
    assert!(!h.coordinator.state().auth_initialized);
    assert_eq!(h.coordinator.stage(), RouteStage::ConstantReady);
    assert_eq!(h.session.resets(), 1);
    assert!(h.views.home_tabs.lock().unwrap().is_empty());

    // Constant routes stay live
    assert!(h.coordinator.navigate(&key("login")).is_ok());
    assert!(h.coordinator.cache().allowed_keys().is_empty());
}

#[tokio::test]
async fn test_dynamic_mode_rejects_nested_constant_key() {
    let routes = UserRoutes {
        routes: vec![RouteNode::group(
            "adminPanel",
            "/admin",
            vec![
                RouteNode::leaf("dashboard", "dashboard", "view.dashboard"),
                RouteNode::leaf("login", "login", "view.login"),
            ],
        )],
        home: key("dashboard"),
    };
    let mut h = dynamic_harness(MockAuthorizationService::new(routes));

    assert_eq!(
        h.coordinator.init_auth_route().await,
        AuthRouteOutcome::SessionReset
    );
    assert_eq!(h.session.resets(), 1);
    assert!(!h.coordinator.state().auth_initialized);
    assert!(!h.coordinator.router().contains(&key("adminPanel")));

    // The constant login route is untouched, guests still reach it
    let login = h.coordinator.router().resolve(&key("login")).unwrap();
    assert!(login.meta.constant);
    assert_eq!(login.parent, None);
    assert_eq!(
        h.coordinator.guard(&key("login"), false).await,
        GuardDecision::Proceed(key("login"))
    );
}

#[tokio::test]
async fn test_dynamic_mode_rejects_repeated_keys() {
    let routes = UserRoutes {
        routes: vec![
            RouteNode::leaf("dashboard", "/dashboard", "view.dashboard"),
            RouteNode::group(
                "adminPanel",
                "/admin",
                vec![RouteNode::leaf("dashboard", "dashboard", "view.dashboard")],
            ),
        ],
        home: key("dashboard"),
    };
    let mut h = dynamic_harness(MockAuthorizationService::new(routes));

    assert_eq!(
        h.coordinator.init_auth_route().await,
        AuthRouteOutcome::SessionReset
    );
    assert_eq!(h.session.resets(), 1);
    assert!(!h.coordinator.router().contains(&key("dashboard")));
}

#[tokio::test]
async fn test_dynamic_route_existence() {
    let h = dynamic_harness(MockAuthorizationService::new(admin_panel_routes()));
    assert!(h.coordinator.is_route_exists("dashboard").await);
    assert!(!h.coordinator.is_route_exists("reports").await);

    // A failed remote check counts as missing
    let h = dynamic_harness(MockAuthorizationService::new_failing());
    assert!(!h.coordinator.is_route_exists("dashboard").await);
}

// --- Reset & Resync ---

#[tokio::test]
async fn test_reset_store_keeps_only_constant_routes() {
    let mut h = static_harness(TestSession::with_roles(&["R_ADMIN"]));
    h.coordinator.init_auth_route().await;
    assert!(h.coordinator.navigate(&key("home")).is_ok());

    h.coordinator.reset_store();

    assert_eq!(h.coordinator.stage(), RouteStage::ConstantReady);
    assert!(h.coordinator.navigate(&key("login")).is_ok());
    assert_eq!(
        h.coordinator.navigate(&key("home")),
        Err(NavigationError::NotFound(key("home")))
    );
    assert!(h.coordinator.cache().allowed_keys().is_empty());
    assert!(h.coordinator.menus().is_empty());

    assert_eq!(h.coordinator.init_auth_route().await, AuthRouteOutcome::Ready);
    assert!(h.coordinator.navigate(&key("home")).is_ok());
}

#[tokio::test]
async fn test_resync_holds_exactly_the_new_tree() {
    let session = TestSession::with_roles(&["R_ADMIN"]);
    let mut h = static_harness(session.clone());
    h.coordinator.init_auth_route().await;

    h.coordinator.reset_store();
    session.set_roles(&["R_SUPER"]);
    h.coordinator.init_auth_route().await;

    let catalog = BuiltinCatalog::new("R_SUPER", "home").static_catalog();
    let expected = merge(
        &catalog.constant,
        &filter(
            &catalog.authorized,
            &AuthoritySet::new(["R_SUPER"]),
            EmptyAuthorityPolicy::DenyAll,
        ),
    );
    let expected: BTreeSet<RouteKey> = keys(&expected).into_iter().collect();
    assert_eq!(live_keys(&h.coordinator), expected);
    assert_eq!(h.coordinator.router().entries().len(), expected.len());
}

// --- Navigation ---

#[tokio::test]
async fn test_navigate_follows_redirects_and_groups() {
    let mut h = static_harness(TestSession::with_roles(&["R_ADMIN"]));
    h.coordinator.init_auth_route().await;

    assert_eq!(h.coordinator.navigate(&key("root")).unwrap().key, key("home"));
    assert_eq!(
        h.coordinator.navigate(&key("dashboard")).unwrap().key,
        key("dashboard_analysis")
    );
}

#[tokio::test]
async fn test_navigate_detects_redirect_loops() {
    let catalog = StaticCatalog {
        constant: vec![
            RouteNode::redirect("ping", "/ping", "pong"),
            RouteNode::redirect("pong", "/pong", "ping"),
        ],
        authorized: Vec::new(),
    };
    let mut h = harness(
        RouteMode::Static,
        TestSession::with_roles(&[]),
        Arc::new(MockAuthorizationService::new_failing()),
        Arc::new(BuiltinCatalog::from_catalog(catalog)),
    );
    h.coordinator.init_constant_route();

    assert_eq!(
        h.coordinator.navigate(&key("ping")),
        Err(NavigationError::RedirectLoop(key("ping")))
    );
}

#[tokio::test]
async fn test_guard_decisions() {
    let mut h = static_harness(TestSession::with_roles(&["R_ADMIN"]));

    // Guests
    assert_eq!(
        h.coordinator.guard(&key("login"), false).await,
        GuardDecision::Proceed(key("login"))
    );
    assert_eq!(
        h.coordinator.guard(&key("home"), false).await,
        GuardDecision::Redirect(key("login"))
    );
    assert_eq!(h.coordinator.stage(), RouteStage::ConstantReady);

    // Signed in: first navigation initializes auth routes
    assert_eq!(
        h.coordinator.guard(&key("home"), true).await,
        GuardDecision::Proceed(key("home"))
    );
    assert_eq!(h.coordinator.stage(), RouteStage::AuthReady);

    assert_eq!(
        h.coordinator.guard(&key("manage_user"), true).await,
        GuardDecision::Redirect(key("403"))
    );
    assert_eq!(
        h.coordinator.guard(&key("reports"), true).await,
        GuardDecision::Redirect(key("404"))
    );
}

#[tokio::test]
async fn test_guard_sends_to_login_when_fetch_fails() {
    let mut h = dynamic_harness(MockAuthorizationService::new_failing());
    assert_eq!(
        h.coordinator.guard(&key("dashboard"), true).await,
        GuardDecision::Redirect(key("login"))
    );
    assert_eq!(h.session.resets(), 1);
}

// --- View Cache ---

#[tokio::test]
async fn test_re_cache_through_coordinator() {
    let mut h = static_harness(TestSession::with_roles(&["R_ADMIN"]));
    h.coordinator.init_auth_route().await;

    assert!(h.coordinator.re_cache(&key("home")).await);
    assert_eq!(h.views.reloads.load(Ordering::SeqCst), 1);
    assert!(h.coordinator.cache().is_allowed(&key("home")));

    // Not keep-alive: refused without a reload
    assert!(!h.coordinator.re_cache(&key("dashboard_workbench")).await);
    assert_eq!(h.views.reloads.load(Ordering::SeqCst), 1);

    let reloaded = h
        .coordinator
        .re_cache_many(&[key("home"), key("dashboard_analysis"), key("about")])
        .await;
    assert_eq!(reloaded, 2);
    assert_eq!(h.views.reloads.load(Ordering::SeqCst), 3);
    assert_eq!(
        h.coordinator.cache().allowed_keys(),
        vec![key("dashboard_analysis"), key("home")]
    );
}
