use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use super::authz::{AuthorizationService, UserRoutes};
use super::cache::{CacheKeyTracker, ViewHost};
use super::catalog::{RouteCatalog, catalog_contains};
use super::filter::{AuthoritySet, EmptyAuthorityPolicy, filter};
use super::menu::{self, LocaleProvider, MenuNode, SearchEntry};
use super::merge::merge;
use super::node::{RouteKey, RouteNode, keys};
use super::sync::{EntryKind, LiveNavigationEntry, LiveRouter, RegistrationHandleSet, RouterSynchronizer};

/// Key of the login route guests are sent to.
pub const LOGIN_ROUTE_KEY: &str = "login";
const FORBIDDEN_VIEW_KEY: &str = "403";
const NOT_FOUND_VIEW_KEY: &str = "404";

/// Where authorized routes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouteMode {
    /// Filter the static catalog by the session's roles.
    #[default]
    Static,
    /// Fetch routes and the home key from the authorization service.
    Dynamic,
}

impl RouteMode {
    pub fn parse(value: &str) -> Self {
        match value {
            "dynamic" => Self::Dynamic,
            _ => Self::Static,
        }
    }
}

/// AuthSession
///
/// The authentication layer of the console session.
pub trait AuthSession: Send + Sync {
    fn authority(&self) -> AuthoritySet;
    fn is_super_bypass(&self) -> bool;
    /// Tears the session down and sends the user back through login.
    fn reset_session(&self);
}

/// RouteStage
///
/// `Uninitialized -> ConstantReady -> AuthReady`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStage {
    Uninitialized,
    ConstantReady,
    AuthReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRouteOutcome {
    Ready,
    AlreadyReady,
    /// The route fetch failed and the session was reset. Route state is unchanged.
    SessionReset,
}

/// Result of the navigation guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed(RouteKey),
    Redirect(RouteKey),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("no live route registered for {0}")]
    NotFound(RouteKey),
    #[error("redirect loop starting at {0}")]
    RedirectLoop(RouteKey),
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub mode: RouteMode,
    /// Home route used in static mode, and until the service names one in dynamic mode.
    pub home: RouteKey,
    pub empty_authority: EmptyAuthorityPolicy,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            mode: RouteMode::Static,
            home: RouteKey::new("home"),
            empty_authority: EmptyAuthorityPolicy::DenyAll,
        }
    }
}

/// External services the coordinator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn RouteCatalog>,
    pub authz: Arc<dyn AuthorizationService>,
    pub session: Arc<dyn AuthSession>,
    pub views: Arc<dyn ViewHost>,
    pub locale: Arc<dyn LocaleProvider>,
}

/// SessionRouteState
///
/// Route state of one console session. Reset as a whole on session teardown.
#[derive(Debug)]
pub struct SessionRouteState {
    pub constant_initialized: bool,
    pub auth_initialized: bool,
    pub home: RouteKey,
    pub constant_routes: Vec<RouteNode>,
    pub auth_routes: Vec<RouteNode>,
    handles: RegistrationHandleSet,
}

impl SessionRouteState {
    fn new(home: RouteKey) -> Self {
        Self {
            constant_initialized: false,
            auth_initialized: false,
            home,
            constant_routes: Vec::new(),
            auth_routes: Vec::new(),
            handles: RegistrationHandleSet::default(),
        }
    }
}

/// SessionRouteCoordinator
///
/// Top-level orchestrator of the reconciliation engine. Owns the session route state, the
/// router synchronizer, the menu tree and the cache tracker, and keeps them consistent as
/// auth state and locale change.
pub struct SessionRouteCoordinator {
    options: CoordinatorOptions,
    collab: Collaborators,
    synchronizer: RouterSynchronizer,
    cache: CacheKeyTracker,
    menus: Vec<MenuNode>,
    state: SessionRouteState,
}

impl SessionRouteCoordinator {
    pub fn new(options: CoordinatorOptions, collab: Collaborators, router: Box<dyn LiveRouter>) -> Self {
        let state = SessionRouteState::new(options.home.clone());
        Self {
            options,
            collab,
            synchronizer: RouterSynchronizer::new(router),
            cache: CacheKeyTracker::new(),
            menus: Vec::new(),
            state,
        }
    }

    pub fn stage(&self) -> RouteStage {
        match (self.state.constant_initialized, self.state.auth_initialized) {
            (_, true) => RouteStage::AuthReady,
            (true, false) => RouteStage::ConstantReady,
            (false, false) => RouteStage::Uninitialized,
        }
    }

    pub fn state(&self) -> &SessionRouteState {
        &self.state
    }

    pub fn home(&self) -> &RouteKey {
        &self.state.home
    }

    pub fn router(&self) -> &dyn LiveRouter {
        self.synchronizer.router()
    }

    pub fn cache(&self) -> &CacheKeyTracker {
        &self.cache
    }

    pub fn menus(&self) -> &[MenuNode] {
        &self.menus
    }

    /// init_constant_route
    ///
    /// Loads the constant routes and makes them live. No-op once done.
    pub fn init_constant_route(&mut self) {
        if self.state.constant_initialized {
            return;
        }
        self.state.constant_routes = self.collab.catalog.static_catalog().constant;
        self.apply_routes();
        self.state.constant_initialized = true;
        tracing::info!(
            routes = self.state.constant_routes.len(),
            "constant routes initialized"
        );
    }

    /// init_auth_route
    ///
    /// Makes the caller's authorized routes live, from the static catalog or from the
    /// authorization service depending on the route mode. Constant routes are initialized
    /// first if needed.
    ///
    /// A failed fetch resets the session through the auth collaborator and leaves the route
    /// state untouched; it is never returned as an error. Fetched routes reusing a constant
    /// key, or repeating a key among themselves, are treated as a failed fetch.
    pub async fn init_auth_route(&mut self) -> AuthRouteOutcome {
        self.init_constant_route();
        if self.state.auth_initialized {
            return AuthRouteOutcome::AlreadyReady;
        }

        match self.options.mode {
            RouteMode::Static => {
                let catalog = self.collab.catalog.static_catalog();
                let authority = if self.collab.session.is_super_bypass() {
                    AuthoritySet::super_user()
                } else {
                    self.collab.session.authority()
                };
                self.state.auth_routes =
                    filter(&catalog.authorized, &authority, self.options.empty_authority);
                self.apply_routes();
            }
            RouteMode::Dynamic => match self.collab.authz.fetch_user_routes().await {
                Ok(UserRoutes { routes, home }) => {
                    if let Some(key) = colliding_key(&self.state.constant_routes, &routes) {
                        tracing::warn!(%key, "fetched routes reuse a registered key, resetting session");
                        self.collab.session.reset_session();
                        return AuthRouteOutcome::SessionReset;
                    }
                    self.state.auth_routes = routes;
                    self.apply_routes();
                    self.synchronizer
                        .patch_root_redirect(&mut self.state.handles, &home);
                    self.state.home = home;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "fetching user routes failed, resetting session");
                    self.collab.session.reset_session();
                    return AuthRouteOutcome::SessionReset;
                }
            },
        }

        self.state.auth_initialized = true;
        self.collab.views.init_home_tab(&self.state.home);
        tracing::info!(
            routes = self.state.auth_routes.len(),
            home = %self.state.home,
            mode = ?self.options.mode,
            "auth routes initialized"
        );
        AuthRouteOutcome::Ready
    }

    /// reset_store
    ///
    /// Retracts every live entry, clears menus and cache keys, resets both initialization
    /// flags, then re-initializes the constant routes.
    pub fn reset_store(&mut self) {
        let handles = std::mem::take(&mut self.state.handles);
        self.synchronizer.retract_all(handles);
        self.cache.clear();
        self.menus.clear();
        self.state = SessionRouteState::new(self.options.home.clone());
        tracing::info!("route store reset");

        self.init_constant_route();
    }

    /// Retitles the menus for the active locale without refetching routes.
    pub fn on_locale_change(&mut self) {
        menu::relocalize(&mut self.menus, self.collab.locale.as_ref());
    }

    pub fn search_entries(&self) -> Vec<SearchEntry> {
        menu::flatten(&self.menus)
    }

    pub fn search_menus(&self, query: &str) -> Vec<SearchEntry> {
        let entries = self.search_entries();
        menu::search(&entries, query).into_iter().cloned().collect()
    }

    pub fn breadcrumbs(&self, key: &RouteKey) -> Vec<MenuNode> {
        menu::breadcrumbs(&self.menus, key)
    }

    pub async fn re_cache(&self, key: &RouteKey) -> bool {
        self.cache.re_cache(key, self.collab.views.as_ref()).await
    }

    pub async fn re_cache_many(&self, keys: &[RouteKey]) -> usize {
        self.cache
            .re_cache_many(keys, self.collab.views.as_ref())
            .await
    }

    /// navigate
    ///
    /// Resolves `key` to the live entry that will render, following redirects and group
    /// entries down to their landing route.
    pub fn navigate(&self, key: &RouteKey) -> Result<&LiveNavigationEntry, NavigationError> {
        let router = self.synchronizer.router();
        let mut current = key.clone();
        // A chain longer than the router itself must revisit an entry.
        for _ in 0..=router.entries().len() {
            let entry = router
                .resolve(&current)
                .ok_or_else(|| NavigationError::NotFound(current.clone()))?;
            match &entry.kind {
                EntryKind::Leaf { .. } => return Ok(entry),
                EntryKind::Redirect { to } => current = to.clone(),
                EntryKind::Group {
                    first_child: Some(child),
                } => current = child.clone(),
                EntryKind::Group { first_child: None } => return Ok(entry),
            }
        }
        Err(NavigationError::RedirectLoop(key.clone()))
    }

    /// is_route_exists
    ///
    /// Whether `name` is a route of the console at all, regardless of the caller's
    /// permissions. A failed remote check counts as "does not exist".
    pub async fn is_route_exists(&self, name: &str) -> bool {
        match self.options.mode {
            RouteMode::Static => catalog_contains(&self.collab.catalog.static_catalog(), name),
            RouteMode::Dynamic => self
                .collab
                .authz
                .fetch_route_exists(name)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, route = name, "route existence check failed");
                    false
                }),
        }
    }

    /// guard
    ///
    /// Decides what happens when the user asks for `key`. Constant routes always proceed.
    /// Guests are sent to login. Signed-in users get their authorized routes initialized on
    /// first navigation. Unknown routes go to 404, known but unauthorized ones go to 403.
    pub async fn guard(&mut self, key: &RouteKey, logged_in: bool) -> GuardDecision {
        self.init_constant_route();

        let is_constant = self
            .router()
            .resolve(key)
            .is_some_and(|entry| entry.meta.constant);
        if is_constant {
            return GuardDecision::Proceed(key.clone());
        }
        if !logged_in {
            return GuardDecision::Redirect(RouteKey::new(LOGIN_ROUTE_KEY));
        }
        if self.init_auth_route().await == AuthRouteOutcome::SessionReset {
            return GuardDecision::Redirect(RouteKey::new(LOGIN_ROUTE_KEY));
        }
        if self.router().contains(key) {
            return GuardDecision::Proceed(key.clone());
        }
        if self.is_route_exists(key.as_str()).await {
            GuardDecision::Redirect(RouteKey::new(FORBIDDEN_VIEW_KEY))
        } else {
            GuardDecision::Redirect(RouteKey::new(NOT_FOUND_VIEW_KEY))
        }
    }

    fn apply_routes(&mut self) {
        let merged = merge(&self.state.constant_routes, &self.state.auth_routes);
        let previous = std::mem::take(&mut self.state.handles);
        self.state.handles = self.synchronizer.synchronize(previous, &merged);
        self.menus = menu::project(&merged, self.collab.locale.as_ref());
        self.cache
            .compute_allow_set(self.synchronizer.router().entries());
    }
}

/// First key of `fetched` that is already declared by a constant route or appears twice in
/// `fetched` itself, at any depth.
fn colliding_key(constant: &[RouteNode], fetched: &[RouteNode]) -> Option<RouteKey> {
    let mut seen: HashSet<RouteKey> = keys(constant).into_iter().collect();
    keys(fetched).into_iter().find(|key| !seen.insert(key.clone()))
}
