//! Route reconciliation engine.
//!
//! Merges the statically declared routes with the caller's authorized routes and keeps the
//! live router, the menu tree and the view cache allow-set consistent as auth state and
//! locale change.
//!
//! Control flow: [`coordinator::SessionRouteCoordinator`] loads the [`catalog`], narrows it
//! with [`filter`] (static mode) or fetches it through [`authz`] (dynamic mode), orders it
//! with [`merge`], then hands the tree to [`sync`] and [`menu`]. [`cache`] reads the
//! synchronized entries.

pub mod authz;
pub mod cache;
pub mod catalog;
pub mod coordinator;
pub mod filter;
pub mod menu;
pub mod merge;
pub mod node;
pub mod sync;

pub use authz::{AuthorizationService, AuthzError, HttpAuthorizationService, UserRoutes};
pub use cache::{CacheKeyTracker, ViewHost};
pub use catalog::{BuiltinCatalog, RouteCatalog, StaticCatalog};
pub use coordinator::{
    AuthRouteOutcome, AuthSession, Collaborators, CoordinatorOptions, GuardDecision,
    NavigationError, RouteMode, RouteStage, SessionRouteCoordinator,
};
pub use filter::{AuthoritySet, EmptyAuthorityPolicy};
pub use menu::{LocaleProvider, MenuNode, SearchEntry, StaticLocale};
pub use node::{RouteKey, RouteKind, RouteMeta, RouteNode};
pub use sync::{LiveNavigationEntry, LiveRouter, MemoryRouter};
