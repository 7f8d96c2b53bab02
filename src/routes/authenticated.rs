use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Endpoints for any signed-in console user. The route service here is what the frontend's
/// dynamic route mode consumes.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // Profile and role codes of the caller.
        .route("/me", get(handlers::get_me))
        // GET /route/getUserRoutes
        // Catalog filtered by the caller's roles, ordered, plus the home route key.
        .route("/route/getUserRoutes", get(handlers::get_user_routes))
        // GET /route/isRouteExist?routeName=...
        // Existence check independent of permissions (403 vs 404 on the frontend).
        .route("/route/isRouteExist", get(handlers::is_route_exist))
}
