use crate::{AppState, handlers};
use axum::{
    Router,
    routing::get,
};

/// Admin Router Module
///
/// Role, user and user-role administration. Every handler checks for the configured super
/// role after the `AuthUser` extractor has authenticated the caller.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /admin/roles
        .route("/roles", get(handlers::list_roles).post(handlers::create_role))
        // GET/PUT/DELETE /admin/roles/{id}
        // GET includes the users holding the role.
        .route(
            "/roles/{id}",
            get(handlers::get_role)
                .put(handlers::update_role)
                .delete(handlers::delete_role),
        )
        // GET/POST /admin/users
        .route("/users", get(handlers::list_users).post(handlers::create_user))
        // GET/PUT /admin/users/{id}/roles
        // PUT replaces the user's complete role set.
        .route(
            "/users/{id}/roles",
            get(handlers::get_user_roles).put(handlers::assign_user_roles),
        )
}
