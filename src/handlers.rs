use crate::{
    AppState,
    auth::AuthUser,
    models::{
        AssignRolesRequest, CreateUserRequest, RoleWithUsers, RouteExistsQuery, SaveRoleRequest,
        SysRole, SysUser, UserProfile,
    },
    navigation::{
        RouteKey, RouteNode, UserRoutes,
        catalog::catalog_contains,
        filter::filter,
        merge::merge,
        node::find,
    },
    repository::RepoError,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

fn repo_status(e: RepoError) -> StatusCode {
    match e {
        RepoError::Conflict => StatusCode::CONFLICT,
        RepoError::NotFound => StatusCode::NOT_FOUND,
        RepoError::Database(e) => {
            tracing::error!("repository error: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn validate_role(payload: &SaveRoleRequest) -> Result<(), StatusCode> {
    if payload.code.trim().is_empty() || payload.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(())
}

// --- Session & Route Service ---

/// get_me
///
/// [Authenticated Route] Profile of the caller with the role codes they hold.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Current user", body = UserProfile))
)]
pub async fn get_me(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, StatusCode> {
    let user = state.repo.get_user(auth.id).await.ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(UserProfile {
        id: user.id,
        username: user.username,
        email: user.email,
        roles: auth.roles,
        is_super: auth.is_super,
    }))
}

/// get_user_routes
///
/// [Authenticated Route] The authorized routes of the caller and their home route key.
///
/// The route catalog is filtered by the caller's role codes (super role bypasses the filter)
/// and ordered. The configured home is kept when the caller can reach it; otherwise the first
/// reachable page becomes home.
#[utoipa::path(
    get,
    path = "/route/getUserRoutes",
    responses((status = 200, description = "Authorized routes and home key"))
)]
pub async fn get_user_routes(auth: AuthUser, State(state): State<AppState>) -> Json<UserRoutes> {
    let catalog = state.catalog.static_catalog();
    let routes = merge(
        &[],
        &filter(&catalog.authorized, &auth.authority(), state.config.empty_authority),
    );
    let home = resolve_home(&routes, &state.config.route_home);

    tracing::debug!(user = %auth.id, routes = routes.len(), %home, "serving user routes");
    Json(UserRoutes { routes, home })
}

fn resolve_home(routes: &[RouteNode], configured: &str) -> RouteKey {
    let configured = RouteKey::new(configured);
    if find(routes, &configured).is_some_and(RouteNode::is_leaf) {
        return configured;
    }
    routes
        .iter()
        .flat_map(|node| node.walk())
        .find(|node| node.is_leaf())
        .map(|node| node.key.clone())
        .unwrap_or(configured)
}

/// is_route_exist
///
/// [Authenticated Route] Whether a route name is declared at all, independent of the
/// caller's permissions. Lets the frontend tell 403 from 404.
#[utoipa::path(
    get,
    path = "/route/isRouteExist",
    params(RouteExistsQuery),
    responses((status = 200, description = "Existence flag", body = bool))
)]
pub async fn is_route_exist(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<RouteExistsQuery>,
) -> Json<bool> {
    Json(catalog_contains(
        &state.catalog.static_catalog(),
        &query.route_name,
    ))
}

// --- Role Administration ---

/// list_roles
///
/// [Admin Route] Every role.
#[utoipa::path(
    get,
    path = "/admin/roles",
    responses((status = 200, description = "Roles", body = [SysRole]), (status = 403, description = "Not super"))
)]
pub async fn list_roles(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<SysRole>>, StatusCode> {
    auth.require_super()?;
    Ok(Json(state.repo.list_roles().await))
}

/// create_role
///
/// [Admin Route] Creates a role. 409 when the code is already taken.
#[utoipa::path(
    post,
    path = "/admin/roles",
    request_body = SaveRoleRequest,
    responses(
        (status = 201, description = "Created", body = SysRole),
        (status = 400, description = "Missing name or code"),
        (status = 409, description = "Code taken")
    )
)]
pub async fn create_role(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SaveRoleRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    auth.require_super()?;
    validate_role(&payload)?;
    let role = state.repo.create_role(payload).await.map_err(repo_status)?;
    tracing::info!(role = %role.code, "role created");
    Ok((StatusCode::CREATED, Json(role)))
}

/// get_role
///
/// [Admin Route] A role together with the users holding it.
#[utoipa::path(
    get,
    path = "/admin/roles/{id}",
    params(("id" = i64, Path, description = "Role ID")),
    responses((status = 200, description = "Found", body = RoleWithUsers), (status = 404, description = "Not Found"))
)]
pub async fn get_role(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RoleWithUsers>, StatusCode> {
    auth.require_super()?;
    state
        .repo
        .get_role_with_users(id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// update_role
#[utoipa::path(
    put,
    path = "/admin/roles/{id}",
    request_body = SaveRoleRequest,
    responses((status = 200, description = "Updated", body = SysRole), (status = 404, description = "Not Found"))
)]
pub async fn update_role(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<SaveRoleRequest>,
) -> Result<Json<SysRole>, StatusCode> {
    auth.require_super()?;
    validate_role(&payload)?;
    match state.repo.update_role(id, payload).await.map_err(repo_status)? {
        Some(role) => Ok(Json(role)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// delete_role
///
/// [Admin Route] Deletes a role and detaches it from every user.
#[utoipa::path(
    delete,
    path = "/admin/roles/{id}",
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_role(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> StatusCode {
    if let Err(status) = auth.require_super() {
        return status;
    }
    if state.repo.delete_role(id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// --- User Administration ---

/// list_users
#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "Users", body = [SysUser]))
)]
pub async fn list_users(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<SysUser>>, StatusCode> {
    auth.require_super()?;
    Ok(Json(state.repo.list_users().await))
}

/// create_user
///
/// [Admin Route] Creates a console user without roles. 409 when the username is taken.
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = CreateUserRequest,
    responses((status = 201, description = "Created", body = SysUser), (status = 409, description = "Username taken"))
)]
pub async fn create_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    auth.require_super()?;
    if payload.username.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let user = state.repo.create_user(payload).await.map_err(repo_status)?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// get_user_roles
#[utoipa::path(
    get,
    path = "/admin/users/{id}/roles",
    params(("id" = Uuid, Path, description = "User ID")),
    responses((status = 200, description = "Roles of the user", body = [SysRole]))
)]
pub async fn get_user_roles(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SysRole>>, StatusCode> {
    auth.require_super()?;
    if state.repo.get_user(id).await.is_none() {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(state.repo.get_user_roles(id).await))
}

/// assign_user_roles
///
/// [Admin Route] Replaces the complete role set of a user. 404 when the user or any of the
/// roles is unknown.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/roles",
    request_body = AssignRolesRequest,
    responses((status = 200, description = "New role set", body = [SysRole]), (status = 404, description = "Unknown user or role"))
)]
pub async fn assign_user_roles(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRolesRequest>,
) -> Result<Json<Vec<SysRole>>, StatusCode> {
    auth.require_super()?;
    let roles = state
        .repo
        .assign_roles(id, payload.role_ids)
        .await
        .map_err(repo_status)?;
    tracing::info!(user = %id, roles = roles.len(), "user roles replaced");
    Ok(Json(roles))
}
