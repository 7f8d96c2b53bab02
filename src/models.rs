use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core RBAC Records (Mapped to Database) ---

/// SysRole
///
/// A role record from the `sys_role` table. `code` is the identifier referenced by route
/// declarations (`RouteMeta::roles`) and carried in the caller's authority set.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct SysRole {
    pub id: i64,
    pub name: String,
    // Unique across all roles.
    pub code: String,
    pub desc: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// SysUser
///
/// A console user from the `sys_user` table. Roles are attached through `sys_user_role`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct SysUser {
    pub id: Uuid,
    pub username: String,
    pub nickname: String,
    pub email: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// RoleWithUsers
///
/// A role together with every user holding it (the many-to-many side of `sys_user_role`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RoleWithUsers {
    #[serde(flatten)]
    pub role: SysRole,
    pub users: Vec<SysUser>,
}

// --- Request Payloads (Input Schemas) ---

/// SaveRoleRequest
///
/// Input payload for creating (POST /admin/roles) or replacing (PUT /admin/roles/{id}) a role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SaveRoleRequest {
    #[schema(example = "Administrator")]
    pub name: String,
    #[schema(example = "R_ADMIN")]
    pub code: String,
    #[serde(default)]
    pub desc: String,
}

/// CreateUserRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    pub email: String,
}

/// AssignRolesRequest
///
/// Replaces the complete role set of a user (PUT /admin/users/{id}/roles).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AssignRolesRequest {
    pub role_ids: Vec<i64>,
}

// --- Output Schemas ---

/// UserProfile
///
/// Output schema for the authenticated user's profile (GET /me).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Role codes held by the user.
    pub roles: Vec<String>,
    /// True when the user holds the configured super role.
    pub is_super: bool,
}

/// RouteExistsQuery
///
/// Query string of GET /route/isRouteExist.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct RouteExistsQuery {
    pub route_name: String,
}
