use crate::models::{CreateUserRequest, RoleWithUsers, SaveRoleRequest, SysRole, SysUser};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// RepoError
///
/// Failures a caller must be able to tell apart. Everything else is logged and degraded to
/// an empty result inside the repository.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("a record with the same unique key already exists")]
    Conflict,
    #[error("referenced record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// Abstract contract for RBAC persistence: roles, users and the `sys_user_role` relation.
/// `Send + Sync + async_trait` make `Arc<dyn Repository>` shareable across Axum handlers.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Roles ---
    async fn list_roles(&self) -> Vec<SysRole>;
    async fn get_role(&self, id: i64) -> Option<SysRole>;
    async fn get_role_by_code(&self, code: &str) -> Option<SysRole>;
    async fn get_role_with_users(&self, id: i64) -> Option<RoleWithUsers>;
    // Fails with `Conflict` when the code is taken.
    async fn create_role(&self, req: SaveRoleRequest) -> Result<SysRole, RepoError>;
    // `Ok(None)` when the role does not exist.
    async fn update_role(&self, id: i64, req: SaveRoleRequest) -> Result<Option<SysRole>, RepoError>;
    // Removes the role and every relation row pointing at it.
    async fn delete_role(&self, id: i64) -> bool;

    // --- Users ---
    async fn list_users(&self) -> Vec<SysUser>;
    async fn get_user(&self, id: Uuid) -> Option<SysUser>;
    async fn create_user(&self, req: CreateUserRequest) -> Result<SysUser, RepoError>;

    // --- User <-> Role ---
    async fn get_user_roles(&self, user_id: Uuid) -> Vec<SysRole>;
    /// Replaces the role set of a user. `NotFound` when the user or any role is unknown.
    async fn assign_roles(&self, user_id: Uuid, role_ids: Vec<i64>) -> Result<Vec<SysRole>, RepoError>;

    /// Role codes held by a user, the authority set used for route filtering.
    async fn get_role_codes(&self, user_id: Uuid) -> Vec<String> {
        self.get_user_roles(user_id)
            .await
            .into_iter()
            .map(|role| role.code)
            .collect()
    }
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// seed_super_user
///
/// Ensures a role with code `super_role` exists and creates a user `username` holding it.
/// Used to make an empty in-memory repository reachable: every admin endpoint requires the
/// super role, and nothing else can create the first user.
pub async fn seed_super_user(
    repo: &dyn Repository,
    super_role: &str,
    username: &str,
) -> Result<SysUser, RepoError> {
    let role = match repo.get_role_by_code(super_role).await {
        Some(role) => role,
        None => {
            repo.create_role(SaveRoleRequest {
                name: "Super Admin".to_string(),
                code: super_role.to_string(),
                desc: "Bootstrap role holding every permission".to_string(),
            })
            .await?
        }
    };
    let user = repo
        .create_user(CreateUserRequest {
            username: username.to_string(),
            nickname: username.to_string(),
            email: format!("{username}@console.local"),
        })
        .await?;
    repo.assign_roles(user.id, vec![role.id]).await?;
    Ok(user)
}

fn map_unique(e: sqlx::Error) -> RepoError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict,
        _ => RepoError::Database(e),
    }
}

const ROLE_COLUMNS: &str = r#"id, name, code, "desc", created_at, updated_at"#;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_roles(&self) -> Vec<SysRole> {
        sqlx::query_as::<_, SysRole>(&format!("SELECT {ROLE_COLUMNS} FROM sys_role ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_roles error: {:?}", e);
                vec![]
            })
    }

    async fn get_role(&self, id: i64) -> Option<SysRole> {
        sqlx::query_as::<_, SysRole>(&format!("SELECT {ROLE_COLUMNS} FROM sys_role WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_role error: {:?}", e);
                None
            })
    }

    async fn get_role_by_code(&self, code: &str) -> Option<SysRole> {
        sqlx::query_as::<_, SysRole>(&format!("SELECT {ROLE_COLUMNS} FROM sys_role WHERE code = $1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_role_by_code error: {:?}", e);
                None
            })
    }

    /// get_role_with_users
    ///
    /// Loads the role, then its users through the relation table.
    async fn get_role_with_users(&self, id: i64) -> Option<RoleWithUsers> {
        let role = self.get_role(id).await?;
        let users = sqlx::query_as::<_, SysUser>(
            r#"
            SELECT u.id, u.username, u.nickname, u.email, u.created_at
            FROM sys_user u
            JOIN sys_user_role ur ON ur.user_id = u.id
            WHERE ur.role_id = $1
            ORDER BY u.username
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_role_with_users error: {:?}", e);
            vec![]
        });
        Some(RoleWithUsers { role, users })
    }

    async fn create_role(&self, req: SaveRoleRequest) -> Result<SysRole, RepoError> {
        sqlx::query_as::<_, SysRole>(&format!(
            r#"INSERT INTO sys_role (name, code, "desc", created_at, updated_at)
               VALUES ($1, $2, $3, NOW(), NOW())
               RETURNING {ROLE_COLUMNS}"#
        ))
        .bind(req.name)
        .bind(req.code)
        .bind(req.desc)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique)
    }

    async fn update_role(&self, id: i64, req: SaveRoleRequest) -> Result<Option<SysRole>, RepoError> {
        sqlx::query_as::<_, SysRole>(&format!(
            r#"UPDATE sys_role SET name = $2, code = $3, "desc" = $4, updated_at = NOW()
               WHERE id = $1
               RETURNING {ROLE_COLUMNS}"#
        ))
        .bind(id)
        .bind(req.name)
        .bind(req.code)
        .bind(req.desc)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique)
    }

    /// delete_role
    ///
    /// Relation rows and the role go in one transaction so no user is left pointing at a
    /// missing role.
    async fn delete_role(&self, id: i64) -> bool {
        let result = async {
            let mut tx = self.pool.begin().await?;
            sqlx::query("DELETE FROM sys_user_role WHERE role_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            let deleted = sqlx::query("DELETE FROM sys_role WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            tx.commit().await?;
            Ok::<bool, sqlx::Error>(deleted > 0)
        }
        .await;

        result.unwrap_or_else(|e| {
            tracing::error!("delete_role error: {:?}", e);
            false
        })
    }

    async fn list_users(&self) -> Vec<SysUser> {
        sqlx::query_as::<_, SysUser>(
            "SELECT id, username, nickname, email, created_at FROM sys_user ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_users error: {:?}", e);
            vec![]
        })
    }

    async fn get_user(&self, id: Uuid) -> Option<SysUser> {
        sqlx::query_as::<_, SysUser>(
            "SELECT id, username, nickname, email, created_at FROM sys_user WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or(None)
    }

    async fn create_user(&self, req: CreateUserRequest) -> Result<SysUser, RepoError> {
        sqlx::query_as::<_, SysUser>(
            r#"INSERT INTO sys_user (id, username, nickname, email, created_at)
               VALUES ($1, $2, $3, $4, NOW())
               RETURNING id, username, nickname, email, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(req.username)
        .bind(req.nickname)
        .bind(req.email)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique)
    }

    async fn get_user_roles(&self, user_id: Uuid) -> Vec<SysRole> {
        sqlx::query_as::<_, SysRole>(
            r#"
            SELECT r.id, r.name, r.code, r."desc", r.created_at, r.updated_at
            FROM sys_role r
            JOIN sys_user_role ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_user_roles error: {:?}", e);
            vec![]
        })
    }

    /// assign_roles
    ///
    /// Validates the user and every role id, then swaps the relation rows in one
    /// transaction.
    async fn assign_roles(&self, user_id: Uuid, role_ids: Vec<i64>) -> Result<Vec<SysRole>, RepoError> {
        let wanted: BTreeSet<i64> = role_ids.into_iter().collect();
        let mut tx = self.pool.begin().await?;

        let user_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sys_user WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        let ids: Vec<i64> = wanted.iter().copied().collect();
        let known: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sys_role WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_one(&mut *tx)
            .await?;
        if !user_exists || known as usize != ids.len() {
            return Err(RepoError::NotFound);
        }

        sqlx::query("DELETE FROM sys_user_role WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        for role_id in &ids {
            sqlx::query("INSERT INTO sys_user_role (user_id, role_id) VALUES ($1, $2)")
                .bind(user_id)
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(self.get_user_roles(user_id).await)
    }
}

// --- In-Memory Implementation ---

#[derive(Default)]
struct MemoryTables {
    next_role_id: i64,
    roles: BTreeMap<i64, SysRole>,
    users: HashMap<Uuid, SysUser>,
    user_roles: BTreeSet<(Uuid, i64)>,
}

/// MockRepository
///
/// In-memory implementation of `Repository` for tests and local runs without Postgres.
/// Tables live behind one `tokio::sync::RwLock`; every mutation takes the write lock, so
/// each operation is atomic.
#[derive(Default)]
pub struct MockRepository {
    tables: RwLock<MemoryTables>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn list_roles(&self) -> Vec<SysRole> {
        self.tables.read().await.roles.values().cloned().collect()
    }

    async fn get_role(&self, id: i64) -> Option<SysRole> {
        self.tables.read().await.roles.get(&id).cloned()
    }

    async fn get_role_by_code(&self, code: &str) -> Option<SysRole> {
        let tables = self.tables.read().await;
        tables.roles.values().find(|role| role.code == code).cloned()
    }

    async fn get_role_with_users(&self, id: i64) -> Option<RoleWithUsers> {
        let tables = self.tables.read().await;
        let role = tables.roles.get(&id)?.clone();
        let mut users: Vec<SysUser> = tables
            .user_roles
            .iter()
            .filter(|(_, role_id)| *role_id == id)
            .filter_map(|(user_id, _)| tables.users.get(user_id).cloned())
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Some(RoleWithUsers { role, users })
    }

    async fn create_role(&self, req: SaveRoleRequest) -> Result<SysRole, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.roles.values().any(|role| role.code == req.code) {
            return Err(RepoError::Conflict);
        }
        tables.next_role_id += 1;
        let now = Utc::now();
        let role = SysRole {
            id: tables.next_role_id,
            name: req.name,
            code: req.code,
            desc: req.desc,
            created_at: now,
            updated_at: now,
        };
        tables.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update_role(&self, id: i64, req: SaveRoleRequest) -> Result<Option<SysRole>, RepoError> {
        let mut tables = self.tables.write().await;
        if tables
            .roles
            .values()
            .any(|role| role.code == req.code && role.id != id)
        {
            return Err(RepoError::Conflict);
        }
        let Some(role) = tables.roles.get_mut(&id) else {
            return Ok(None);
        };
        role.name = req.name;
        role.code = req.code;
        role.desc = req.desc;
        role.updated_at = Utc::now();
        Ok(Some(role.clone()))
    }

    async fn delete_role(&self, id: i64) -> bool {
        let mut tables = self.tables.write().await;
        tables.user_roles.retain(|(_, role_id)| *role_id != id);
        tables.roles.remove(&id).is_some()
    }

    async fn list_users(&self) -> Vec<SysUser> {
        let mut users: Vec<SysUser> = self.tables.read().await.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    async fn get_user(&self, id: Uuid) -> Option<SysUser> {
        self.tables.read().await.users.get(&id).cloned()
    }

    async fn create_user(&self, req: CreateUserRequest) -> Result<SysUser, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|user| user.username == req.username) {
            return Err(RepoError::Conflict);
        }
        let user = SysUser {
            id: Uuid::new_v4(),
            username: req.username,
            nickname: req.nickname,
            email: req.email,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user_roles(&self, user_id: Uuid) -> Vec<SysRole> {
        let tables = self.tables.read().await;
        tables
            .user_roles
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .filter_map(|(_, role_id)| tables.roles.get(role_id).cloned())
            .collect()
    }

    async fn assign_roles(&self, user_id: Uuid, role_ids: Vec<i64>) -> Result<Vec<SysRole>, RepoError> {
        {
            let mut tables = self.tables.write().await;
            if !tables.users.contains_key(&user_id)
                || role_ids.iter().any(|id| !tables.roles.contains_key(id))
            {
                return Err(RepoError::NotFound);
            }
            tables.user_roles.retain(|(uid, _)| *uid != user_id);
            for role_id in role_ids {
                tables.user_roles.insert((user_id, role_id));
            }
        }
        Ok(self.get_user_roles(user_id).await)
    }
}
