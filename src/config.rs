use std::env;

use crate::navigation::{CoordinatorOptions, EmptyAuthorityPolicy, RouteKey, RouteMode};

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and pulled into
/// handlers via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Database connection string (Postgres). `None` runs on the in-memory repository.
    pub db_url: Option<String>,
    // Runtime environment marker. Controls the local bypass header and log format.
    pub env: Env,
    // Secret key used to decode and validate incoming JWTs.
    pub jwt_secret: String,
    // Address the HTTP server binds to.
    pub bind_addr: String,
    // Where the console frontend takes its authorized routes from.
    pub route_mode: RouteMode,
    // Home route key served alongside the user routes.
    pub route_home: String,
    // Role code that bypasses route filtering and unlocks the admin API.
    pub super_role: String,
    // What a non-super user without any role sees.
    pub empty_authority: EmptyAuthorityPolicy,
    // Base URL of the route service, as seen by console clients.
    pub authz_base_url: String,
}

/// Env
///
/// Runtime context: local development utilities versus hardened production settings.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

impl Default for AppConfig {
    /// default
    ///
    /// Non-panicking configuration for test setup, no environment variables needed.
    fn default() -> Self {
        Self {
            db_url: None,
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            bind_addr: "127.0.0.1:3000".to_string(),
            route_mode: RouteMode::Static,
            route_home: "home".to_string(),
            super_role: "R_SUPER".to_string(),
            empty_authority: EmptyAuthorityPolicy::DenyAll,
            authz_base_url: "http://127.0.0.1:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables, failing fast.
    ///
    /// # Panics
    /// Panics in production when `DATABASE_URL` or `JWT_SECRET` is missing, so the service
    /// never starts with an incomplete or insecure configuration.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                Some(env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod")),
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
            ),
            Env::Local => (
                env::var("DATABASE_URL").ok(),
                env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        let defaults = Self::default();
        let bind_addr = env::var("BIND_ADDR").unwrap_or(defaults.bind_addr);

        Self {
            db_url,
            env,
            jwt_secret,
            authz_base_url: env::var("AUTHZ_BASE_URL").unwrap_or_else(|_| format!("http://{bind_addr}")),
            bind_addr,
            route_mode: env::var("APP_ROUTE_MODE")
                .map(|v| RouteMode::parse(&v))
                .unwrap_or(defaults.route_mode),
            route_home: env::var("APP_ROUTE_HOME").unwrap_or(defaults.route_home),
            super_role: env::var("APP_SUPER_ROLE").unwrap_or(defaults.super_role),
            empty_authority: env::var("APP_EMPTY_AUTHORITY")
                .map(|v| EmptyAuthorityPolicy::parse(&v))
                .unwrap_or(defaults.empty_authority),
        }
    }
}

/// Route engine settings of a console session running against this deployment.
impl From<&AppConfig> for CoordinatorOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            mode: config.route_mode,
            home: RouteKey::new(config.route_home.as_str()),
            empty_authority: config.empty_authority,
        }
    }
}
