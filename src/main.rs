use admin_console::{
    AppState,
    auth::issue_token,
    config::{AppConfig, Env},
    create_router,
    repository::{MockRepository, PostgresRepository, RepositoryState, seed_super_user},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Initializes configuration, logging, the repository and the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG first, then local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "admin_console=debug,tower_http=info".into());

    // Pretty output locally, JSON for log aggregation in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!(
        "Application starting in {:?} mode, route mode {:?}",
        config.env,
        config.route_mode
    );

    // 3. Repository: Postgres when configured, in-memory otherwise (local only).
    let repo = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
            Arc::new(PostgresRepository::new(pool)) as RepositoryState
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory repository");
            let repo = MockRepository::new();
            let admin = seed_super_user(&repo, &config.super_role, "admin")
                .await
                .expect("FATAL: Failed to seed the in-memory repository.");
            let token = issue_token(&config.jwt_secret, admin.id, 24 * 3600)
                .expect("FATAL: Failed to sign the bootstrap token.");
            tracing::info!(
                user_id = %admin.id,
                role = %config.super_role,
                "Seeded super user `admin` (send `x-user-id: {}` locally, or the bearer token below)",
                admin.id
            );
            tracing::info!("Bootstrap token (24h): {}", token);
            Arc::new(repo) as RepositoryState
        }
    };

    // 4. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(repo, config));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
