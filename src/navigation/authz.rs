use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use ts_rs::TS;

use super::node::{RouteKey, RouteNode};
use crate::config::AppConfig;

/// UserRoutes
///
/// Authorized routes of the calling user and the key of their home route, as served by
/// `GET /route/getUserRoutes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserRoutes {
    pub routes: Vec<RouteNode>,
    pub home: RouteKey,
}

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("authorization service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("authorization service rejected the request with status {0}")]
    Rejected(u16),
    #[error("authorization service unavailable: {0}")]
    Unavailable(String),
}

pub type AuthzResult<T> = Result<T, AuthzError>;

/// AuthorizationService
///
/// Remote source of the caller's authorized routes, used in dynamic route mode.
#[async_trait]
pub trait AuthorizationService: Send + Sync {
    async fn fetch_user_routes(&self) -> AuthzResult<UserRoutes>;
    async fn fetch_route_exists(&self, name: &str) -> AuthzResult<bool>;
}

/// HttpAuthorizationService
///
/// Calls the console backend's route endpoints with the session's bearer token.
/// Timeouts belong to the `reqwest::Client` handed in.
#[derive(Clone)]
pub struct HttpAuthorizationService {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpAuthorizationService {
    pub fn new(client: reqwest::Client, base_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Client for the route service at the configured `AUTHZ_BASE_URL`.
    pub fn from_config(client: reqwest::Client, config: &AppConfig, token: &str) -> Self {
        Self::new(client, &config.authz_base_url, token)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> AuthzResult<reqwest::Response> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthzError::Rejected(response.status().as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl AuthorizationService for HttpAuthorizationService {
    async fn fetch_user_routes(&self) -> AuthzResult<UserRoutes> {
        let response = self.get("/route/getUserRoutes", &[]).await?;
        Ok(response.json::<UserRoutes>().await?)
    }

    async fn fetch_route_exists(&self, name: &str) -> AuthzResult<bool> {
        let response = self
            .get("/route/isRouteExist", &[("routeName", name)])
            .await?;
        Ok(response.json::<bool>().await?)
    }
}

/// MockAuthorizationService
///
/// Canned responses for tests. `routes: None` simulates an unreachable service.
#[derive(Debug, Default)]
pub struct MockAuthorizationService {
    pub routes: Option<UserRoutes>,
    pub fetch_calls: AtomicUsize,
}

impl MockAuthorizationService {
    pub fn new(routes: UserRoutes) -> Self {
        Self {
            routes: Some(routes),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn new_failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthorizationService for MockAuthorizationService {
    async fn fetch_user_routes(&self) -> AuthzResult<UserRoutes> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.routes
            .clone()
            .ok_or_else(|| AuthzError::Unavailable("mock authorization failure".to_string()))
    }

    async fn fetch_route_exists(&self, name: &str) -> AuthzResult<bool> {
        let routes = self
            .routes
            .as_ref()
            .ok_or_else(|| AuthzError::Unavailable("mock authorization failure".to_string()))?;
        Ok(super::node::find(&routes.routes, &RouteKey::new(name)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_reports_failures_and_counts_calls() {
        let failing = MockAuthorizationService::new_failing();
        assert!(failing.fetch_user_routes().await.is_err());
        assert!(failing.fetch_route_exists("home").await.is_err());
        assert_eq!(failing.calls(), 1);

        let ok = MockAuthorizationService::new(UserRoutes {
            routes: vec![RouteNode::leaf("home", "/home", "view.home")],
            home: RouteKey::new("home"),
        });
        assert_eq!(ok.fetch_user_routes().await.unwrap().home.as_str(), "home");
        assert!(ok.fetch_route_exists("home").await.unwrap());
        assert!(!ok.fetch_route_exists("missing").await.unwrap());
    }

    #[test]
    fn error_display_variants() {
        for error in [
            AuthzError::Rejected(401),
            AuthzError::Unavailable("down".to_string()),
        ] {
            assert!(!error.to_string().is_empty());
        }
    }
}
