use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    navigation::AuthoritySet,
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the console's JSON Web Tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the `sys_user.id` of the caller.
    pub sub: Uuid,
    /// Expiration Time (exp).
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// issue_token
///
/// Signs a token for `user_id` valid for `ttl_secs` seconds.
pub fn issue_token(secret: &str, user_id: Uuid, ttl_secs: usize) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id,
        exp: now + ttl_secs,
        iat: now,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

/// AuthUser Extractor Result
///
/// Resolved identity of an authenticated request: the user and the role codes they hold.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub roles: Vec<String>,
    /// Holds the configured super role.
    pub is_super: bool,
}

impl AuthUser {
    /// The authority set route filtering runs against.
    pub fn authority(&self) -> AuthoritySet {
        AuthoritySet {
            roles: self.roles.iter().cloned().collect(),
            super_bypass: self.is_super,
        }
    }

    /// Rejects with 403 unless the caller holds the super role.
    pub fn require_super(&self) -> Result<(), StatusCode> {
        if self.is_super {
            Ok(())
        } else {
            Err(StatusCode::FORBIDDEN)
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local`, an `x-user-id` header naming an existing user is accepted.
/// 2. Bearer token extraction and JWT validation (expiry always checked).
/// 3. DB lookup of the user and their role codes, so deleted users and revoked roles take
///    effect immediately.
///
/// Rejection: `StatusCode::UNAUTHORIZED` on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let user_id = match local_bypass(parts, &config) {
            Some(id) => id,
            None => {
                let token = parts
                    .headers
                    .get(header::AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.strip_prefix("Bearer "))
                    .ok_or(StatusCode::UNAUTHORIZED)?;

                let mut validation = Validation::default();
                validation.validate_exp = true;
                let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

                decode::<Claims>(token, &decoding_key, &validation)
                    .map_err(|e| {
                        tracing::debug!(error = %e, "rejected bearer token");
                        StatusCode::UNAUTHORIZED
                    })?
                    .claims
                    .sub
            }
        };

        let user = repo.get_user(user_id).await.ok_or(StatusCode::UNAUTHORIZED)?;
        let roles = repo.get_role_codes(user.id).await;
        let is_super = roles.iter().any(|code| code == &config.super_role);

        Ok(AuthUser {
            id: user.id,
            roles,
            is_super,
        })
    }
}

fn local_bypass(parts: &Parts, config: &AppConfig) -> Option<Uuid> {
    if config.env != Env::Local {
        return None;
    }
    let value = parts.headers.get("x-user-id")?.to_str().ok()?;
    Uuid::parse_str(value).ok()
}
