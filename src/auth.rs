//! JWT issuance, blacklisting and request authentication.
//!
//! Every signed token is recorded in `issued_tokens`; a token is accepted only
//! while its signature and expiry check out AND its row exists without a
//! blacklist stamp.

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::permissions::Identity;
use crate::schemas::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use chrono::{Duration, NaiveDateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use model::entities::issued_token::{self, TokenKind};
use model::entities::prelude::*;
use model::entities::user;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

const AUTH_HEADER_TYPE: &str = "Bearer";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub user_id: Uuid,
    pub jti: String,
    pub token_type: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> NaiveDateTime {
        chrono::DateTime::from_timestamp(self.exp, 0)
            .map(|at| at.naive_utc())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

fn lifetime(config: &AppConfig, kind: TokenKind) -> Duration {
    match kind {
        TokenKind::Access => Duration::days(config.access_token_lifetime_days),
        TokenKind::Refresh => Duration::days(config.refresh_token_lifetime_days),
    }
}

/// Sign a token of `kind` for `user_id` and record it.
pub async fn issue_token<C: ConnectionTrait>(
    db: &C,
    config: &AppConfig,
    user_id: Uuid,
    kind: TokenKind,
) -> Result<String, ApiError> {
    let now = Utc::now();
    let expires = now + lifetime(config, kind);
    let claims = Claims {
        user_id,
        jti: Uuid::new_v4().simple().to_string(),
        token_type: kind,
        iat: now.timestamp(),
        exp: expires.timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret_key.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))?;

    issued_token::ActiveModel {
        jti: Set(claims.jti.clone()),
        user_id: Set(Some(user_id)),
        token_type: Set(kind),
        created_at: Set(now.naive_utc()),
        expires_at: Set(expires.naive_utc()),
        blacklisted_at: Set(None),
    }
    .insert(db)
    .await?;

    trace!("Issued {:?} token {} for user {}", kind, claims.jti, user_id);
    Ok(token)
}

pub async fn issue_pair<C: ConnectionTrait>(
    db: &C,
    config: &AppConfig,
    user_id: Uuid,
) -> Result<TokenPair, ApiError> {
    let refresh = issue_token(db, config, user_id, TokenKind::Refresh).await?;
    let access = issue_token(db, config, user_id, TokenKind::Access).await?;
    Ok(TokenPair { access, refresh })
}

/// Check signature and expiry. Does not consult the blacklist.
pub fn decode_token(config: &AppConfig, token: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret_key.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Reject tokens that were never recorded or have been blacklisted.
pub async fn ensure_not_blacklisted(state: &AppState, claims: &Claims) -> Result<(), ApiError> {
    if let Some(true) = state.token_states.get(&claims.jti).await {
        debug!("Token {} is blacklisted (cached)", claims.jti);
        return Err(ApiError::token_not_valid("Token is blacklisted"));
    }

    let row = IssuedToken::find_by_id(claims.jti.clone())
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::token_not_valid("Token is invalid"))?;

    let blacklisted = row.is_blacklisted();
    state.token_states.insert(claims.jti.clone(), blacklisted).await;
    if blacklisted {
        return Err(ApiError::token_not_valid("Token is blacklisted"));
    }
    Ok(())
}

/// Decode `token`, require `kind` and a clean blacklist record.
pub async fn validate_token(
    state: &AppState,
    token: &str,
    kind: Option<TokenKind>,
) -> Result<Claims, ApiError> {
    let claims = decode_token(&state.config, token)?;
    if let Some(kind) = kind {
        if claims.token_type != kind {
            return Err(ApiError::token_not_valid("Token has wrong type"));
        }
    }
    ensure_not_blacklisted(state, &claims).await?;
    Ok(claims)
}

/// Blacklist one token. Returns false when it was already blacklisted,
/// which makes concurrent rotations of the same refresh token lose.
pub async fn blacklist_token(state: &AppState, jti: &str) -> Result<bool, ApiError> {
    let now = Utc::now().naive_utc();
    let result = IssuedToken::update_many()
        .col_expr(issued_token::Column::BlacklistedAt, Expr::value(now))
        .filter(issued_token::Column::Jti.eq(jti))
        .filter(issued_token::Column::BlacklistedAt.is_null())
        .exec(&state.db)
        .await?;

    state.token_states.insert(jti.to_string(), true).await;
    Ok(result.rows_affected == 1)
}

/// Blacklist every outstanding token of a user.
pub async fn blacklist_user_tokens(state: &AppState, user_id: Uuid) -> Result<u64, ApiError> {
    let outstanding = IssuedToken::find()
        .filter(issued_token::Column::UserId.eq(user_id))
        .filter(issued_token::Column::BlacklistedAt.is_null())
        .all(&state.db)
        .await?;

    let now = Utc::now().naive_utc();
    let result = IssuedToken::update_many()
        .col_expr(issued_token::Column::BlacklistedAt, Expr::value(now))
        .filter(issued_token::Column::UserId.eq(user_id))
        .filter(issued_token::Column::BlacklistedAt.is_null())
        .exec(&state.db)
        .await?;

    for token in outstanding {
        state.token_states.insert(token.jti, true).await;
    }
    info!("Blacklisted {} tokens of user {}", result.rows_affected, user_id);
    Ok(result.rows_affected)
}

/// Delete recorded tokens that expired before `now`. Returns the number removed.
pub async fn flush_expired_tokens<C: ConnectionTrait>(db: &C, now: NaiveDateTime) -> Result<u64, ApiError> {
    let result = IssuedToken::delete_many()
        .filter(issued_token::Column::ExpiresAt.lt(now))
        .exec(db)
        .await?;
    debug!("Flushed {} tokens expired before {}", result.rows_affected, now);
    Ok(result.rows_affected)
}

pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    let outcome = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Password check task failed: {}", e)))?;
    match outcome {
        Ok(matches) => Ok(matches),
        Err(e) => {
            warn!("Stored password hash could not be checked: {}", e);
            Ok(false)
        }
    }
}

/// `Some(token)` for a `Bearer` header, `None` for other schemes.
fn bearer_token(value: &str) -> Result<Option<&str>, ApiError> {
    let mut parts = value.split_whitespace();
    match parts.next() {
        Some(scheme) if scheme == AUTH_HEADER_TYPE => {}
        _ => return Ok(None),
    }
    match (parts.next(), parts.next()) {
        (Some(token), None) => Ok(Some(token)),
        (None, _) => Err(ApiError::token_not_valid(
            "Authorization header must contain two space-delimited values",
        )),
        (Some(_), Some(_)) => Err(ApiError::token_not_valid(
            "Authorization header must contain two space-delimited values",
        )),
    }
}

/// The requesting user, if the request carried a valid access token.
///
/// A missing or non-bearer `Authorization` header yields an anonymous
/// request; a bearer token that fails validation is rejected with 401.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<user::Model>);

impl MaybeUser {
    pub fn identity(&self) -> Identity {
        Identity::of(self.0.as_ref())
    }

    pub fn user(&self) -> Option<&user::Model> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(MaybeUser(None));
        };
        let header = header
            .to_str()
            .map_err(|_| ApiError::token_not_valid("Authorization header is not valid text"))?;
        let Some(token) = bearer_token(header)? else {
            return Ok(MaybeUser(None));
        };

        let claims = validate_token(state, token, Some(TokenKind::Access)).await?;
        let user = User::find_by_id(claims.user_id)
            .one(&state.db)
            .await?
            .ok_or_else(|| ApiError::token_not_valid("User not found"))?;
        if !user.is_active {
            return Err(ApiError::token_not_valid("User is inactive"));
        }

        trace!("Authenticated request as {}", user.username);
        Ok(MaybeUser(Some(user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        crate::test_utils::test_utils::test_config()
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc").unwrap(), Some("abc"));
        assert_eq!(bearer_token("Basic abc").unwrap(), None);
        assert!(bearer_token("Bearer").is_err());
        assert!(bearer_token("Bearer a b").is_err());
    }

    #[test]
    fn test_decode_rejects_foreign_signature() {
        let claims = Claims {
            user_id: Uuid::new_v4(),
            jti: "x".to_string(),
            token_type: TokenKind::Access,
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::days(1)).timestamp(),
        };
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"someone else"),
        )
        .unwrap();

        assert!(matches!(
            decode_token(&config(), &forged),
            Err(ApiError::Unauthorized { code: "TOKEN_NOT_VALID", .. })
        ));
    }

    #[test]
    fn test_decode_rejects_expired() {
        let claims = Claims {
            user_id: Uuid::new_v4(),
            jti: "x".to_string(),
            token_type: TokenKind::Refresh,
            iat: (Utc::now() - Duration::days(20)).timestamp(),
            exp: (Utc::now() - Duration::days(6)).timestamp(),
        };
        let config = config();
        let expired = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.secret_key.as_bytes()),
        )
        .unwrap();

        let err = decode_token(&config, &expired).unwrap_err();
        assert_eq!(err.to_string(), "Token is expired");
    }

    #[tokio::test]
    async fn test_password_hash_round_trip() {
        let hash = hash_password("tabby-cat-42".to_string(), 4).await.unwrap();
        assert!(verify_password("tabby-cat-42".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".to_string(), hash).await.unwrap());
        assert!(!verify_password("x".to_string(), "not a hash".to_string()).await.unwrap());
    }

    #[tokio::test]
    async fn test_flush_expired_tokens_keeps_live_ones() {
        let db = crate::test_utils::test_utils::setup_test_db().await;
        let now = Utc::now().naive_utc();
        for (jti, expires_at) in [("stale", now - Duration::days(1)), ("live", now + Duration::days(1))] {
            issued_token::ActiveModel {
                jti: Set(jti.to_string()),
                user_id: Set(None),
                token_type: Set(TokenKind::Refresh),
                created_at: Set(now - Duration::days(15)),
                expires_at: Set(expires_at),
                blacklisted_at: Set(None),
            }
            .insert(&db)
            .await
            .unwrap();
        }

        assert_eq!(flush_expired_tokens(&db, now).await.unwrap(), 1);
        let remaining: Vec<String> = IssuedToken::find()
            .all(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|token| token.jti)
            .collect();
        assert_eq!(remaining, vec!["live".to_string()]);

        assert_eq!(flush_expired_tokens(&db, now).await.unwrap(), 0);
    }
}
