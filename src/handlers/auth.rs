use crate::auth::{self, TokenPair};
use crate::error::{ApiError, JsonBody};
use crate::schemas::{AppState, ErrorResponse};
use axum::{extract::State, response::Json};
use chrono::NaiveDateTime;
use common::ApiResponse;
use model::entities::issued_token::TokenKind;
use model::entities::user;
use model::validators::FieldErrors;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Credentials exchanged for a token pair
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct TokenObtainRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct VerifyRequest {
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPairResponse {
    pub access: String,
    pub refresh: String,
}

impl From<TokenPair> for TokenPairResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access: pair.access,
            refresh: pair.refresh,
        }
    }
}

/// What a verified token says about itself
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenInfoResponse {
    pub user_id: Uuid,
    pub token_type: TokenKind,
    #[serde(with = "common::formats::datetime")]
    #[schema(value_type = String, example = "22.01.2024 10:15:00")]
    pub expires_at: NaiveDateTime,
}

fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    value.ok_or_else(|| FieldErrors::single(field, "This field is required.").into())
}

/// Obtain an access/refresh token pair
#[utoipa::path(
    post,
    path = "/api/auth/jwt/create/",
    tag = "auth",
    request_body = TokenObtainRequest,
    responses(
        (status = 200, description = "Token pair issued", body = ApiResponse<TokenPairResponse>),
        (status = 400, description = "Missing credentials", body = ErrorResponse),
        (status = 401, description = "No active account with these credentials", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_token(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<TokenObtainRequest>,
) -> Result<Json<ApiResponse<TokenPairResponse>>, ApiError> {
    trace!("Entering create_token function");
    let (username, password) = match (request.username, request.password) {
        (Some(username), Some(password)) => (username, password),
        (username, password) => {
            let mut errors = FieldErrors::new();
            errors.require("username", username.as_deref());
            errors.require("password", password.as_deref());
            return Err(errors.into());
        }
    };

    let Some(account) = user::Entity::find()
        .filter(user::Column::Username.eq(username.as_str()))
        .one(&state.db)
        .await?
    else {
        debug!("Login attempt for unknown user '{}'", username);
        return Err(ApiError::no_active_account());
    };

    let password_matches = auth::verify_password(password, account.password.clone()).await?;
    if !password_matches || !account.is_active {
        warn!("Rejected login for '{}'", username);
        return Err(ApiError::no_active_account());
    }

    let pair = auth::issue_pair(&state.db, &state.config, account.id).await?;
    info!("Issued token pair for '{}'", account.username);
    Ok(Json(ApiResponse::ok(TokenPairResponse::from(pair), "Token pair issued")))
}

/// Rotate a refresh token
///
/// The presented refresh token is blacklisted; a new pair is returned.
#[utoipa::path(
    post,
    path = "/api/auth/jwt/refresh/",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token pair rotated", body = ApiResponse<TokenPairResponse>),
        (status = 400, description = "Missing refresh token", body = ErrorResponse),
        (status = 401, description = "Refresh token invalid, expired or blacklisted", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn refresh_token(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RefreshRequest>,
) -> Result<Json<ApiResponse<TokenPairResponse>>, ApiError> {
    trace!("Entering refresh_token function");
    let token = required("refresh", request.refresh)?;
    let claims = auth::validate_token(&state, &token, Some(TokenKind::Refresh)).await?;

    let account = user::Entity::find_by_id(claims.user_id)
        .one(&state.db)
        .await?
        .filter(|account| account.is_active)
        .ok_or_else(|| ApiError::token_not_valid("User not found"))?;

    // Losing a race against another rotation of the same token counts as blacklisted
    if !auth::blacklist_token(&state, &claims.jti).await? {
        warn!("Refresh token {} was rotated concurrently", claims.jti);
        return Err(ApiError::token_not_valid("Token is blacklisted"));
    }

    let pair = auth::issue_pair(&state.db, &state.config, account.id).await?;
    info!("Rotated refresh token for '{}'", account.username);
    Ok(Json(ApiResponse::ok(TokenPairResponse::from(pair), "Token pair rotated")))
}

/// Verify a token
#[utoipa::path(
    post,
    path = "/api/auth/jwt/verify/",
    tag = "auth",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Token is valid", body = ApiResponse<TokenInfoResponse>),
        (status = 400, description = "Missing token", body = ErrorResponse),
        (status = 401, description = "Token invalid, expired or blacklisted", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn verify_token(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<VerifyRequest>,
) -> Result<Json<ApiResponse<TokenInfoResponse>>, ApiError> {
    trace!("Entering verify_token function");
    let token = required("token", request.token)?;
    let claims = auth::validate_token(&state, &token, None).await?;

    let info = TokenInfoResponse {
        user_id: claims.user_id,
        token_type: claims.token_type,
        expires_at: claims.expires_at(),
    };
    Ok(Json(ApiResponse::ok(info, "Token is valid")))
}
