//! The single error type returned by every handler and extractor.

use crate::permissions::Denied;
use crate::schemas::ErrorResponse;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use model::validators::FieldErrors;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input.")]
    Validation(FieldErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error("{message}")]
    Unauthorized { code: &'static str, message: String },
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_authenticated() -> Self {
        Self::Unauthorized {
            code: "NOT_AUTHENTICATED",
            message: "Authentication credentials were not provided.".to_string(),
        }
    }

    pub fn token_not_valid(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            code: "TOKEN_NOT_VALID",
            message: message.into(),
        }
    }

    pub fn no_active_account() -> Self {
        Self::Unauthorized {
            code: "NO_ACTIVE_ACCOUNT",
            message: "No active account found with the given credentials".to_string(),
        }
    }

    pub fn forbidden() -> Self {
        Self::Forbidden("You do not have permission to perform this action.".to_string())
    }

    pub fn not_found() -> Self {
        Self::NotFound("Not found.".to_string())
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(FieldErrors::single(field, message))
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized { code, .. } => (StatusCode::UNAUTHORIZED, *code),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "PERMISSION_DENIED"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let (message, fields) = match self {
            ApiError::Validation(fields) => {
                warn!("Validation failed: {}", fields);
                ("Invalid input.".to_string(), Some(fields.into_inner()))
            }
            ApiError::Database(ref db_error) => {
                error!("Database error: {}", db_error);
                ("Internal server error".to_string(), None)
            }
            ApiError::Internal(ref details) => {
                error!("Internal error: {}", details);
                ("Internal server error".to_string(), None)
            }
            other => (other.to_string(), None),
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            success: false,
            fields,
        };
        (status, Json(body)).into_response()
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(FieldErrors::from(errors))
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        let message = match error.kind() {
            ErrorKind::ExpiredSignature => "Token is expired",
            _ => "Token is invalid",
        };
        ApiError::token_not_valid(message)
    }
}

impl From<Denied> for ApiError {
    fn from(denied: Denied) -> Self {
        match denied {
            Denied::Unauthenticated => ApiError::not_authenticated(),
            Denied::Forbidden => ApiError::forbidden(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        // Identifiers that cannot be parsed cannot exist either.
        ApiError::not_found()
    }
}

/// Translate a unique constraint violation into a field error.
///
/// `columns` pairs a column name, as it appears in the driver's message, with
/// the request field and message to report. Any other error is passed through.
pub fn unique_violation(err: DbErr, columns: &[(&str, &str, &str)]) -> ApiError {
    if let Some(SqlErr::UniqueConstraintViolation(details)) = err.sql_err() {
        for (column, field, message) in columns {
            if details.contains(column) {
                return ApiError::field(field, *message);
            }
        }
    }
    ApiError::Database(err)
}

/// JSON body whose rejections use the API error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Query string whose rejections use the API error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

/// Path parameters; unparsable identifiers read as not found.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParam<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_error_lists_fields() {
        let (status, body) = body_of(ApiError::field("username", "Taken.")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["success"], false);
        assert_eq!(body["fields"]["username"][0], "Taken.");
    }

    #[tokio::test]
    async fn test_internal_details_are_not_leaked() {
        let (status, body) = body_of(ApiError::Internal("disk on fire".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("fields").is_none());
    }

    #[tokio::test]
    async fn test_denied_maps_to_status() {
        let (status, body) = body_of(Denied::Unauthenticated.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "NOT_AUTHENTICATED");

        let (status, _) = body_of(Denied::Forbidden.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_non_unique_errors_pass_through() {
        let error = unique_violation(
            DbErr::Custom("boom".to_string()),
            &[("email", "email", "Taken.")],
        );
        assert!(matches!(error, ApiError::Database(_)));
    }
}
