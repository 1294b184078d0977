use crate::config::AppConfig;
use crate::handlers::{
    auth::{RefreshRequest, TokenInfoResponse, TokenObtainRequest, TokenPairResponse, VerifyRequest},
    breeds::{BreedListQuery, BreedResponse, CreateBreedRequest},
    kittens::{CreateKittenRequest, KittenListQuery, KittenResponse, UpdateKittenRequest},
    users::{CreateUserRequest, DeletedUserResponse, UpdateUserRequest, UserListQuery, UserResponse},
};
use common::{ApiResponse, Page};
use model::entities::issued_token::TokenKind;
use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Immutable configuration
    pub config: Arc<AppConfig>,
    /// Token id to "is blacklisted", written through on every blacklist
    pub token_states: Cache<String, bool>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
    /// Validation messages keyed by field name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
    /// Server time, `DD.MM.YYYY HH:MM:SS`
    pub timestamp: String,
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::breeds::get_breeds,
        crate::handlers::breeds::create_breed,
        crate::handlers::breeds::get_breed,
        crate::handlers::kittens::get_kittens,
        crate::handlers::kittens::create_kitten,
        crate::handlers::kittens::get_my_kitten,
        crate::handlers::kittens::get_kitten,
        crate::handlers::kittens::update_kitten,
        crate::handlers::kittens::partial_update_kitten,
        crate::handlers::kittens::delete_kitten,
        crate::handlers::users::get_users,
        crate::handlers::users::create_user,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::partial_update_user,
        crate::handlers::users::delete_user,
        crate::handlers::users::get_me,
        crate::handlers::auth::create_token,
        crate::handlers::auth::refresh_token,
        crate::handlers::auth::verify_token,
    ),
    components(
        schemas(
            ApiResponse<KittenResponse>,
            Page<KittenResponse>,
            ErrorResponse,
            HealthResponse,
            BreedResponse,
            CreateBreedRequest,
            BreedListQuery,
            KittenResponse,
            CreateKittenRequest,
            UpdateKittenRequest,
            KittenListQuery,
            UserResponse,
            CreateUserRequest,
            UpdateUserRequest,
            UserListQuery,
            DeletedUserResponse,
            TokenObtainRequest,
            RefreshRequest,
            VerifyRequest,
            TokenPairResponse,
            TokenInfoResponse,
            TokenKind,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "breeds", description = "Kitten breeds"),
        (name = "kittens", description = "Exhibited kittens and their owners"),
        (name = "users", description = "User accounts"),
        (name = "auth", description = "JWT issuance, rotation and verification"),
    ),
    info(
        title = "Kittens API",
        description = "Back office of a kitten exhibition: user accounts, breeds and kittens",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
