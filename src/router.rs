use crate::handlers::{
    auth::{create_token, refresh_token, verify_token},
    breeds::{create_breed, get_breed, get_breeds},
    health::health_check,
    kittens::{
        create_kitten, delete_kitten, get_kitten, get_kittens, get_my_kitten,
        partial_update_kitten, update_kitten,
    },
    users::{
        create_user, delete_user, get_me, get_user, get_users, partial_update_user, update_user,
    },
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let media_mount = state.config.media_prefix().trim_end_matches('/').to_string();
    let media_files = ServeDir::new(&state.config.media_root);
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // JWT routes
        .route("/api/auth/jwt/create/", post(create_token))
        .route("/api/auth/jwt/refresh/", post(refresh_token))
        .route("/api/auth/jwt/verify/", post(verify_token))
        // User routes
        .route("/api/users/list/", get(get_users))
        .route("/api/users/create/", post(create_user))
        .route("/api/users/me/", get(get_me))
        .route("/api/users/retrieve/:user_id/", get(get_user))
        .route("/api/users/update/:user_id/", put(update_user))
        .route("/api/users/partial_update/:user_id/", patch(partial_update_user))
        .route("/api/users/delete/:user_id/", delete(delete_user))
        // Breed routes
        .route("/api/breeds/", get(get_breeds).post(create_breed))
        .route("/api/breeds/:breed_id/", get(get_breed))
        // Kitten routes
        .route("/api/kittens/", get(get_kittens).post(create_kitten))
        .route("/api/kittens/me/", get(get_my_kitten))
        .route(
            "/api/kittens/:kitten_id/",
            get(get_kitten)
                .put(update_kitten)
                .patch(partial_update_kitten)
                .delete(delete_kitten),
        )
        // Uploaded kitten pictures
        .nest_service(&media_mount, media_files)
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(timeout))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
