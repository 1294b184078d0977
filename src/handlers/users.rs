use crate::auth::{self, MaybeUser};
use crate::error::{ApiError, JsonBody, PathParam, QueryParams, unique_violation};
use crate::handlers::resolve_window;
use crate::media;
use crate::permissions::{Action, Resource, has_object_permission, has_permission};
use crate::schemas::{AppState, ErrorResponse};
use axum::{extract::State, http::StatusCode, response::Json};
use common::{ApiResponse, Page};
use model::entities::{kitten, user};
use model::validators::{
    FieldErrors, capitalize_name, validate_email, validate_name, validate_password, validate_username,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
const DUPLICATE_EMAIL: &str = "user with this email already exists.";

/// Query parameters of the user list
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    /// Page size
    #[param(value_type = Option<u64>)]
    #[schema(value_type = Option<u64>)]
    pub limit: Option<String>,
    /// Items to skip
    #[param(value_type = Option<u64>)]
    #[schema(value_type = Option<u64>)]
    pub offset: Option<String>,
}

/// Request body for registering a user
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateUserRequest {
    /// Username (must be unique)
    #[validate(length(min = 2, max = 50, message = "Ensure this field has between 2 and 50 characters."))]
    pub username: Option<String>,
    /// E-mail address (must be unique)
    #[validate(length(min = 6, max = 70, message = "Ensure this field has between 6 and 70 characters."))]
    pub email: Option<String>,
    #[validate(length(min = 2, max = 50, message = "Ensure this field has between 2 and 50 characters."))]
    pub first_name: Option<String>,
    #[validate(length(min = 2, max = 50, message = "Ensure this field has between 2 and 50 characters."))]
    pub last_name: Option<String>,
    pub password: Option<String>,
}

/// Request body for PUT and PATCH. Only the names can change.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, max = 50, message = "Ensure this field has between 2 and 50 characters."))]
    pub first_name: Option<String>,
    #[validate(length(min = 2, max = 50, message = "Ensure this field has between 2 and 50 characters."))]
    pub last_name: Option<String>,
}

/// User response model
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
        }
    }
}

/// Body of a successful deletion
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletedUserResponse {
    pub id: Uuid,
}

/// Validate a person name and return it capitalized.
fn clean_person_name(errors: &mut FieldErrors, field: &str, value: &str) -> String {
    let value = value.trim();
    errors.check(field, validate_name(value));
    capitalize_name(value)
}

async fn find_user(state: &AppState, user_id: Uuid) -> Result<user::Model, ApiError> {
    user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            warn!("User with ID {} not found", user_id);
            ApiError::not_found()
        })
}

/// List users
#[utoipa::path(
    get,
    path = "/api/users/list/",
    tag = "users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Page<UserResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_users(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<UserListQuery>,
) -> Result<Json<ApiResponse<Page<UserResponse>>>, ApiError> {
    trace!("Entering get_users function");
    let (limit, offset) = resolve_window(query.limit.as_deref(), query.offset.as_deref(), state.config.page_size);

    let count = user::Entity::find().count(&state.db).await?;
    let users = user::Entity::find()
        .order_by_asc(user::Column::Username)
        .offset(offset)
        .limit(limit)
        .all(&state.db)
        .await?;
    debug!("Retrieved {} users from database", users.len());

    let results = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(ApiResponse::ok(
        Page::new(count, limit, offset, results),
        "Users retrieved successfully",
    )))
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/users/create/",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    trace!("Entering create_user function");

    let mut errors = match request.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => FieldErrors::from(e),
    };
    let username = errors.require("username", request.username.as_deref()).map(str::trim);
    let email = errors.require("email", request.email.as_deref()).map(str::trim);
    let first_name = errors.require("first_name", request.first_name.as_deref());
    let last_name = errors.require("last_name", request.last_name.as_deref());
    let password = errors.require("password", request.password.as_deref());

    if let Some(username) = username {
        errors.check("username", validate_username(username));
    }
    if let Some(email) = email {
        errors.check("email", validate_email(email));
    }
    let first_name = first_name.map(|name| clean_person_name(&mut errors, "first_name", name));
    let last_name = last_name.map(|name| clean_person_name(&mut errors, "last_name", name));
    if let Some(password) = password {
        for problem in validate_password(password, username.unwrap_or_default(), email.unwrap_or_default()) {
            errors.add_error("password", &problem);
        }
    }

    if let Some(email) = email {
        let taken = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&state.db)
            .await?
            .is_some();
        if taken {
            errors.add("email", DUPLICATE_EMAIL);
        }
    }
    if let Some(username) = username {
        let taken = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&state.db)
            .await?
            .is_some();
        if taken {
            errors.add("username", DUPLICATE_USERNAME);
        }
    }

    let (Some(username), Some(email), Some(password), true) =
        (username, email, password, errors.is_empty())
    else {
        return Err(errors.into());
    };

    let password_hash = auth::hash_password(password.to_string(), state.config.password_hash_cost).await?;
    let active = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        first_name: Set(first_name),
        last_name: Set(last_name),
        password: Set(password_hash),
        ..Default::default()
    };

    let created = active.insert(&state.db).await.map_err(|e| {
        unique_violation(
            e,
            &[
                ("email", "email", DUPLICATE_EMAIL),
                ("username", "username", DUPLICATE_USERNAME),
            ],
        )
    })?;

    info!("User created successfully with ID: {}, username: {}", created.id, created.username);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(UserResponse::from(created), "User created successfully")),
    ))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/api/users/retrieve/{user_id}/",
    tag = "users",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<Uuid>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    trace!("Entering get_user function for user_id: {}", user_id);
    let user = find_user(&state, user_id).await?;
    Ok(Json(ApiResponse::ok(UserResponse::from(user), "User retrieved successfully")))
}

/// Update a user's names
#[utoipa::path(
    put,
    path = "/api/users/update/{user_id}/",
    tag = "users",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
    ),
    request_body = UpdateUserRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Neither the user nor an administrator", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: MaybeUser,
    PathParam(user_id): PathParam<Uuid>,
    JsonBody(request): JsonBody<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    trace!("Entering update_user function for user_id: {}", user_id);
    apply_update(&state, &auth, user_id, request, Action::Update).await
}

/// Partially update a user's names
#[utoipa::path(
    patch,
    path = "/api/users/partial_update/{user_id}/",
    tag = "users",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
    ),
    request_body = UpdateUserRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Neither the user nor an administrator", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn partial_update_user(
    State(state): State<AppState>,
    auth: MaybeUser,
    PathParam(user_id): PathParam<Uuid>,
    JsonBody(request): JsonBody<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    trace!("Entering partial_update_user function for user_id: {}", user_id);
    apply_update(&state, &auth, user_id, request, Action::PartialUpdate).await
}

async fn apply_update(
    state: &AppState,
    auth: &MaybeUser,
    user_id: Uuid,
    request: UpdateUserRequest,
    action: Action,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let identity = auth.identity();
    has_permission(Resource::User, action, &identity)?;
    let existing = find_user(state, user_id).await?;
    has_object_permission(Resource::User, action, &identity, existing.id)?;

    let mut errors = match request.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => FieldErrors::from(e),
    };
    let (first_name, last_name) = if action == Action::PartialUpdate {
        (request.first_name.as_deref(), request.last_name.as_deref())
    } else {
        (
            errors.require("first_name", request.first_name.as_deref()),
            errors.require("last_name", request.last_name.as_deref()),
        )
    };

    let mut updated = existing;
    if let Some(name) = first_name {
        updated.first_name = Some(clean_person_name(&mut errors, "first_name", name));
    }
    if let Some(name) = last_name {
        updated.last_name = Some(clean_person_name(&mut errors, "last_name", name));
    }
    errors.into_result()?;

    // The whole record is re-validated before anything is written
    updated.full_clean()?;

    let saved = user::ActiveModel::from(updated)
        .reset_all()
        .update(&state.db)
        .await?;

    info!("User with ID {} updated successfully", user_id);
    Ok(Json(ApiResponse::ok(UserResponse::from(saved), "User updated successfully")))
}

/// Delete a user
///
/// Deleting one's own account also blacklists every token the account holds.
#[utoipa::path(
    delete,
    path = "/api/users/delete/{user_id}/",
    tag = "users",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User deleted successfully", body = ApiResponse<DeletedUserResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Neither the user nor an administrator", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: MaybeUser,
    PathParam(user_id): PathParam<Uuid>,
) -> Result<Json<ApiResponse<DeletedUserResponse>>, ApiError> {
    trace!("Entering delete_user function for user_id: {}", user_id);
    let identity = auth.identity();
    has_permission(Resource::User, Action::Destroy, &identity)?;
    let target = find_user(&state, user_id).await?;
    has_object_permission(Resource::User, Action::Destroy, &identity, target.id)?;

    if auth.user().is_some_and(|caller| caller.id == target.id) {
        debug!("User {} is deleting their own account, logging out", target.username);
        auth::blacklist_user_tokens(&state, target.id).await?;
    }

    let owned_kitten = kitten::Entity::find()
        .filter(kitten::Column::OwnerId.eq(target.id))
        .one(&state.db)
        .await?;
    user::Entity::delete_by_id(target.id).exec(&state.db).await?;
    // The kitten row goes with the owner; its picture does not
    if let Some(kitten) = owned_kitten {
        media::remove_image(&state.config.media_root, &kitten.image).await;
    }

    info!("User with ID {} deleted successfully", user_id);
    Ok(Json(ApiResponse::ok(
        DeletedUserResponse { id: target.id },
        "User deleted successfully",
    )))
}

/// Get the current user
#[utoipa::path(
    get,
    path = "/api/users/me/",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(auth))]
pub async fn get_me(auth: MaybeUser) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    trace!("Entering get_me function");
    has_permission(Resource::User, Action::Me, &auth.identity())?;
    let user = auth.0.ok_or_else(ApiError::not_authenticated)?;
    Ok(Json(ApiResponse::ok(UserResponse::from(user), "User retrieved successfully")))
}
