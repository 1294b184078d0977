use crate::auth::MaybeUser;
use crate::error::{ApiError, JsonBody, PathParam, QueryParams, unique_violation};
use crate::handlers::resolve_window;
use crate::permissions::{Action, Resource, has_permission};
use crate::schemas::{AppState, ErrorResponse};
use axum::{extract::State, http::StatusCode, response::Json};
use common::{ApiResponse, Page};
use model::entities::breed;
use model::validators::FieldErrors;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};

const DUPLICATE_NAME: &str = "breed with this name already exists.";

/// Query parameters of the breed list
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BreedListQuery {
    /// Case-insensitive name prefix, at least two characters
    pub name: Option<String>,
    /// Page size
    #[param(value_type = Option<u64>)]
    #[schema(value_type = Option<u64>)]
    pub limit: Option<String>,
    /// Items to skip
    #[param(value_type = Option<u64>)]
    #[schema(value_type = Option<u64>)]
    pub offset: Option<String>,
}

/// Request body for creating a breed
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateBreedRequest {
    /// Breed name (must be unique)
    pub name: Option<String>,
}

/// Breed response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BreedResponse {
    pub id: i32,
    pub name: String,
}

impl From<breed::Model> for BreedResponse {
    fn from(model: breed::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

/// List breeds
#[utoipa::path(
    get,
    path = "/api/breeds/",
    tag = "breeds",
    params(BreedListQuery),
    responses(
        (status = 200, description = "Breeds retrieved successfully", body = ApiResponse<Page<BreedResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_breeds(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<BreedListQuery>,
) -> Result<Json<ApiResponse<Page<BreedResponse>>>, ApiError> {
    trace!("Entering get_breeds function");
    let (limit, offset) = resolve_window(query.limit.as_deref(), query.offset.as_deref(), state.config.page_size);

    let breeds = breed::Entity::find()
        .order_by_asc(breed::Column::Name)
        .all(&state.db)
        .await?;
    debug!("Loaded {} breeds", breeds.len());

    // Prefix matching happens here so non-ASCII names compare case-insensitively
    let matched = breed::filter_by_name_prefix(breeds, query.name.as_deref());
    let page = Page::from_vec(matched, limit, offset).map(BreedResponse::from);

    info!("Returning {} of {} breeds", page.results.len(), page.count);
    Ok(Json(ApiResponse::ok(page, "Breeds retrieved successfully")))
}

/// Create a breed (administrators only)
#[utoipa::path(
    post,
    path = "/api/breeds/",
    tag = "breeds",
    request_body = CreateBreedRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Breed created successfully", body = ApiResponse<BreedResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn create_breed(
    State(state): State<AppState>,
    auth: MaybeUser,
    JsonBody(request): JsonBody<CreateBreedRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BreedResponse>>), ApiError> {
    trace!("Entering create_breed function");
    has_permission(Resource::Breed, Action::Create, &auth.identity())?;

    let mut errors = FieldErrors::new();
    let name = errors
        .require("name", request.name.as_deref())
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    errors.into_result()?;

    let candidate = breed::Model { id: 0, name };
    candidate.full_clean()?;

    let duplicate = breed::Entity::find()
        .filter(breed::Column::Name.eq(candidate.name.as_str()))
        .one(&state.db)
        .await?;
    if duplicate.is_some() {
        warn!("Breed '{}' already exists", candidate.name);
        return Err(ApiError::field("name", DUPLICATE_NAME));
    }

    let created = breed::ActiveModel {
        name: Set(candidate.name),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(|e| unique_violation(e, &[("name", "name", DUPLICATE_NAME)]))?;

    info!("Breed created with ID: {}, name: {}", created.id, created.name);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(BreedResponse::from(created), "Breed created successfully")),
    ))
}

/// Get a breed by ID
#[utoipa::path(
    get,
    path = "/api/breeds/{breed_id}/",
    tag = "breeds",
    params(
        ("breed_id" = i32, Path, description = "Breed ID"),
    ),
    responses(
        (status = 200, description = "Breed retrieved successfully", body = ApiResponse<BreedResponse>),
        (status = 404, description = "Breed not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_breed(
    State(state): State<AppState>,
    PathParam(breed_id): PathParam<i32>,
) -> Result<Json<ApiResponse<BreedResponse>>, ApiError> {
    trace!("Entering get_breed function for breed_id: {}", breed_id);

    let breed = breed::Entity::find_by_id(breed_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            warn!("Breed with ID {} not found", breed_id);
            ApiError::not_found()
        })?;

    Ok(Json(ApiResponse::ok(BreedResponse::from(breed), "Breed retrieved successfully")))
}
