use crate::auth::MaybeUser;
use crate::config::AppConfig;
use crate::error::{ApiError, JsonBody, PathParam, QueryParams, unique_violation};
use crate::handlers::resolve_window;
use crate::handlers::users::UserResponse;
use crate::media::{self, ImageUpload};
use crate::permissions::{Action, Resource, has_object_permission, has_permission};
use crate::schemas::{AppState, ErrorResponse};
use axum::{extract::State, http::StatusCode, response::Json};
use chrono::{NaiveDate, Utc};
use common::{ApiResponse, Page};
use model::entities::{breed, kitten, user};
use model::validators::FieldErrors;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

const ALREADY_OWNS_KITTEN: &str = "This user already owns a kitten.";
const BLANK_FIELD: &str = "This field may not be blank.";

/// Query parameters of the kitten list
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct KittenListQuery {
    /// Only kittens of this breed
    pub breed: Option<i32>,
    /// Page size
    #[param(value_type = Option<u64>)]
    #[schema(value_type = Option<u64>)]
    pub limit: Option<String>,
    /// Items to skip
    #[param(value_type = Option<u64>)]
    #[schema(value_type = Option<u64>)]
    pub offset: Option<String>,
}

/// Request body for registering a kitten. The owner is always the caller.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateKittenRequest {
    #[validate(length(min = 1, max = 50, message = "Ensure this field has between 1 and 50 characters."))]
    pub name: Option<String>,
    /// Derived from the name when omitted
    pub slug: Option<String>,
    #[validate(length(min = 1, max = 16, message = "Ensure this field has between 1 and 16 characters."))]
    pub color: Option<String>,
    /// `DD.MM.YYYY`
    #[schema(example = "15.01.2024")]
    pub birth_date: Option<String>,
    /// Breed ID
    pub breed: Option<i32>,
    /// `data:image/<type>;base64,<payload>`
    pub image: Option<String>,
    pub description: Option<String>,
}

/// Request body for PUT and PATCH. Slug and owner cannot be changed.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateKittenRequest {
    #[validate(length(min = 1, max = 50, message = "Ensure this field has between 1 and 50 characters."))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 16, message = "Ensure this field has between 1 and 16 characters."))]
    pub color: Option<String>,
    /// `DD.MM.YYYY`
    #[schema(example = "15.01.2024")]
    pub birth_date: Option<String>,
    pub breed: Option<i32>,
    pub image: Option<String>,
    pub description: Option<String>,
}

/// Kitten response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct KittenResponse {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub color: String,
    #[serde(with = "common::formats::date")]
    #[schema(value_type = String, example = "15.01.2024")]
    pub birth_date: NaiveDate,
    /// Whole months since birth
    pub age: u32,
    pub owner: UserResponse,
    /// Breed ID
    pub breed: i32,
    /// Public URL of the picture
    pub image: String,
    pub description: Option<String>,
}

impl KittenResponse {
    pub fn new(kitten: kitten::Model, owner: user::Model, config: &AppConfig, today: NaiveDate) -> Self {
        Self {
            age: kitten.age_in_months(today),
            image: media::public_url(&config.media_prefix(), &kitten.image),
            id: kitten.id,
            name: kitten.name,
            slug: kitten.slug,
            color: kitten.color,
            birth_date: kitten.birth_date,
            owner: UserResponse::from(owner),
            breed: kitten.breed_id,
            description: kitten.description,
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Trimmed text of a required field; blank values are a field error.
fn clean_text(errors: &mut FieldErrors, field: &str, raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        if !errors.contains(field) {
            errors.add(field, BLANK_FIELD);
        }
        return None;
    }
    Some(value.to_string())
}

fn parse_birth_date(errors: &mut FieldErrors, raw: &str) -> Option<NaiveDate> {
    match common::formats::parse_date(raw) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add("birth_date", "Date has wrong format. Use one of these formats instead: DD.MM.YYYY.");
            None
        }
    }
}

fn decode_image(errors: &mut FieldErrors, raw: &str) -> Option<ImageUpload> {
    match media::decode_data_uri(raw) {
        Ok(upload) => Some(upload),
        Err(message) => {
            errors.add("image", message);
            None
        }
    }
}

async fn check_breed_exists(state: &AppState, errors: &mut FieldErrors, breed_id: i32) -> Result<(), ApiError> {
    if breed::Entity::find_by_id(breed_id).one(&state.db).await?.is_none() {
        errors.add("breed", format!("Invalid pk \"{}\" - object does not exist.", breed_id));
    }
    Ok(())
}

async fn load_owner(state: &AppState, owner_id: uuid::Uuid) -> Result<user::Model, ApiError> {
    user::Entity::find_by_id(owner_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("Owner {} of a kitten is missing", owner_id)))
}

async fn find_kitten(state: &AppState, kitten_id: i32) -> Result<kitten::Model, ApiError> {
    kitten::Entity::find_by_id(kitten_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            warn!("Kitten with ID {} not found", kitten_id);
            ApiError::not_found()
        })
}

/// List kittens
#[utoipa::path(
    get,
    path = "/api/kittens/",
    tag = "kittens",
    params(KittenListQuery),
    responses(
        (status = 200, description = "Kittens retrieved successfully", body = ApiResponse<Page<KittenResponse>>),
        (status = 400, description = "Invalid breed filter", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_kittens(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<KittenListQuery>,
) -> Result<Json<ApiResponse<Page<KittenResponse>>>, ApiError> {
    trace!("Entering get_kittens function");
    let (limit, offset) = resolve_window(query.limit.as_deref(), query.offset.as_deref(), state.config.page_size);

    let mut select = kitten::Entity::find();
    if let Some(breed_id) = query.breed {
        debug!("Filtering kittens by breed {}", breed_id);
        select = select.filter(kitten::Column::BreedId.eq(breed_id));
    }

    let count = select.clone().count(&state.db).await?;
    let rows = select
        .order_by_asc(kitten::Column::Name)
        .order_by_asc(kitten::Column::Id)
        .offset(offset)
        .limit(limit)
        .find_also_related(user::Entity)
        .all(&state.db)
        .await?;

    let today = today();
    let results = rows
        .into_iter()
        .map(|(kitten, owner)| match owner {
            Some(owner) => Ok(KittenResponse::new(kitten, owner, &state.config, today)),
            None => Err(ApiError::Internal(format!("Owner of kitten {} is missing", kitten.id))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!("Returning {} of {} kittens", results.len(), count);
    Ok(Json(ApiResponse::ok(
        Page::new(count, limit, offset, results),
        "Kittens retrieved successfully",
    )))
}

/// Register the caller's kitten
#[utoipa::path(
    post,
    path = "/api/kittens/",
    tag = "kittens",
    request_body = CreateKittenRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Kitten created successfully", body = ApiResponse<KittenResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn create_kitten(
    State(state): State<AppState>,
    auth: MaybeUser,
    JsonBody(request): JsonBody<CreateKittenRequest>,
) -> Result<(StatusCode, Json<ApiResponse<KittenResponse>>), ApiError> {
    trace!("Entering create_kitten function");
    has_permission(Resource::Kitten, Action::Create, &auth.identity())?;
    let owner = auth.user().cloned().ok_or_else(ApiError::not_authenticated)?;

    let mut errors = match request.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => FieldErrors::from(e),
    };
    let name = errors
        .require("name", request.name.as_deref())
        .and_then(|raw| clean_text(&mut errors, "name", raw));
    let color = errors
        .require("color", request.color.as_deref())
        .and_then(|raw| clean_text(&mut errors, "color", raw));
    let birth_date = errors
        .require("birth_date", request.birth_date.as_deref())
        .and_then(|raw| parse_birth_date(&mut errors, raw));
    let image = errors
        .require("image", request.image.as_deref())
        .and_then(|raw| decode_image(&mut errors, raw));
    let breed_id = match request.breed {
        Some(breed_id) => {
            check_breed_exists(&state, &mut errors, breed_id).await?;
            Some(breed_id)
        }
        None => {
            errors.add("breed", "This field is required.");
            None
        }
    };

    let already_owns = kitten::Entity::find()
        .filter(kitten::Column::OwnerId.eq(owner.id))
        .one(&state.db)
        .await?
        .is_some();
    if already_owns {
        warn!("User {} already owns a kitten", owner.username);
        errors.add("owner", ALREADY_OWNS_KITTEN);
    }

    let (Some(name), Some(color), Some(birth_date), Some(breed_id), Some(image), true) =
        (name, color, birth_date, breed_id, image, errors.is_empty())
    else {
        return Err(errors.into());
    };

    let candidate = kitten::Model {
        id: 0,
        name,
        slug: request.slug.unwrap_or_default().trim().to_string(),
        color,
        birth_date,
        owner_id: owner.id,
        breed_id,
        image: image.relative_path.clone(),
        description: request.description,
    };
    candidate.full_clean()?;

    media::store_image(&state.config.media_root, &image).await?;

    let mut active = kitten::ActiveModel::from(candidate).reset_all();
    active.id = NotSet;
    let created = match active.insert(&state.db).await {
        Ok(created) => created,
        Err(db_error) => {
            error!("Failed to create kitten for '{}': {}", owner.username, db_error);
            media::remove_image(&state.config.media_root, &image.relative_path).await;
            return Err(unique_violation(db_error, &[("owner_id", "owner", ALREADY_OWNS_KITTEN)]));
        }
    };

    info!("Kitten created with ID: {}, slug: {}", created.id, created.slug);
    let response = KittenResponse::new(created, owner, &state.config, today());
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(response, "Kitten created successfully")),
    ))
}

/// Get the caller's kitten
#[utoipa::path(
    get,
    path = "/api/kittens/me/",
    tag = "kittens",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Kitten retrieved successfully", body = ApiResponse<KittenResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "The caller has no kitten", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_my_kitten(
    State(state): State<AppState>,
    auth: MaybeUser,
) -> Result<Json<ApiResponse<KittenResponse>>, ApiError> {
    trace!("Entering get_my_kitten function");
    has_permission(Resource::Kitten, Action::Me, &auth.identity())?;
    let owner = auth.user().cloned().ok_or_else(ApiError::not_authenticated)?;

    let kitten = kitten::Entity::find()
        .filter(kitten::Column::OwnerId.eq(owner.id))
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            debug!("User {} has no kitten", owner.username);
            ApiError::not_found()
        })?;

    let response = KittenResponse::new(kitten, owner, &state.config, today());
    Ok(Json(ApiResponse::ok(response, "Kitten retrieved successfully")))
}

/// Get a kitten by ID
#[utoipa::path(
    get,
    path = "/api/kittens/{kitten_id}/",
    tag = "kittens",
    params(
        ("kitten_id" = i32, Path, description = "Kitten ID"),
    ),
    responses(
        (status = 200, description = "Kitten retrieved successfully", body = ApiResponse<KittenResponse>),
        (status = 404, description = "Kitten not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_kitten(
    State(state): State<AppState>,
    PathParam(kitten_id): PathParam<i32>,
) -> Result<Json<ApiResponse<KittenResponse>>, ApiError> {
    trace!("Entering get_kitten function for kitten_id: {}", kitten_id);
    let kitten = find_kitten(&state, kitten_id).await?;
    let owner = load_owner(&state, kitten.owner_id).await?;

    let response = KittenResponse::new(kitten, owner, &state.config, today());
    Ok(Json(ApiResponse::ok(response, "Kitten retrieved successfully")))
}

/// Update a kitten
#[utoipa::path(
    put,
    path = "/api/kittens/{kitten_id}/",
    tag = "kittens",
    params(
        ("kitten_id" = i32, Path, description = "Kitten ID"),
    ),
    request_body = UpdateKittenRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Kitten updated successfully", body = ApiResponse<KittenResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Neither the owner nor an administrator", body = ErrorResponse),
        (status = 404, description = "Kitten not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_kitten(
    State(state): State<AppState>,
    auth: MaybeUser,
    PathParam(kitten_id): PathParam<i32>,
    JsonBody(request): JsonBody<UpdateKittenRequest>,
) -> Result<Json<ApiResponse<KittenResponse>>, ApiError> {
    trace!("Entering update_kitten function for kitten_id: {}", kitten_id);
    apply_update(&state, &auth, kitten_id, request, Action::Update).await
}

/// Partially update a kitten
#[utoipa::path(
    patch,
    path = "/api/kittens/{kitten_id}/",
    tag = "kittens",
    params(
        ("kitten_id" = i32, Path, description = "Kitten ID"),
    ),
    request_body = UpdateKittenRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Kitten updated successfully", body = ApiResponse<KittenResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Neither the owner nor an administrator", body = ErrorResponse),
        (status = 404, description = "Kitten not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn partial_update_kitten(
    State(state): State<AppState>,
    auth: MaybeUser,
    PathParam(kitten_id): PathParam<i32>,
    JsonBody(request): JsonBody<UpdateKittenRequest>,
) -> Result<Json<ApiResponse<KittenResponse>>, ApiError> {
    trace!("Entering partial_update_kitten function for kitten_id: {}", kitten_id);
    apply_update(&state, &auth, kitten_id, request, Action::PartialUpdate).await
}

async fn apply_update(
    state: &AppState,
    auth: &MaybeUser,
    kitten_id: i32,
    request: UpdateKittenRequest,
    action: Action,
) -> Result<Json<ApiResponse<KittenResponse>>, ApiError> {
    let identity = auth.identity();
    has_permission(Resource::Kitten, action, &identity)?;
    let existing = find_kitten(state, kitten_id).await?;
    has_object_permission(Resource::Kitten, action, &identity, existing.owner_id)?;

    let partial = action == Action::PartialUpdate;
    let mut errors = match request.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => FieldErrors::from(e),
    };
    if !partial {
        for (field, present) in [
            ("name", request.name.is_some()),
            ("color", request.color.is_some()),
            ("birth_date", request.birth_date.is_some()),
            ("breed", request.breed.is_some()),
        ] {
            if !present {
                errors.add(field, "This field is required.");
            }
        }
    }

    let name = match request.name.as_deref() {
        Some(raw) => clean_text(&mut errors, "name", raw),
        None => None,
    };
    let color = match request.color.as_deref() {
        Some(raw) => clean_text(&mut errors, "color", raw),
        None => None,
    };
    let birth_date = match request.birth_date.as_deref() {
        Some(raw) => parse_birth_date(&mut errors, raw),
        None => None,
    };
    let image = match request.image.as_deref() {
        Some(raw) => decode_image(&mut errors, raw),
        None => None,
    };
    if let Some(breed_id) = request.breed {
        check_breed_exists(state, &mut errors, breed_id).await?;
    }
    errors.into_result()?;

    let previous_image = existing.image.clone();
    let mut updated = existing;
    if let Some(name) = name {
        updated.name = name;
    }
    if let Some(color) = color {
        updated.color = color;
    }
    if let Some(birth_date) = birth_date {
        updated.birth_date = birth_date;
    }
    if let Some(breed_id) = request.breed {
        updated.breed_id = breed_id;
    }
    if let Some(image) = &image {
        updated.image = image.relative_path.clone();
    }
    if request.description.is_some() || !partial {
        updated.description = request.description;
    }
    updated.full_clean()?;

    if let Some(image) = &image {
        media::store_image(&state.config.media_root, image).await?;
    }

    let saved = match kitten::ActiveModel::from(updated).reset_all().update(&state.db).await {
        Ok(saved) => saved,
        Err(db_error) => {
            error!("Failed to update kitten {}: {}", kitten_id, db_error);
            if let Some(image) = &image {
                media::remove_image(&state.config.media_root, &image.relative_path).await;
            }
            return Err(db_error.into());
        }
    };
    if image.is_some() {
        media::remove_image(&state.config.media_root, &previous_image).await;
    }

    info!("Kitten with ID {} updated successfully", kitten_id);
    let owner = load_owner(state, saved.owner_id).await?;
    let response = KittenResponse::new(saved, owner, &state.config, today());
    Ok(Json(ApiResponse::ok(response, "Kitten updated successfully")))
}

/// Delete a kitten
#[utoipa::path(
    delete,
    path = "/api/kittens/{kitten_id}/",
    tag = "kittens",
    params(
        ("kitten_id" = i32, Path, description = "Kitten ID"),
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Kitten deleted successfully", body = ApiResponse<String>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Neither the owner nor an administrator", body = ErrorResponse),
        (status = 404, description = "Kitten not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_kitten(
    State(state): State<AppState>,
    auth: MaybeUser,
    PathParam(kitten_id): PathParam<i32>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    trace!("Entering delete_kitten function for kitten_id: {}", kitten_id);
    let identity = auth.identity();
    has_permission(Resource::Kitten, Action::Destroy, &identity)?;
    let existing = find_kitten(&state, kitten_id).await?;
    has_object_permission(Resource::Kitten, Action::Destroy, &identity, existing.owner_id)?;

    kitten::Entity::delete_by_id(kitten_id).exec(&state.db).await?;
    media::remove_image(&state.config.media_root, &existing.image).await;

    info!("Kitten with ID {} deleted successfully", kitten_id);
    Ok(Json(ApiResponse::ok(
        format!("Kitten {} deleted", kitten_id),
        "Kitten deleted successfully",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_ignores_slug_and_owner() {
        let request: UpdateKittenRequest = serde_json::from_value(serde_json::json!({
            "name": "Vaska",
            "slug": "changed",
            "owner": "00000000-0000-0000-0000-000000000000"
        }))
        .unwrap();
        assert_eq!(request.name.as_deref(), Some("Vaska"));
        assert!(request.color.is_none());
    }

    #[test]
    fn test_length_rules() {
        let request = CreateKittenRequest {
            name: Some(String::new()),
            color: Some("a very long colour name".to_string()),
            ..Default::default()
        };
        let errors = FieldErrors::from(request.validate().unwrap_err());
        assert_eq!(
            errors.get("name").unwrap(),
            ["Ensure this field has between 1 and 50 characters."]
        );
        assert_eq!(
            errors.get("color").unwrap(),
            ["Ensure this field has between 1 and 16 characters."]
        );
    }

    #[test]
    fn test_clean_text_trims_and_rejects_blank() {
        let mut errors = FieldErrors::new();
        assert_eq!(clean_text(&mut errors, "name", "  Murka ").as_deref(), Some("Murka"));
        assert!(errors.is_empty());

        assert_eq!(clean_text(&mut errors, "name", "   "), None);
        assert_eq!(errors.get("name").unwrap(), [BLANK_FIELD]);
    }
}
