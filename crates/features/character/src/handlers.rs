use crate::Characters;
use crate::error::CharacterError;
use crate::models::{
    AttributesUpdate, CharacterListItem, CharacterSummary, CreateCharacter, FeaturePurchase, NameUpdate, UndoRequest,
};
use axum::Json;
use axum::extract::{Path, State};
use larp_derive::api_handler;
use larp_domain::constants::{CHARACTER_TAG, CHARACTERS_PATH};
use larp_kernel::prelude::{ApiState, Enhanced, ErrorBody, Outcome, RefreshTargets};
use larp_rules::FeatureForm;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

/// Character routes under `/api/characters`.
pub fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new()
        .routes(routes!(list_handler, create_handler))
        .routes(routes!(summary_handler))
        .routes(routes!(feature_form_handler, purchase_handler))
        .routes(routes!(attributes_handler))
        .routes(routes!(name_handler))
        .routes(routes!(apply_handler))
        .routes(routes!(undo_handler))
        .routes(routes!(delete_handler))
        .routes(routes!(copy_handler))
}

fn characters(state: &ApiState) -> Result<&Characters, CharacterError> {
    state.try_get_slice::<Characters>().map_err(|e| CharacterError::from(e.to_string()))
}

#[api_handler(
    get,
    path = "/api/characters",
    responses((status = OK, description = "Stored characters", body = Vec<CharacterListItem>)),
    tag = CHARACTER_TAG,
)]
pub(crate) async fn list_handler(
    State(state): State<ApiState>,
) -> Result<Json<Vec<CharacterListItem>>, CharacterError> {
    Ok(Json(characters(&state)?.list()))
}

#[api_handler(
    post,
    path = "/api/characters",
    request_body = CreateCharacter,
    responses(
        (status = CREATED, description = "Character created", body = CharacterSummary),
        (status = NO_CONTENT, description = "Enhanced request; HX-Redirect names the new character"),
        (status = BAD_REQUEST, description = "Missing name", body = ErrorBody),
        (status = NOT_FOUND, description = "Unknown ruleset", body = ErrorBody),
    ),
    tag = CHARACTER_TAG,
)]
pub(crate) async fn create_handler(
    State(state): State<ApiState>,
    enhanced: Enhanced,
    Json(request): Json<CreateCharacter>,
) -> Result<Outcome<CharacterSummary>, CharacterError> {
    let summary = characters(&state)?.create(request)?;
    let location = format!("{CHARACTERS_PATH}/{}", summary.character.id);
    Ok(enhanced.created(location, summary))
}

#[api_handler(
    get,
    path = "/api/characters/{id}",
    params(("id" = String, Path, description = "Character id")),
    responses(
        (status = OK, description = "Sheet summary", body = CharacterSummary),
        (status = NOT_FOUND, description = "No such character", body = ErrorBody),
    ),
    tag = CHARACTER_TAG,
)]
pub(crate) async fn summary_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<CharacterSummary>, CharacterError> {
    Ok(Json(characters(&state)?.summary(&id)?))
}

#[api_handler(
    get,
    path = "/api/characters/{id}/features/{feature_id}",
    params(
        ("id" = String, Path, description = "Character id"),
        ("feature_id" = String, Path, description = "Feature id, optionally with an option (`lore+Undead`)"),
    ),
    responses(
        (status = OK, description = "Purchase form for the feature"),
        (status = NOT_FOUND, description = "No such character or feature", body = ErrorBody),
    ),
    tag = CHARACTER_TAG,
)]
pub(crate) async fn feature_form_handler(
    State(state): State<ApiState>,
    Path((id, feature_id)): Path<(String, String)>,
) -> Result<Json<FeatureForm>, CharacterError> {
    Ok(Json(characters(&state)?.feature_form(&id, &feature_id)?))
}

#[api_handler(
    post,
    path = "/api/characters/{id}/features/{feature_id}",
    params(
        ("id" = String, Path, description = "Character id"),
        ("feature_id" = String, Path, description = "Feature id, optionally with an option (`lore+Undead`)"),
    ),
    request_body = FeaturePurchase,
    responses(
        (status = OK, description = "Updated summary", body = CharacterSummary),
        (status = NO_CONTENT, description = "Enhanced request; HX-Trigger lists regions to refresh"),
        (status = UNPROCESSABLE_ENTITY, description = "The rules refused the change"),
    ),
    tag = CHARACTER_TAG,
)]
pub(crate) async fn purchase_handler(
    State(state): State<ApiState>,
    enhanced: Enhanced,
    Path((id, feature_id)): Path<(String, String)>,
    Json(request): Json<FeaturePurchase>,
) -> Result<Outcome<CharacterSummary>, CharacterError> {
    let summary = characters(&state)?.purchase(&id, &feature_id, request)?;
    Ok(enhanced.refresh(RefreshTargets::ALL, summary))
}

#[api_handler(
    post,
    path = "/api/characters/{id}/attributes",
    params(("id" = String, Path, description = "Character id")),
    request_body = AttributesUpdate,
    responses(
        (status = OK, description = "Updated summary", body = CharacterSummary),
        (status = NO_CONTENT, description = "Enhanced request"),
        (status = UNPROCESSABLE_ENTITY, description = "The sheet would become invalid"),
    ),
    tag = CHARACTER_TAG,
)]
pub(crate) async fn attributes_handler(
    State(state): State<ApiState>,
    enhanced: Enhanced,
    Path(id): Path<String>,
    Json(request): Json<AttributesUpdate>,
) -> Result<Outcome<CharacterSummary>, CharacterError> {
    let summary = characters(&state)?.set_attributes(&id, request)?;
    Ok(enhanced.refresh(RefreshTargets::CHARACTER, summary))
}

#[api_handler(
    post,
    path = "/api/characters/{id}/name",
    params(("id" = String, Path, description = "Character id")),
    request_body = NameUpdate,
    responses(
        (status = OK, description = "Updated summary", body = CharacterSummary),
        (status = NO_CONTENT, description = "Enhanced request"),
    ),
    tag = CHARACTER_TAG,
)]
pub(crate) async fn name_handler(
    State(state): State<ApiState>,
    enhanced: Enhanced,
    Path(id): Path<String>,
    Json(request): Json<NameUpdate>,
) -> Result<Outcome<CharacterSummary>, CharacterError> {
    let summary = characters(&state)?.rename(&id, request)?;
    Ok(enhanced.refresh(RefreshTargets::SUMMARY, summary))
}

#[api_handler(
    post,
    path = "/api/characters/{id}/apply",
    params(("id" = String, Path, description = "Character id")),
    responses(
        (status = OK, description = "Respend finalized", body = CharacterSummary),
        (status = NO_CONTENT, description = "Enhanced request"),
        (status = CONFLICT, description = "Respend already closed", body = ErrorBody),
        (status = UNPROCESSABLE_ENTITY, description = "The sheet has outstanding issues"),
    ),
    tag = CHARACTER_TAG,
)]
pub(crate) async fn apply_handler(
    State(state): State<ApiState>,
    enhanced: Enhanced,
    Path(id): Path<String>,
) -> Result<Outcome<CharacterSummary>, CharacterError> {
    let summary = characters(&state)?.finalize(&id)?;
    Ok(enhanced.refresh(RefreshTargets::ALL, summary))
}

#[api_handler(
    post,
    path = "/api/characters/{id}/undo",
    params(("id" = String, Path, description = "Character id")),
    request_body = UndoRequest,
    responses(
        (status = OK, description = "Latest change reverted", body = CharacterSummary),
        (status = NO_CONTENT, description = "Enhanced request"),
        (status = CONFLICT, description = "Nothing to undo, or a stale undo id", body = ErrorBody),
    ),
    tag = CHARACTER_TAG,
)]
pub(crate) async fn undo_handler(
    State(state): State<ApiState>,
    enhanced: Enhanced,
    Path(id): Path<String>,
    Json(request): Json<UndoRequest>,
) -> Result<Outcome<CharacterSummary>, CharacterError> {
    let summary = characters(&state)?.undo(&id, request)?;
    Ok(enhanced.refresh(RefreshTargets::ALL, summary))
}

#[api_handler(
    post,
    path = "/api/characters/{id}/delete",
    params(("id" = String, Path, description = "Character id")),
    responses(
        (status = SEE_OTHER, description = "Deleted; Location is the character list"),
        (status = NO_CONTENT, description = "Enhanced request; HX-Redirect is the character list"),
        (status = NOT_FOUND, description = "No such character", body = ErrorBody),
    ),
    tag = CHARACTER_TAG,
)]
pub(crate) async fn delete_handler(
    State(state): State<ApiState>,
    enhanced: Enhanced,
    Path(id): Path<String>,
) -> Result<Outcome<()>, CharacterError> {
    characters(&state)?.delete(&id)?;
    Ok(enhanced.redirect(CHARACTERS_PATH))
}

#[api_handler(
    post,
    path = "/api/characters/{id}/copy",
    params(("id" = String, Path, description = "Character id")),
    responses(
        (status = SEE_OTHER, description = "Copied; Location is the new character"),
        (status = NO_CONTENT, description = "Enhanced request; HX-Redirect is the new character"),
        (status = NOT_FOUND, description = "No such character", body = ErrorBody),
    ),
    tag = CHARACTER_TAG,
)]
pub(crate) async fn copy_handler(
    State(state): State<ApiState>,
    enhanced: Enhanced,
    Path(id): Path<String>,
) -> Result<Outcome<()>, CharacterError> {
    let copy = characters(&state)?.copy(&id)?;
    Ok(enhanced.redirect(format!("{CHARACTERS_PATH}/{copy}")))
}
