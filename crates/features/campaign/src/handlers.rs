use crate::Campaigns;
use crate::error::CampaignError;
use crate::models::{AddEvents, AwardBatch, CreateCampaign, ValuesQuery};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use larp_derive::api_handler;
use larp_domain::constants::CAMPAIGN_TAG;
use larp_kernel::prelude::{ApiState, ErrorBody};
use larp_rules::{CampaignRecord, CampaignValues, PlayerRecord};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

/// Campaign routes under `/api/campaigns`.
pub fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new()
        .routes(routes!(list_handler))
        .routes(routes!(create_handler))
        .routes(routes!(events_handler))
        .routes(routes!(values_handler))
        .routes(routes!(player_handler))
        .routes(routes!(awards_handler))
}

fn campaigns(state: &ApiState) -> Result<&Campaigns, CampaignError> {
    state.try_get_slice::<Campaigns>().map_err(|e| CampaignError::from(e.to_string()))
}

#[api_handler(
    get,
    path = "/api/campaigns",
    responses((status = OK, description = "Campaign names", body = Vec<String>)),
    tag = CAMPAIGN_TAG,
)]
pub(crate) async fn list_handler(State(state): State<ApiState>) -> Result<Json<Vec<String>>, CampaignError> {
    Ok(Json(campaigns(&state)?.names()))
}

#[api_handler(
    put,
    path = "/api/campaigns/{name}",
    params(("name" = String, Path, description = "Campaign name")),
    request_body = CreateCampaign,
    responses(
        (status = CREATED, description = "Campaign created"),
        (status = BAD_REQUEST, description = "Invalid name", body = ErrorBody),
        (status = CONFLICT, description = "Name taken", body = ErrorBody),
    ),
    tag = CAMPAIGN_TAG,
)]
pub(crate) async fn create_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(request): Json<CreateCampaign>,
) -> Result<(StatusCode, Json<CampaignRecord>), CampaignError> {
    let record = campaigns(&state)?.create(&name, request)?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[api_handler(
    post,
    path = "/api/campaigns/{name}/events",
    params(("name" = String, Path, description = "Campaign name")),
    request_body = AddEvents,
    responses(
        (status = OK, description = "Campaign with its rebuilt value table"),
        (status = NOT_FOUND, description = "No such campaign", body = ErrorBody),
    ),
    tag = CAMPAIGN_TAG,
)]
pub(crate) async fn events_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(request): Json<AddEvents>,
) -> Result<Json<CampaignRecord>, CampaignError> {
    Ok(Json(campaigns(&state)?.add_events(&name, request)?))
}

#[api_handler(
    get,
    path = "/api/campaigns/{name}/values",
    params(("name" = String, Path, description = "Campaign name"), ValuesQuery),
    responses(
        (status = OK, description = "Maxima in effect on the date"),
        (status = NOT_FOUND, description = "No such campaign", body = ErrorBody),
    ),
    tag = CAMPAIGN_TAG,
)]
pub(crate) async fn values_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<ValuesQuery>,
) -> Result<Json<CampaignValues>, CampaignError> {
    Ok(Json(campaigns(&state)?.values(&name, query)?))
}

#[api_handler(
    get,
    path = "/api/campaigns/{name}/players/{user}",
    params(
        ("name" = String, Path, description = "Campaign name"),
        ("user" = String, Path, description = "Player id"),
    ),
    responses(
        (status = OK, description = "The player's award ledger"),
        (status = NOT_FOUND, description = "No such campaign or player", body = ErrorBody),
    ),
    tag = CAMPAIGN_TAG,
)]
pub(crate) async fn player_handler(
    State(state): State<ApiState>,
    Path((name, user)): Path<(String, String)>,
) -> Result<Json<PlayerRecord>, CampaignError> {
    Ok(Json(campaigns(&state)?.player(&name, &user)?))
}

#[api_handler(
    post,
    path = "/api/campaigns/{name}/players/{user}/awards",
    params(
        ("name" = String, Path, description = "Campaign name"),
        ("user" = String, Path, description = "Player id"),
    ),
    request_body = AwardBatch,
    responses(
        (status = OK, description = "The updated ledger"),
        (status = BAD_REQUEST, description = "An award needs a character", body = ErrorBody),
        (status = CONFLICT, description = "The ledger failed validation", body = ErrorBody),
    ),
    tag = CAMPAIGN_TAG,
)]
pub(crate) async fn awards_handler(
    State(state): State<ApiState>,
    Path((name, user)): Path<(String, String)>,
    Json(request): Json<AwardBatch>,
) -> Result<Json<PlayerRecord>, CampaignError> {
    Ok(Json(campaigns(&state)?.award(&name, &user, request)?))
}
