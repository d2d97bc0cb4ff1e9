use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::battle::{
        AdvanceBattleRequest, BattleView, CreateBattleRequest, SelectRemixRequest,
        SelectRemixResponse,
    },
    error::AppError,
    services::battle_service,
    state::SharedState,
};

/// Battle creation and lifecycle endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/battles", post(create_battle))
        .route("/battles/{id}", get(get_battle))
        .route("/battles/{id}/selections", post(select_remix))
        .route("/battles/{id}/advance", post(advance_battle))
}

/// Create a battle between two players on a sound.
#[utoipa::path(
    post,
    path = "/battles",
    tag = "battles",
    request_body = CreateBattleRequest,
    responses(
        (status = 200, description = "Battle created in the selection phase", body = BattleView),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Unknown sound"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_battle(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateBattleRequest>>,
) -> Result<Json<BattleView>, AppError> {
    Ok(Json(battle_service::create_battle(&state, payload).await?))
}

/// Read a battle, settling any deadline that already passed.
#[utoipa::path(
    get,
    path = "/battles/{id}",
    tag = "battles",
    params(("id" = Uuid, Path, description = "Battle identifier")),
    responses(
        (status = 200, description = "Current battle state", body = BattleView),
        (status = 404, description = "Unknown battle")
    )
)]
pub async fn get_battle(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BattleView>, AppError> {
    Ok(Json(battle_service::get_battle(&state, id).await?))
}

/// Record or replace a participant's remix pick.
#[utoipa::path(
    post,
    path = "/battles/{id}/selections",
    tag = "battles",
    params(("id" = Uuid, Path, description = "Battle identifier")),
    request_body = SelectRemixRequest,
    responses(
        (status = 200, description = "Selection recorded", body = SelectRemixResponse),
        (status = 403, description = "Player is not a participant"),
        (status = 404, description = "Unknown battle or remix"),
        (status = 409, description = "Battle is past the selection phase")
    )
)]
pub async fn select_remix(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<SelectRemixRequest>>,
) -> Result<Json<SelectRemixResponse>, AppError> {
    Ok(Json(battle_service::select_remix(&state, id, payload).await?))
}

/// End the current timed phase early.
#[utoipa::path(
    post,
    path = "/battles/{id}/advance",
    tag = "battles",
    params(("id" = Uuid, Path, description = "Battle identifier")),
    request_body = AdvanceBattleRequest,
    responses(
        (status = 200, description = "Battle after the transition", body = BattleView),
        (status = 403, description = "Player is not a participant"),
        (status = 409, description = "Battle is still selecting remixes")
    )
)]
pub async fn advance_battle(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<AdvanceBattleRequest>>,
) -> Result<Json<BattleView>, AppError> {
    Ok(Json(battle_service::advance_battle(&state, id, payload).await?))
}
