use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::player::{PlayerView, UpdateTasteRequest},
    error::AppError,
    services::player_service,
    state::SharedState,
};

/// Player profile endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players/{id}", get(get_player))
        .route("/players/{id}/taste", put(update_taste))
}

/// Return a player and their taste profile.
#[utoipa::path(
    get,
    path = "/players/{id}",
    tag = "players",
    params(("id" = Uuid, Path, description = "Player identifier")),
    responses(
        (status = 200, description = "Player", body = PlayerView),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn get_player(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlayerView>, AppError> {
    Ok(Json(player_service::get_player(&state, id).await?))
}

/// Replace a player's taste profile.
#[utoipa::path(
    put,
    path = "/players/{id}/taste",
    tag = "players",
    params(("id" = Uuid, Path, description = "Player identifier")),
    request_body = UpdateTasteRequest,
    responses(
        (status = 200, description = "Updated player", body = PlayerView),
        (status = 400, description = "Invalid taste profile")
    )
)]
pub async fn update_taste(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<UpdateTasteRequest>>,
) -> Result<Json<PlayerView>, AppError> {
    Ok(Json(player_service::update_taste(&state, id, payload).await?))
}
