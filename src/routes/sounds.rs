use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::sound::{CreateSoundRequest, SoundView, TrendingQuery, TrendingResponse},
    error::AppError,
    services::{sound_service, trending_service},
    state::SharedState,
};

/// Sound catalog endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sounds", get(list_sounds).post(create_sound))
        .route("/sounds/trending", get(trending))
        .route("/sounds/{id}", get(get_sound))
}

/// Sounds ranked by battles created in the requested window.
#[utoipa::path(
    get,
    path = "/sounds/trending",
    tag = "sounds",
    params(TrendingQuery),
    responses(
        (status = 200, description = "Trending sounds", body = TrendingResponse),
        (status = 400, description = "Invalid limit or period")
    )
)]
pub async fn trending(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<TrendingQuery>>,
) -> Result<Json<TrendingResponse>, AppError> {
    Ok(Json(trending_service::trending(&state, query).await?))
}

/// Register a sound with its remixes.
#[utoipa::path(
    post,
    path = "/sounds",
    tag = "sounds",
    request_body = CreateSoundRequest,
    responses(
        (status = 200, description = "Sound registered", body = SoundView),
        (status = 400, description = "Invalid request")
    )
)]
pub async fn create_sound(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateSoundRequest>>,
) -> Result<Json<SoundView>, AppError> {
    Ok(Json(sound_service::create_sound(&state, payload).await?))
}

/// List the catalog, newest first.
#[utoipa::path(
    get,
    path = "/sounds",
    tag = "sounds",
    responses((status = 200, description = "All sounds", body = [SoundView]))
)]
pub async fn list_sounds(State(state): State<SharedState>) -> Result<Json<Vec<SoundView>>, AppError> {
    Ok(Json(sound_service::list_sounds(&state).await?))
}

/// Return one sound.
#[utoipa::path(
    get,
    path = "/sounds/{id}",
    tag = "sounds",
    params(("id" = Uuid, Path, description = "Sound identifier")),
    responses(
        (status = 200, description = "Sound", body = SoundView),
        (status = 404, description = "Unknown sound")
    )
)]
pub async fn get_sound(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SoundView>, AppError> {
    Ok(Json(sound_service::get_sound(&state, id).await?))
}
