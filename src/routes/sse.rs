use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    services::sse_service,
    state::{SharedState, StreamFilter},
};

#[utoipa::path(
    get,
    path = "/sse/public",
    tag = "sse",
    responses((status = 200, description = "Every battle, queue and system event", content_type = "text/event-stream", body = String))
)]
/// Stream every realtime event.
pub async fn public_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = sse_service::subscribe_public(&state);
    info!("new public SSE connection");
    let greeting = sse_service::handshake(&state, StreamFilter::Public);
    sse_service::to_sse_stream(subscription, greeting)
}

#[utoipa::path(
    get,
    path = "/sse/battles/{id}",
    tag = "sse",
    params(("id" = Uuid, Path, description = "Battle identifier")),
    responses(
        (status = 200, description = "Events of one battle", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown battle")
    )
)]
/// Stream the events of one battle.
pub async fn battle_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = sse_service::subscribe_battle(&state, id).await?;
    info!(battle_id = %id, "new battle SSE connection");
    let greeting = sse_service::handshake(&state, StreamFilter::Battle(id));
    Ok(sse_service::to_sse_stream(subscription, greeting))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/public", get(public_stream))
        .route("/sse/battles/{id}", get(battle_stream))
}
