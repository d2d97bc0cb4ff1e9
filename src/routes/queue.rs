use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::queue::{
        JoinQueueRequest, JoinQueueResponse, LeaveQueueRequest, LeaveQueueResponse,
        QueueStatusResponse,
    },
    error::AppError,
    services::matchmaking_service,
    state::SharedState,
};

/// Matchmaking queue endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/queue/join", post(join_queue))
        .route("/queue/leave", post(leave_queue))
        .route("/queue/{player_id}", get(queue_status))
}

/// Join the queue, or update the mode of an existing entry.
#[utoipa::path(
    post,
    path = "/queue/join",
    tag = "queue",
    request_body = JoinQueueRequest,
    responses(
        (status = 200, description = "Queued, possibly matched right away", body = JoinQueueResponse),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn join_queue(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<JoinQueueRequest>>,
) -> Result<Json<JoinQueueResponse>, AppError> {
    Ok(Json(matchmaking_service::join_queue(&state, payload).await?))
}

/// Leave the queue.
#[utoipa::path(
    post,
    path = "/queue/leave",
    tag = "queue",
    request_body = LeaveQueueRequest,
    responses((status = 200, description = "Whether an entry was removed", body = LeaveQueueResponse))
)]
pub async fn leave_queue(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<LeaveQueueRequest>>,
) -> Json<LeaveQueueResponse> {
    Json(matchmaking_service::leave_queue(&state, payload).await)
}

/// Poll queue membership and any match made since the last join.
#[utoipa::path(
    get,
    path = "/queue/{player_id}",
    tag = "queue",
    params(("player_id" = Uuid, Path, description = "Player identifier")),
    responses((status = 200, description = "Queue status", body = QueueStatusResponse))
)]
pub async fn queue_status(
    State(state): State<SharedState>,
    Path(player_id): Path<Uuid>,
) -> Result<Json<QueueStatusResponse>, AppError> {
    Ok(Json(
        matchmaking_service::queue_status(&state, player_id).await?,
    ))
}
