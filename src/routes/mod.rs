use axum::Router;

use crate::state::SharedState;

pub mod battles;
pub mod docs;
pub mod health;
pub mod players;
pub mod queue;
pub mod sounds;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(battles::router())
        .merge(queue::router())
        .merge(sounds::router())
        .merge(players::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
