use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Remix Battle Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::battle_stream,
        crate::routes::battles::create_battle,
        crate::routes::battles::get_battle,
        crate::routes::battles::select_remix,
        crate::routes::battles::advance_battle,
        crate::routes::queue::join_queue,
        crate::routes::queue::leave_queue,
        crate::routes::queue::queue_status,
        crate::routes::sounds::trending,
        crate::routes::sounds::create_sound,
        crate::routes::sounds::list_sounds,
        crate::routes::sounds::get_sound,
        crate::routes::players::get_player,
        crate::routes::players::update_taste,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::battle::CreateBattleRequest,
            crate::dto::battle::SelectRemixRequest,
            crate::dto::battle::AdvanceBattleRequest,
            crate::dto::battle::RemixSelectionView,
            crate::dto::battle::BattleView,
            crate::dto::battle::SelectRemixResponse,
            crate::dto::phase::VisibleBattleStatus,
            crate::dto::queue::MatchModeDto,
            crate::dto::queue::JoinQueueRequest,
            crate::dto::queue::LeaveQueueRequest,
            crate::dto::queue::MatchView,
            crate::dto::queue::JoinQueueResponse,
            crate::dto::queue::LeaveQueueResponse,
            crate::dto::queue::QueueStatusResponse,
            crate::dto::sound::CreateSoundRequest,
            crate::dto::sound::RemixInput,
            crate::dto::sound::RemixView,
            crate::dto::sound::SoundView,
            crate::dto::sound::TrendingSoundView,
            crate::dto::sound::TrendingResponse,
            crate::dto::player::UpdateTasteRequest,
            crate::dto::player::PlayerView,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::RemixSelectedEvent,
            crate::dto::sse::StateChangedEvent,
            crate::dto::sse::BattleCreatedEvent,
            crate::dto::sse::QueueMatchedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "battles", description = "Battle lifecycle"),
        (name = "queue", description = "Matchmaking queue"),
        (name = "sounds", description = "Sound catalog and trending"),
        (name = "players", description = "Player taste profiles"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/battles",
            "/battles/{id}/selections",
            "/queue/join",
            "/queue/{player_id}",
            "/sounds/trending",
            "/players/{id}/taste",
            "/sse/battles/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
