/// Battle creation, remix selection and phase advancement.
pub mod battle_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Queue joins, leaves and atomic pairing.
pub mod matchmaking_service;
/// Player bookkeeping and taste profiles.
pub mod player_service;
/// Sound catalog management.
pub mod sound_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
/// Trending sound ranking.
pub mod trending_service;
