use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{RemixEntity, SoundEntity},
    dto::{format_system_time, validation::validate_trend_period},
    state::trending::TrendingEntry,
};

/// Default number of trending sounds returned.
pub const DEFAULT_TRENDING_LIMIT: usize = 10;

/// Register a sound with its generated remixes.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSoundRequest {
    #[validate(length(min = 1, max = 128))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 32))]
    pub genre: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub viral_score: f64,
    #[serde(default)]
    #[validate(nested)]
    pub remixes: Vec<RemixInput>,
}

/// A remix attached to a new sound.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RemixInput {
    #[validate(length(min = 1, max = 32))]
    pub genre: String,
    #[validate(url)]
    pub url: String,
}

/// Query string of `GET /sounds/trending`.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct TrendingQuery {
    /// Between 1 and 50, defaults to 10.
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
    /// `1h`, `24h` (default) or `7d`.
    #[validate(custom(function = "validate_trend_period"))]
    pub period: Option<String>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
/// Public projection of a remix.
pub struct RemixView {
    pub id: Uuid,
    pub genre: String,
    pub url: String,
    pub generated_at: String,
}

impl From<RemixEntity> for RemixView {
    fn from(value: RemixEntity) -> Self {
        Self {
            id: value.id,
            genre: value.genre,
            url: value.url,
            generated_at: format_system_time(value.generated_at),
        }
    }
}

/// Public projection of a sound.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct SoundView {
    pub id: Uuid,
    pub title: String,
    pub genre: Option<String>,
    pub use_count: u64,
    pub viral_score: f64,
    pub remixes: Vec<RemixView>,
    pub created_at: String,
}

impl From<SoundEntity> for SoundView {
    fn from(value: SoundEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            genre: value.genre,
            use_count: value.use_count,
            viral_score: value.viral_score,
            remixes: value.remixes.into_iter().map(RemixView::from).collect(),
            created_at: format_system_time(value.created_at),
        }
    }
}

/// One ranked trending sound.
#[derive(Debug, Serialize, ToSchema)]
pub struct TrendingSoundView {
    pub sound_id: Uuid,
    pub title: String,
    pub genre: Option<String>,
    pub viral_score: f64,
    pub recent_battle_count: u64,
    pub trending_score: f64,
}

impl From<TrendingEntry> for TrendingSoundView {
    fn from(value: TrendingEntry) -> Self {
        Self {
            sound_id: value.sound.id,
            title: value.sound.title,
            genre: value.sound.genre,
            viral_score: value.sound.viral_score,
            recent_battle_count: value.recent_battle_count,
            trending_score: value.trending_score,
        }
    }
}

/// Response of `GET /sounds/trending`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TrendingResponse {
    pub period: String,
    pub sounds: Vec<TrendingSoundView>,
}
