//! Application-level configuration loading: phase plan, match thresholds and SSE sizing.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use thiserror::Error;
use tracing::{info, warn};

use crate::state::{
    lifecycle::{BattleStatus, PhasePlan, PhasePlanError, TimedPhase},
    matchmaking::MatchThresholds,
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "REMIX_BATTLE_BACK_CONFIG_PATH";
const DEFAULT_SSE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Timed phases following remix selection.
    pub phase_plan: PhasePlan,
    /// Cut-offs for the `similar` and `opposite` strict pools.
    pub match_thresholds: MatchThresholds,
    /// Buffer size of the SSE broadcast channel.
    pub sse_capacity: usize,
}

/// Reasons a configuration document is rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid phase plan: {0}")]
    PhasePlan(#[from] PhasePlanError),
    #[error("match thresholds must satisfy 0 <= opposite <= similar <= 1 (got {opposite}, {similar})")]
    Thresholds { similar: f64, opposite: f64 },
    #[error("sse_capacity must be greater than zero")]
    SseCapacity,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        phases = app_config.phase_plan.phases().len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse and validate a JSON configuration document. Missing sections keep their defaults.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let raw = serde_json::from_str::<RawConfig>(contents)?;
        raw.try_into()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            phase_plan: PhasePlan::default(),
            match_thresholds: MatchThresholds::default(),
            sse_capacity: DEFAULT_SSE_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    phase_plan: Option<Vec<RawPhase>>,
    #[serde(default)]
    match_thresholds: Option<RawThresholds>,
    #[serde(default)]
    sse_capacity: Option<usize>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
/// One timed phase, e.g. `{ "status": "PLAYING_P1", "duration_secs": 60 }`.
struct RawPhase {
    status: BattleStatus,
    #[serde_as(as = "DurationSeconds<u64>")]
    duration_secs: Duration,
}

#[derive(Debug, Deserialize)]
struct RawThresholds {
    similar: f64,
    opposite: f64,
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = ConfigError;

    fn try_from(value: RawConfig) -> Result<Self, Self::Error> {
        let defaults = Self::default();

        let phase_plan = match value.phase_plan {
            Some(phases) => PhasePlan::new(
                phases
                    .into_iter()
                    .map(|phase| TimedPhase {
                        status: phase.status,
                        duration: phase.duration_secs,
                    })
                    .collect(),
            )?,
            None => defaults.phase_plan,
        };

        let match_thresholds = match value.match_thresholds {
            Some(RawThresholds { similar, opposite }) => {
                let in_range = (0.0..=1.0).contains(&opposite)
                    && (0.0..=1.0).contains(&similar)
                    && opposite <= similar;
                if !in_range {
                    return Err(ConfigError::Thresholds { similar, opposite });
                }
                MatchThresholds { similar, opposite }
            }
            None => defaults.match_thresholds,
        };

        let sse_capacity = match value.sse_capacity {
            Some(0) => return Err(ConfigError::SseCapacity),
            Some(capacity) => capacity,
            None => defaults.sse_capacity,
        };

        Ok(Self {
            phase_plan,
            match_thresholds,
            sse_capacity,
        })
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.phase_plan, PhasePlan::default());
        assert_eq!(config.match_thresholds, MatchThresholds::default());
        assert_eq!(config.sse_capacity, DEFAULT_SSE_CAPACITY);
    }

    #[test]
    fn custom_phase_plan_is_parsed() {
        let config = AppConfig::from_json(
            r#"{
                "phase_plan": [
                    { "status": "PLAYING_P1", "duration_secs": 45 },
                    { "status": "VOTING", "duration_secs": 15 }
                ],
                "match_thresholds": { "similar": 0.8, "opposite": 0.2 }
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.phase_plan.duration_of(BattleStatus::PlayingP1),
            Some(Duration::from_secs(45))
        );
        assert_eq!(config.phase_plan.duration_of(BattleStatus::PlayingP2), None);
        assert_eq!(config.match_thresholds.similar, 0.8);
    }

    #[test]
    fn invalid_documents_are_rejected() {
        let bad_plan = r#"{ "phase_plan": [{ "status": "VOTING", "duration_secs": 1 }] }"#;
        assert!(matches!(
            AppConfig::from_json(bad_plan),
            Err(ConfigError::PhasePlan(_))
        ));

        let bad_thresholds = r#"{ "match_thresholds": { "similar": 0.2, "opposite": 0.6 } }"#;
        assert!(matches!(
            AppConfig::from_json(bad_thresholds),
            Err(ConfigError::Thresholds { .. })
        ));

        assert!(matches!(
            AppConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
