use std::{collections::HashMap, fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::SoundEntity;

/// Look-back window for trending sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrendPeriod {
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "24h")]
    #[default]
    Day,
    #[serde(rename = "7d")]
    Week,
}

/// Period string outside `1h`, `24h` and `7d`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown trending period `{0}` (expected 1h, 24h or 7d)")]
pub struct UnknownPeriod(pub String);

impl TrendPeriod {
    /// Length of the window.
    pub fn duration(self) -> Duration {
        match self {
            TrendPeriod::Hour => Duration::from_secs(60 * 60),
            TrendPeriod::Day => Duration::from_secs(24 * 60 * 60),
            TrendPeriod::Week => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    /// Wire form, as accepted by `FromStr`.
    pub fn as_str(self) -> &'static str {
        match self {
            TrendPeriod::Hour => "1h",
            TrendPeriod::Day => "24h",
            TrendPeriod::Week => "7d",
        }
    }
}

impl FromStr for TrendPeriod {
    type Err = UnknownPeriod;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "1h" => Ok(TrendPeriod::Hour),
            "24h" => Ok(TrendPeriod::Day),
            "7d" => Ok(TrendPeriod::Week),
            other => Err(UnknownPeriod(other.to_string())),
        }
    }
}

impl fmt::Display for TrendPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sound ranked by recent activity.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendingEntry {
    /// Ranked sound.
    pub sound: SoundEntity,
    /// Battles on the sound inside the window.
    pub recent_battle_count: u64,
    /// Ranking key.
    pub trending_score: f64,
}

/// `recent_battle_count * (viral_score / 100 + 1)`.
pub fn trending_score(recent_battle_count: u64, viral_score: f64) -> f64 {
    recent_battle_count as f64 * (viral_score / 100.0 + 1.0)
}

/// Rank sounds that had at least one battle in the window.
///
/// `recent_battles` yields the sound id of every battle created in the window.
/// Highest score first, ties by sound id ascending.
pub fn rank_trending<I>(
    sounds: Vec<SoundEntity>,
    recent_battles: I,
    limit: usize,
) -> Vec<TrendingEntry>
where
    I: IntoIterator<Item = Uuid>,
{
    let mut counts: HashMap<Uuid, u64> = HashMap::new();
    for sound_id in recent_battles {
        *counts.entry(sound_id).or_default() += 1;
    }

    let mut candidates: Vec<SoundEntity> = sounds
        .into_iter()
        .filter(|sound| counts.contains_key(&sound.id))
        .collect();
    // Popularity order first; the final ranking is recomputed below.
    candidates.sort_by(|a, b| b.viral_score.total_cmp(&a.viral_score));

    let mut ranked: Vec<TrendingEntry> = candidates
        .into_iter()
        .map(|sound| {
            let recent_battle_count = counts.get(&sound.id).copied().unwrap_or_default();
            TrendingEntry {
                trending_score: trending_score(recent_battle_count, sound.viral_score),
                recent_battle_count,
                sound,
            }
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.trending_score
            .total_cmp(&a.trending_score)
            .then_with(|| a.sound.id.cmp(&b.sound.id))
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn sound(viral_score: f64) -> SoundEntity {
        SoundEntity {
            id: Uuid::new_v4(),
            title: "loop".into(),
            genre: None,
            use_count: 0,
            viral_score,
            remixes: Vec::new(),
            created_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn recent_volume_outranks_viral_score() {
        let a = sound(80.0);
        let b = sound(50.0);
        let quiet = sound(100.0);
        let battles = std::iter::repeat_n(a.id, 3).chain(std::iter::repeat_n(b.id, 5));

        let ranked = rank_trending(vec![a.clone(), b.clone(), quiet], battles, 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].sound.id, b.id);
        assert!((ranked[0].trending_score - 7.5).abs() < 1e-9);
        assert_eq!(ranked[1].sound.id, a.id);
        assert!((ranked[1].trending_score - 5.4).abs() < 1e-9);
        assert_eq!(ranked[1].recent_battle_count, 3);

        let top = rank_trending(
            vec![a.clone(), b.clone()],
            std::iter::repeat_n(a.id, 3).chain(std::iter::repeat_n(b.id, 5)),
            1,
        );
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].sound.id, b.id);
    }

    #[test]
    fn equal_scores_sort_by_id() {
        let a = sound(20.0);
        let b = sound(20.0);
        let ranked = rank_trending(vec![a.clone(), b.clone()], [a.id, b.id], 10);
        let expected = a.id.min(b.id);
        assert_eq!(ranked[0].sound.id, expected);
    }

    #[test]
    fn period_parsing() {
        assert_eq!("1h".parse::<TrendPeriod>(), Ok(TrendPeriod::Hour));
        assert_eq!("7d".parse::<TrendPeriod>(), Ok(TrendPeriod::Week));
        assert!("2w".parse::<TrendPeriod>().is_err());
        assert_eq!(TrendPeriod::default().to_string(), "24h");
    }
}
