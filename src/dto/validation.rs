//! Validation helpers for DTOs.

use std::collections::BTreeMap;

use validator::ValidationError;

use crate::state::trending::TrendPeriod;

/// Upper bound on genres carried by a taste profile.
pub const MAX_TASTE_GENRES: usize = 64;
/// Upper bound on a genre name.
pub const MAX_GENRE_LEN: usize = 32;

/// Validates a taste profile: at most [`MAX_TASTE_GENRES`] non-empty genre names,
/// each weight finite and non-negative.
///
/// # Examples
///
/// ```ignore
/// validate_taste_profile(&[("house".into(), 0.8)].into()) // Ok
/// validate_taste_profile(&[("house".into(), -1.0)].into()) // Err - negative weight
/// ```
pub fn validate_taste_profile(profile: &BTreeMap<String, f64>) -> Result<(), ValidationError> {
    if profile.len() > MAX_TASTE_GENRES {
        let mut err = ValidationError::new("taste_profile_size");
        err.message = Some(
            format!(
                "Taste profile accepts at most {MAX_TASTE_GENRES} genres (got {})",
                profile.len()
            )
            .into(),
        );
        return Err(err);
    }

    for (genre, weight) in profile {
        if genre.trim().is_empty() || genre.len() > MAX_GENRE_LEN {
            let mut err = ValidationError::new("taste_profile_genre");
            err.message = Some(
                format!("Genre names must be 1 to {MAX_GENRE_LEN} characters (got `{genre}`)")
                    .into(),
            );
            return Err(err);
        }
        if !weight.is_finite() || *weight < 0.0 {
            let mut err = ValidationError::new("taste_profile_weight");
            err.message =
                Some(format!("Weight for `{genre}` must be finite and non-negative").into());
            return Err(err);
        }
    }

    Ok(())
}

/// Validates a trending period string (`1h`, `24h` or `7d`).
pub fn validate_trend_period(period: &str) -> Result<(), ValidationError> {
    period.parse::<TrendPeriod>().map(|_| ()).map_err(|err| {
        let mut validation = ValidationError::new("trend_period");
        validation.message = Some(err.to_string().into());
        validation
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries
            .iter()
            .map(|(genre, weight)| (genre.to_string(), *weight))
            .collect()
    }

    #[test]
    fn test_validate_taste_profile_valid() {
        assert!(validate_taste_profile(&profile(&[("house", 0.8), ("jazz", 0.0)])).is_ok());
        assert!(validate_taste_profile(&BTreeMap::new()).is_ok());
    }

    #[test]
    fn test_validate_taste_profile_invalid_weight() {
        assert!(validate_taste_profile(&profile(&[("house", -0.1)])).is_err());
        assert!(validate_taste_profile(&profile(&[("house", f64::NAN)])).is_err());
        assert!(validate_taste_profile(&profile(&[("house", f64::INFINITY)])).is_err());
    }

    #[test]
    fn test_validate_taste_profile_invalid_genre() {
        assert!(validate_taste_profile(&profile(&[("", 1.0)])).is_err());
        let long = "x".repeat(MAX_GENRE_LEN + 1);
        assert!(validate_taste_profile(&profile(&[(long.as_str(), 1.0)])).is_err());

        let crowded: BTreeMap<String, f64> = (0..=MAX_TASTE_GENRES)
            .map(|index| (format!("g{index}"), 1.0))
            .collect();
        assert!(validate_taste_profile(&crowded).is_err());
    }

    #[test]
    fn test_validate_trend_period() {
        assert!(validate_trend_period("1h").is_ok());
        assert!(validate_trend_period("24h").is_ok());
        assert!(validate_trend_period("30d").is_err());
    }
}
