use std::collections::BTreeMap;

/// Genre weights describing what a player likes.
pub type TasteProfile = BTreeMap<String, f64>;

/// Score returned when either profile carries no signal.
pub const NEUTRAL_SIMILARITY: f64 = 0.5;

/// Pluggable taste comparison used by matchmaking.
pub trait SimilarityScorer: Send + Sync {
    /// Agreement between two profiles. Callers clamp the result into `[0, 1]`.
    fn similarity(&self, a: &TasteProfile, b: &TasteProfile) -> f64;
}

/// Cosine similarity over genre weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineSimilarity;

impl SimilarityScorer for CosineSimilarity {
    fn similarity(&self, a: &TasteProfile, b: &TasteProfile) -> f64 {
        let norm = |profile: &TasteProfile| profile.values().map(|w| w * w).sum::<f64>().sqrt();
        let (norm_a, norm_b) = (norm(a), norm(b));
        if norm_a == 0.0 || norm_b == 0.0 {
            return NEUTRAL_SIMILARITY;
        }

        let dot: f64 = a
            .iter()
            .filter_map(|(genre, weight)| b.get(genre).map(|other| weight * other))
            .sum();
        dot / (norm_a * norm_b)
    }
}

/// Clamp a raw scorer output into `[0, 1]`; NaN is treated as neutral.
pub fn clamp_similarity(value: f64) -> f64 {
    if value.is_nan() {
        NEUTRAL_SIMILARITY
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(entries: &[(&str, f64)]) -> TasteProfile {
        entries
            .iter()
            .map(|(genre, weight)| (genre.to_string(), *weight))
            .collect()
    }

    #[test]
    fn identical_profiles_score_one() {
        let a = profile(&[("house", 0.8), ("jazz", 0.2)]);
        let score = CosineSimilarity.similarity(&a, &a);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_profiles_score_zero() {
        let a = profile(&[("house", 1.0)]);
        let b = profile(&[("metal", 1.0)]);
        assert_eq!(CosineSimilarity.similarity(&a, &b), 0.0);
    }

    #[test]
    fn empty_profile_is_neutral() {
        let a = profile(&[("house", 1.0)]);
        assert_eq!(
            CosineSimilarity.similarity(&a, &TasteProfile::new()),
            NEUTRAL_SIMILARITY
        );
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        assert_eq!(clamp_similarity(1.4), 1.0);
        assert_eq!(clamp_similarity(-0.2), 0.0);
        assert_eq!(clamp_similarity(f64::NAN), NEUTRAL_SIMILARITY);
    }
}
