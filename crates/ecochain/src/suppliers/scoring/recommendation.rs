use serde::{Deserialize, Serialize};

use super::super::domain::RecommendationLabel;

/// Preferred above this overall score (exclusive).
pub const PREFERRED_ABOVE: f64 = 80.0;
/// Neutral from this overall score (inclusive) up to [`PREFERRED_ABOVE`].
pub const NEUTRAL_FROM: f64 = 50.0;

/// Category derived from an overall eco score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    Preferred,
    Neutral,
    Avoid,
}

impl Recommendation {
    /// `> 80` Preferred, `50..=80` Neutral, otherwise Avoid. NaN lands in Avoid.
    pub fn derive(overall_score: f64) -> Self {
        if overall_score > PREFERRED_ABOVE {
            Self::Preferred
        } else if overall_score >= NEUTRAL_FROM {
            Self::Neutral
        } else {
            Self::Avoid
        }
    }

    pub const fn label(self) -> &'static str {
        RecommendationLabel::from_recommendation(self).label()
    }
}

impl RecommendationLabel {
    pub const fn from_recommendation(recommendation: Recommendation) -> Self {
        match recommendation {
            Recommendation::Preferred => Self::Preferred,
            Recommendation::Neutral => Self::Neutral,
            Recommendation::Avoid => Self::Avoid,
        }
    }
}

impl From<Recommendation> for RecommendationLabel {
    fn from(value: Recommendation) -> Self {
        Self::from_recommendation(value)
    }
}
