use serde::{Deserialize, Serialize};

use super::filters::DashboardRow;
use crate::suppliers::{EcoScores, SubScores, SupplierId};

pub const MAX_IMPROVEMENT_PCT: u32 = 50;
pub const INVESTMENT_PER_POINT: u64 = 10_000;
const SCORE_CEILING: f64 = 100.0;
const DEFAULT_IMPROVEMENT_PCT: u32 = 10;

/// Per sub-score improvement percentages, each in `0..=50`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImprovementPlan {
    pub carbon: u32,
    pub water: u32,
    pub waste: u32,
    pub social: u32,
}

impl Default for ImprovementPlan {
    fn default() -> Self {
        Self {
            carbon: DEFAULT_IMPROVEMENT_PCT,
            water: DEFAULT_IMPROVEMENT_PCT,
            waste: DEFAULT_IMPROVEMENT_PCT,
            social: DEFAULT_IMPROVEMENT_PCT,
        }
    }
}

impl ImprovementPlan {
    fn validate(&self) -> Result<(), SimulationError> {
        for (field, value) in [
            ("carbon", self.carbon),
            ("water", self.water),
            ("waste", self.waste),
            ("social", self.social),
        ] {
            if value > MAX_IMPROVEMENT_PCT {
                return Err(SimulationError::OutOfRange { field, value });
            }
        }
        Ok(())
    }

    pub fn total_points(&self) -> u32 {
        self.carbon + self.water + self.waste + self.social
    }

    pub fn investment(&self) -> u64 {
        u64::from(self.total_points()) * INVESTMENT_PER_POINT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementTier {
    TopTier,
    High,
}

impl AchievementTier {
    fn for_score(score: f64) -> Option<Self> {
        if score >= 90.0 {
            Some(Self::TopTier)
        } else if score >= 80.0 {
            Some(Self::High)
        } else {
            None
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::TopTier => "Top-tier sustainability rating",
            Self::High => "High sustainability performance",
        }
    }
}

/// Projected effect of an improvement plan on one supplier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub supplier_id: SupplierId,
    pub current: EcoScores,
    pub projected: SubScores,
    pub projected_overall: f64,
    pub improvement: f64,
    pub investment: u64,
    /// Only reported for a positive improvement on a non-zero investment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievement: Option<AchievementTier>,
}

/// Project each sub-score forward, capped at 100, and average them into a new overall score.
pub fn simulate(
    row: &DashboardRow,
    plan: &ImprovementPlan,
) -> Result<SimulationResult, SimulationError> {
    plan.validate()?;

    let base = row.scores.sub_scores;
    let projected = SubScores {
        carbon: project(base.carbon, plan.carbon),
        water: project(base.water, plan.water),
        waste: project(base.waste, plan.waste),
        social: project(base.social, plan.social),
    };
    let projected_overall = projected.to_array().iter().sum::<f64>() / SubScores::COUNT as f64;
    let improvement = projected_overall - row.overall_score();
    let investment = plan.investment();

    let improved = improvement > 0.0;
    let roi = (improved && investment > 0)
        .then(|| improvement * row.annual_volume as f64 / investment as f64);
    let achievement = if improved {
        AchievementTier::for_score(projected_overall)
    } else {
        None
    };

    Ok(SimulationResult {
        supplier_id: row.supplier_id.clone(),
        current: row.scores,
        projected,
        projected_overall,
        improvement,
        investment,
        roi,
        achievement,
    })
}

fn project(base: f64, pct: u32) -> f64 {
    (base * (1.0 + f64::from(pct) / 100.0)).min(SCORE_CEILING)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("{field} improvement of {value}% exceeds the 50% limit")]
    OutOfRange { field: &'static str, value: u32 },
}
