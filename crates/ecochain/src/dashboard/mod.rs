//! Filterable supplier overview: KPIs, insight lists, and improvement simulation.
//!
//! Everything here is computed from stored records as plain data; rendering is left to callers.

mod filters;
mod simulation;
mod summary;

use serde::Serialize;

use crate::suppliers::SupplierRecord;

pub use filters::{dashboard_rows, DashboardFilter, DashboardQuery, DashboardRow, FilterError};
pub use simulation::{
    simulate, AchievementTier, ImprovementPlan, SimulationError, SimulationResult,
    INVESTMENT_PER_POINT, MAX_IMPROVEMENT_PCT,
};
pub use summary::{insights, kpis, DashboardInsights, KpiSummary, SupplierHighlight};

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub kpis: KpiSummary,
    pub insights: DashboardInsights,
    pub suppliers: Vec<DashboardRow>,
}

/// Apply `filter` to the recommended records and summarize the selection.
pub fn build_dashboard(records: &[SupplierRecord], filter: &DashboardFilter) -> DashboardView {
    let all = dashboard_rows(records);
    let suppliers = filter.apply(&all);
    DashboardView {
        kpis: kpis(&suppliers, &all),
        insights: insights(&suppliers),
        suppliers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suppliers::{
        EcoScores, PipelineProgress, RecommendationLabel, SubScores, SupplierId, SupplierProfile,
    };

    fn record(
        sequence: u64,
        country: &str,
        risk_level: &str,
        overall: f64,
        label: Option<RecommendationLabel>,
    ) -> SupplierRecord {
        let profile = SupplierProfile {
            supplier_name: format!("Supplier {sequence}"),
            country: country.to_string(),
            region: "Africa".to_string(),
            product_category: "Textiles".to_string(),
            sub_category: format!("Line {}", sequence % 2),
            certification: "ISO 14001".to_string(),
            partnership_status: "Active".to_string(),
            annual_volume: 100_000 * sequence,
            cost_premium: 2.0 * sequence as f64,
            risk_level: risk_level.to_string(),
            last_audit: "2024-03-15".to_string(),
            audit_summary: "Clean audit".to_string(),
        };
        let scores = EcoScores {
            sub_scores: SubScores {
                carbon: overall,
                water: overall,
                waste: overall,
                social: overall,
            },
            overall,
        };
        let progress = match label {
            Some(label) => PipelineProgress::Recommended {
                embedding: vec![0.0; 2],
                scores,
                label,
            },
            None => PipelineProgress::Scored {
                embedding: vec![0.0; 2],
                scores,
            },
        };
        SupplierRecord {
            supplier_id: SupplierId::from_sequence(sequence),
            profile,
            image_urls: Vec::new(),
            progress,
        }
    }

    fn sample() -> Vec<SupplierRecord> {
        vec![
            record(1, "Kenya", "Low", 91.0, Some(RecommendationLabel::Preferred)),
            record(2, "Kenya", "High", 42.0, Some(RecommendationLabel::Avoid)),
            record(3, "Brazil", "Medium", 85.0, Some(RecommendationLabel::Preferred)),
            record(4, "Brazil", "High", 60.0, Some(RecommendationLabel::UnderReview)),
            record(5, "Chile", "Low", 99.0, None),
        ]
    }

    #[test]
    fn incomplete_records_never_reach_the_dashboard() {
        let view = build_dashboard(&sample(), &DashboardFilter::default());

        assert_eq!(view.kpis.total_suppliers, 4);
        assert!(view
            .suppliers
            .iter()
            .all(|row| row.supplier_id != SupplierId::from_sequence(5)));
        assert_eq!(view.kpis.supplier_delta, 0);
    }

    #[test]
    fn kpis_compare_selection_against_full_table() {
        let filter = DashboardFilter {
            countries: ["Kenya".to_string()].into_iter().collect(),
            ..DashboardFilter::default()
        };

        let view = build_dashboard(&sample(), &filter);

        assert_eq!(view.kpis.total_suppliers, 2);
        assert_eq!(view.kpis.supplier_delta, -2);
        assert!((view.kpis.preferred_share_pct - 50.0).abs() < 1e-9);
        assert!((view.kpis.average_score - 66.5).abs() < 1e-9);
        assert!((view.kpis.average_score_delta - (66.5 - 69.5)).abs() < 1e-9);
        assert_eq!(view.kpis.total_annual_volume, 300_000);
        assert!((view.kpis.average_cost_premium - 3.0).abs() < 1e-9);
    }

    #[test]
    fn min_score_is_inclusive() {
        let filter = DashboardFilter {
            min_score: Some(85.0),
            ..DashboardFilter::default()
        };

        let view = build_dashboard(&sample(), &filter);

        let ids: Vec<_> = view
            .suppliers
            .iter()
            .map(|row| row.supplier_id.as_str())
            .collect();
        assert_eq!(ids, vec!["SUP1", "SUP3"]);
    }

    #[test]
    fn insights_rank_preferred_and_collect_review_lists() {
        let view = build_dashboard(&sample(), &DashboardFilter::default());
        let insights = view.insights;

        let top: Vec<_> = insights
            .top_preferred
            .iter()
            .map(|item| item.supplier_id.as_str())
            .collect();
        assert_eq!(top, vec!["SUP1", "SUP3"]);
        assert_eq!(insights.needs_review.len(), 1);
        assert_eq!(insights.avoid[0].supplier_id.as_str(), "SUP2");
        assert_eq!(insights.country_count, 2);
        assert_eq!(insights.top_country.as_deref(), Some("Brazil"));
        assert_eq!(insights.category_count, 1);
        assert_eq!(insights.sub_category_count, 2);
        assert_eq!(insights.high_risk_count, 2);
        assert!(!insights.observations.is_empty());
    }

    #[test]
    fn empty_selection_yields_zeroed_summary() {
        let filter = DashboardFilter {
            countries: ["Atlantis".to_string()].into_iter().collect(),
            ..DashboardFilter::default()
        };

        let view = build_dashboard(&sample(), &filter);

        assert_eq!(view.kpis.total_suppliers, 0);
        assert_eq!(view.kpis.preferred_share_pct, 0.0);
        assert_eq!(view.kpis.average_score, 0.0);
        assert!(view.insights.top_country.is_none());
        assert!(view.insights.observations.is_empty());
    }

    #[test]
    fn simulation_caps_projections_and_reports_roi() {
        let rows = dashboard_rows(&sample());
        let row = rows
            .iter()
            .find(|row| row.supplier_id.as_str() == "SUP3")
            .expect("row present");

        let plan = ImprovementPlan {
            carbon: 20,
            water: 0,
            waste: 0,
            social: 0,
        };
        let result = simulate(row, &plan).expect("valid plan");

        assert_eq!(result.projected.carbon, 100.0);
        assert_eq!(result.projected.water, 85.0);
        assert!((result.projected_overall - 88.75).abs() < 1e-9);
        assert!((result.improvement - 3.75).abs() < 1e-9);
        assert_eq!(result.investment, 200_000);
        let roi = result.roi.expect("roi for positive improvement");
        assert!((roi - 3.75 * 300_000.0 / 200_000.0).abs() < 1e-9);
        assert_eq!(result.achievement, Some(AchievementTier::High));
    }

    #[test]
    fn simulation_without_improvement_skips_roi() {
        let rows = dashboard_rows(&sample());
        let plan = ImprovementPlan {
            carbon: 0,
            water: 0,
            waste: 0,
            social: 0,
        };

        let result = simulate(&rows[0], &plan).expect("valid plan");

        assert_eq!(result.improvement, 0.0);
        assert_eq!(result.investment, 0);
        assert!(result.roi.is_none());
        assert!(result.achievement.is_none());
    }

    #[test]
    fn simulation_rejects_out_of_range_percentages() {
        let rows = dashboard_rows(&sample());
        let plan = ImprovementPlan {
            water: 51,
            ..ImprovementPlan::default()
        };

        match simulate(&rows[0], &plan) {
            Err(SimulationError::OutOfRange { field, value }) => {
                assert_eq!(field, "water");
                assert_eq!(value, 51);
            }
            other => panic!("expected out of range error, got {other:?}"),
        }
    }
}
