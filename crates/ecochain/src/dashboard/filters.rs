use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::suppliers::{EcoScores, RecommendationLabel, SupplierId, SupplierRecord};

/// Supplier as shown on the dashboard. Only records carrying both scores and a label qualify.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRow {
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub country: String,
    pub region: String,
    pub product_category: String,
    pub sub_category: String,
    pub risk_level: String,
    pub annual_volume: u64,
    pub cost_premium: f64,
    pub scores: EcoScores,
    pub recommendation: RecommendationLabel,
}

impl DashboardRow {
    pub fn from_record(record: &SupplierRecord) -> Option<Self> {
        let scores = *record.scores()?;
        let recommendation = record.label()?;
        let profile = &record.profile;
        Some(Self {
            supplier_id: record.supplier_id.clone(),
            supplier_name: profile.supplier_name.clone(),
            country: profile.country.clone(),
            region: profile.region.clone(),
            product_category: profile.product_category.clone(),
            sub_category: profile.sub_category.clone(),
            risk_level: profile.risk_level.clone(),
            annual_volume: profile.annual_volume,
            cost_premium: profile.cost_premium,
            scores,
            recommendation,
        })
    }

    pub fn overall_score(&self) -> f64 {
        self.scores.overall
    }
}

/// Rows for every fully recommended record, in store order.
pub fn dashboard_rows(records: &[SupplierRecord]) -> Vec<DashboardRow> {
    records.iter().filter_map(DashboardRow::from_record).collect()
}

/// Dashboard selection. An empty set leaves that dimension unfiltered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardFilter {
    pub countries: BTreeSet<String>,
    pub regions: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub recommendations: BTreeSet<RecommendationLabel>,
    pub risk_levels: BTreeSet<String>,
    pub min_score: Option<f64>,
}

impl DashboardFilter {
    pub fn matches(&self, row: &DashboardRow) -> bool {
        admits(&self.countries, &row.country)
            && admits(&self.regions, &row.region)
            && admits(&self.categories, &row.product_category)
            && (self.recommendations.is_empty()
                || self.recommendations.contains(&row.recommendation))
            && admits(&self.risk_levels, &row.risk_level)
            && self
                .min_score
                .map_or(true, |min_score| row.overall_score() >= min_score)
    }

    pub fn apply(&self, rows: &[DashboardRow]) -> Vec<DashboardRow> {
        rows.iter().filter(|row| self.matches(row)).cloned().collect()
    }
}

fn admits(selected: &BTreeSet<String>, value: &str) -> bool {
    selected.is_empty() || selected.contains(value)
}

/// Query-string form of [`DashboardFilter`]; list fields are comma separated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    pub countries: Option<String>,
    pub regions: Option<String>,
    pub categories: Option<String>,
    pub recommendations: Option<String>,
    pub risk_levels: Option<String>,
    pub min_score: Option<f64>,
}

impl DashboardQuery {
    pub fn into_filter(self) -> Result<DashboardFilter, FilterError> {
        let recommendations = split_list(self.recommendations.as_deref())
            .into_iter()
            .map(|raw| {
                RecommendationLabel::parse(&raw).ok_or(FilterError::UnknownRecommendation(raw))
            })
            .collect::<Result<BTreeSet<_>, FilterError>>()?;

        if let Some(min_score) = self.min_score {
            if !min_score.is_finite() {
                return Err(FilterError::InvalidMinScore);
            }
        }

        Ok(DashboardFilter {
            countries: split_list(self.countries.as_deref()),
            regions: split_list(self.regions.as_deref()),
            categories: split_list(self.categories.as_deref()),
            recommendations,
            risk_levels: split_list(self.risk_levels.as_deref()),
            min_score: self.min_score,
        })
    }
}

fn split_list(raw: Option<&str>) -> BTreeSet<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("unknown recommendation '{0}'")]
    UnknownRecommendation(String),
    #[error("min_score must be a finite number")]
    InvalidMinScore,
}
