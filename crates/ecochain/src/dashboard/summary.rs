use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::filters::DashboardRow;
use crate::suppliers::{RecommendationLabel, SupplierId};

const HIGHLIGHT_LIMIT: usize = 3;
const HIGH_RISK: &str = "High";

/// Headline numbers for the filtered selection, with deltas against the full table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub total_suppliers: usize,
    /// Filtered count minus unfiltered count; zero or negative.
    pub supplier_delta: i64,
    pub preferred_share_pct: f64,
    pub average_score: f64,
    pub average_score_delta: f64,
    pub total_annual_volume: u64,
    pub average_cost_premium: f64,
}

pub fn kpis(filtered: &[DashboardRow], all: &[DashboardRow]) -> KpiSummary {
    let preferred = filtered
        .iter()
        .filter(|row| row.recommendation == RecommendationLabel::Preferred)
        .count();
    let average_score = mean(filtered.iter().map(DashboardRow::overall_score));

    KpiSummary {
        total_suppliers: filtered.len(),
        supplier_delta: filtered.len() as i64 - all.len() as i64,
        preferred_share_pct: share(preferred, filtered.len()),
        average_score,
        average_score_delta: average_score - mean(all.iter().map(DashboardRow::overall_score)),
        total_annual_volume: filtered.iter().map(|row| row.annual_volume).sum(),
        average_cost_premium: mean(filtered.iter().map(|row| row.cost_premium)),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn share(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierHighlight {
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub country: String,
    pub overall_score: f64,
    pub product_category: String,
    pub risk_level: String,
}

impl SupplierHighlight {
    fn from_row(row: &DashboardRow) -> Self {
        Self {
            supplier_id: row.supplier_id.clone(),
            supplier_name: row.supplier_name.clone(),
            country: row.country.clone(),
            overall_score: row.overall_score(),
            product_category: row.product_category.clone(),
            risk_level: row.risk_level.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardInsights {
    pub top_preferred: Vec<SupplierHighlight>,
    pub needs_review: Vec<SupplierHighlight>,
    pub avoid: Vec<SupplierHighlight>,
    pub country_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_country: Option<String>,
    pub category_count: usize,
    pub sub_category_count: usize,
    pub high_risk_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observations: Vec<String>,
}

pub fn insights(filtered: &[DashboardRow]) -> DashboardInsights {
    let mut preferred: Vec<&DashboardRow> = filtered
        .iter()
        .filter(|row| row.recommendation == RecommendationLabel::Preferred)
        .collect();
    // Stable sort keeps store order among equal scores.
    preferred.sort_by(|a, b| b.overall_score().total_cmp(&a.overall_score()));
    let preferred_count = preferred.len();

    let top_preferred = preferred
        .into_iter()
        .take(HIGHLIGHT_LIMIT)
        .map(SupplierHighlight::from_row)
        .collect();
    let needs_review = highlights(filtered, |label| label.needs_review());
    let avoid = highlights(filtered, |label| label == RecommendationLabel::Avoid);

    let mut per_country: BTreeMap<&str, usize> = BTreeMap::new();
    for row in filtered {
        *per_country.entry(row.country.as_str()).or_default() += 1;
    }
    let top_country = most_frequent(&per_country).map(str::to_string);

    let category_count = distinct(filtered.iter().map(|row| row.product_category.as_str()));
    let sub_category_count = distinct(filtered.iter().map(|row| row.sub_category.as_str()));
    let high_risk_count = filtered
        .iter()
        .filter(|row| row.risk_level == HIGH_RISK)
        .count();

    let mut observations = Vec::new();
    if !filtered.is_empty() {
        observations.push(format!(
            "Supplier base spans {} countries, with {} having the most suppliers",
            per_country.len(),
            top_country.as_deref().unwrap_or("N/A")
        ));
        observations.push(format!(
            "Average sustainability score is {:.1} across {} suppliers",
            mean(filtered.iter().map(DashboardRow::overall_score)),
            filtered.len()
        ));
        observations.push(format!(
            "{preferred_count} suppliers ({:.1}%) are classified as preferred partners",
            share(preferred_count, filtered.len())
        ));
        if high_risk_count > 0 {
            observations.push(format!(
                "{high_risk_count} high-risk suppliers require immediate attention"
            ));
        }
    }

    DashboardInsights {
        top_preferred,
        needs_review,
        avoid,
        country_count: per_country.len(),
        top_country,
        category_count,
        sub_category_count,
        high_risk_count,
        observations,
    }
}

fn highlights<F>(rows: &[DashboardRow], keep: F) -> Vec<SupplierHighlight>
where
    F: Fn(RecommendationLabel) -> bool,
{
    rows.iter()
        .filter(|row| keep(row.recommendation))
        .take(HIGHLIGHT_LIMIT)
        .map(SupplierHighlight::from_row)
        .collect()
}

/// Highest count wins; ties go to the alphabetically first key.
fn most_frequent<'a>(counts: &BTreeMap<&'a str, usize>) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for (key, count) in counts {
        if best.map_or(true, |(_, best_count)| *count > best_count) {
            best = Some((*key, *count));
        }
    }
    best.map(|(key, _)| key)
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> usize {
    values.collect::<BTreeSet<_>>().len()
}
