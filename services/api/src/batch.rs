use crate::server::{build_pipeline, ServicePipeline};
use clap::Args;
use ecochain::config::AppConfig;
use ecochain::error::AppError;
use ecochain::suppliers::{BatchFailureView, BatchOutcome, SupplierStatusView};
use ecochain::telemetry;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct ScorePendingArgs {
    /// Maximum number of embedded suppliers to score in one batch
    #[arg(long, default_value_t = 100)]
    pub(crate) limit: usize,
    /// Supplier table export to score (overrides ECOCHAIN_SUPPLIERS_CSV)
    #[arg(long)]
    pub(crate) suppliers_csv: Option<PathBuf>,
    /// Model artifact directory (overrides ECOCHAIN_MODEL_DIR)
    #[arg(long)]
    pub(crate) model_dir: Option<PathBuf>,
}

/// Score the pending suppliers of an exported table, derive their recommendations, and print
/// the batch summary as JSON.
pub(crate) fn run_score_pending(args: ScorePendingArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(path) = args.suppliers_csv {
        config.storage.suppliers_csv = Some(path);
    }
    if let Some(dir) = args.model_dir {
        config.scoring.model_dir = dir;
    }
    telemetry::init(&config.telemetry)?;

    let pipeline = build_pipeline(&config)?;
    let outcome = pipeline.score_pending(args.limit)?;

    let (recommendations, recommendation_failures) = recommend_scored(&pipeline, &outcome);
    info!(
        scored = outcome.scored.len(),
        failed = outcome.failed.len(),
        recommended = recommendations.len(),
        recommendation_failures = recommendation_failures.len(),
        "score-pending batch finished"
    );

    let report = json!({
        "batch": outcome.summary(),
        "recommendations": recommendations,
        "recommendation_failures": recommendation_failures,
    });
    match serde_json::to_string_pretty(&report) {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => println!("{report} ({err})"),
    }
    Ok(())
}

/// Recommend every scored supplier of a batch. A failed recommendation is reported and the
/// rest still run.
fn recommend_scored(
    pipeline: &ServicePipeline,
    outcome: &BatchOutcome,
) -> (Vec<SupplierStatusView>, Vec<BatchFailureView>) {
    let mut recommendations = Vec::with_capacity(outcome.scored.len());
    let mut failures = Vec::new();
    for record in &outcome.scored {
        match pipeline.recommend(&record.supplier_id) {
            Ok(record) => recommendations.push(record.status_view()),
            Err(error) => failures.push(BatchFailureView::from(&error)),
        }
    }
    (recommendations, failures)
}
