use crate::infra::{demo_models, HashingEmbedder, InMemoryImageStorage, InMemorySupplierStore};
use chrono::NaiveDate;
use clap::Args;
use ecochain::dashboard::{build_dashboard, simulate, DashboardFilter, ImprovementPlan};
use ecochain::error::AppError;
use ecochain::import::SupplierImporter;
use ecochain::suppliers::{ImageUpload, NewSupplier, SupplierPipeline, SupplierRecord};
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_BUCKET: &str = "ecochain-demo-images";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Supplier table export to load before onboarding the demo suppliers.
    #[arg(long)]
    pub(crate) suppliers_csv: Option<PathBuf>,
    /// Embedding width used by the built-in demo models.
    #[arg(long, default_value_t = 16)]
    pub(crate) embedding_dim: usize,
    /// Uniform improvement percentage for the simulation step (0-50).
    #[arg(long, default_value_t = 10)]
    pub(crate) improvement_pct: u32,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        suppliers_csv,
        embedding_dim,
        improvement_pct,
    } = args;

    println!("EcoChain supplier scoring demo");
    let models = demo_models(embedding_dim)?;
    let imported = match suppliers_csv {
        Some(path) => SupplierImporter::from_path(path)?,
        None => Vec::new(),
    };
    println!(
        "- {} suppliers imported | feature width {}",
        imported.len(),
        models.feature_width()
    );

    let pipeline = SupplierPipeline::new(
        Arc::new(InMemorySupplierStore::from_records(imported)),
        Arc::new(HashingEmbedder::new(embedding_dim)),
        Arc::new(InMemoryImageStorage::new(DEMO_BUCKET)),
        Arc::new(models),
    );

    println!("\nOnboarding");
    for submission in demo_submissions() {
        let name = submission.supplier_name.clone();
        match pipeline.onboard(submission) {
            Ok(record) => render_record(&record),
            Err(err) => println!("  {}: onboarding failed: {}", name, err),
        }
    }

    let outcome = pipeline.score_pending(100)?;
    if !outcome.scored.is_empty() || !outcome.failed.is_empty() {
        println!(
            "\nBatch scoring: {} scored, {} failed",
            outcome.scored.len(),
            outcome.failed.len()
        );
        for record in &outcome.scored {
            match pipeline.recommend(&record.supplier_id) {
                Ok(record) => render_record(&record),
                Err(err) => println!("  {}: {}", record.supplier_id, err),
            }
        }
        for failure in &outcome.failed {
            println!("  failed: {}", failure);
        }
    }

    let records = pipeline.list()?;
    let view = build_dashboard(&records, &DashboardFilter::default());
    println!("\nDashboard");
    println!(
        "- {} suppliers | {:.0}% preferred | avg score {:.1} | {} annual volume | {:.1}% avg premium",
        view.kpis.total_suppliers,
        view.kpis.preferred_share_pct,
        view.kpis.average_score,
        view.kpis.total_annual_volume,
        view.kpis.average_cost_premium
    );
    if let Some(country) = &view.insights.top_country {
        println!(
            "- {} countries, most suppliers in {}",
            view.insights.country_count, country
        );
    }
    for highlight in &view.insights.top_preferred {
        println!(
            "  top: {} ({}) {:.1}",
            highlight.supplier_name, highlight.country, highlight.overall_score
        );
    }
    for highlight in &view.insights.needs_review {
        println!("  review: {} {:.1}", highlight.supplier_name, highlight.overall_score);
    }
    for highlight in &view.insights.avoid {
        println!("  avoid: {} {:.1}", highlight.supplier_name, highlight.overall_score);
    }
    for observation in &view.insights.observations {
        println!("  note: {}", observation);
    }

    let Some(row) = view.suppliers.first() else {
        println!("\nNo recommended suppliers to simulate.");
        return Ok(());
    };
    let plan = ImprovementPlan {
        carbon: improvement_pct,
        water: improvement_pct,
        waste: improvement_pct,
        social: improvement_pct,
    };
    println!("\nImprovement simulation for {}", row.supplier_name);
    match simulate(row, &plan) {
        Ok(result) => {
            println!(
                "- overall {:.1} -> {:.1} ({:+.1}) for ${} investment",
                result.current.overall,
                result.projected_overall,
                result.improvement,
                result.investment
            );
            if let Some(roi) = result.roi {
                println!("- ROI {:.2}", roi);
            }
            if let Some(tier) = result.achievement {
                println!("- {}", tier.label());
            }
        }
        Err(err) => println!("- simulation rejected: {}", err),
    }

    Ok(())
}

fn render_record(record: &SupplierRecord) {
    let view = record.status_view();
    let overall = view
        .scores
        .map(|scores| format!("{:.1}", scores.overall))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {} {} -> {} | overall {} | {}",
        view.supplier_id,
        view.supplier_name,
        view.stage_label,
        overall,
        view.recommendation.unwrap_or("no recommendation")
    );
    for url in &view.image_urls {
        println!("    image: {}", url);
    }
}

fn demo_submissions() -> Vec<NewSupplier> {
    let audit = |year, month, day| NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default();
    vec![
        NewSupplier {
            supplier_name: "Green Looms Cooperative".to_string(),
            country: "Kenya".to_string(),
            region: "Africa".to_string(),
            product_category: "Textiles".to_string(),
            sub_category: "Organic Cotton".to_string(),
            certifications: vec!["GOTS".to_string(), "Fair Trade".to_string()],
            partnership_status: "Active".to_string(),
            annual_volume: Some(250_000),
            cost_premium: Some(6.5),
            risk_level: "Low".to_string(),
            last_audit: audit(2025, 3, 14),
            audit_summary: "Closed-loop dye water recycling, no major findings".to_string(),
            images: vec![ImageUpload {
                file_name: "loom-floor.png".to_string(),
                bytes: vec![0x89, 0x50, 0x4e, 0x47],
            }],
        },
        NewSupplier {
            supplier_name: "Delta Plastics".to_string(),
            country: "Vietnam".to_string(),
            region: "Asia".to_string(),
            product_category: "Packaging".to_string(),
            sub_category: "Films".to_string(),
            certifications: vec!["ISO 9001".to_string()],
            partnership_status: "Under Review".to_string(),
            annual_volume: Some(90_000),
            cost_premium: Some(0.0),
            risk_level: "Medium".to_string(),
            last_audit: audit(2024, 11, 2),
            audit_summary: "Waste segregation incomplete, corrective plan pending".to_string(),
            images: Vec::new(),
        },
        NewSupplier {
            supplier_name: "Rio Tannery".to_string(),
            country: "Brazil".to_string(),
            region: "South America".to_string(),
            product_category: "Leather".to_string(),
            sub_category: "Hides".to_string(),
            certifications: vec!["LWG Audited".to_string()],
            partnership_status: "Inactive".to_string(),
            annual_volume: Some(40_000),
            cost_premium: Some(-4.0),
            risk_level: "High".to_string(),
            last_audit: audit(2023, 8, 21),
            audit_summary: "Chromium discharge above permit limits".to_string(),
            images: Vec::new(),
        },
    ]
}
