use crate::cli::ServeArgs;
use crate::infra::{AppState, HashingEmbedder, InMemoryImageStorage, InMemorySupplierStore};
use crate::routes::with_supplier_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use ecochain::config::AppConfig;
use ecochain::error::AppError;
use ecochain::import::SupplierImporter;
use ecochain::suppliers::{ArtifactError, ScoringModels, SupplierPipeline};
use ecochain::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) type ServicePipeline =
    SupplierPipeline<InMemorySupplierStore, HashingEmbedder, InMemoryImageStorage>;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let pipeline = Arc::new(build_pipeline(&config)?);

    let app = with_supplier_routes(pipeline)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "ecochain supplier service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Load the trained artifacts and seed the store from the configured export, if any.
pub(crate) fn build_pipeline(config: &AppConfig) -> Result<ServicePipeline, AppError> {
    let models = ScoringModels::load(&config.scoring.model_dir)?;
    if models.embedding_dimension() != config.scoring.embedding_dimension {
        return Err(ArtifactError::Layout(format!(
            "models expect {}-dimension embeddings but ECOCHAIN_EMBEDDING_DIM is {}",
            models.embedding_dimension(),
            config.scoring.embedding_dimension
        ))
        .into());
    }

    let store = match &config.storage.suppliers_csv {
        Some(path) => InMemorySupplierStore::from_records(SupplierImporter::from_path(path)?),
        None => InMemorySupplierStore::default(),
    };

    Ok(SupplierPipeline::new(
        Arc::new(store),
        Arc::new(HashingEmbedder::new(config.scoring.embedding_dimension)),
        Arc::new(InMemoryImageStorage::new(config.storage.image_bucket.clone())),
        Arc::new(models),
    ))
}
