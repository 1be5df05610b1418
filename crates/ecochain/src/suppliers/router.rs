use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{NewSupplier, SupplierId};
use super::repository::{EmbeddingService, ImageStorage, StoreError, SupplierStore};
use super::service::{PipelineError, StageFailure, SupplierPipeline};
use crate::dashboard::{self, DashboardQuery, DashboardRow, ImprovementPlan};

const DEFAULT_PENDING_LIMIT: usize = 100;

/// HTTP endpoints for onboarding, pipeline control, and the dashboard.
pub fn supplier_router<S, E, I>(pipeline: Arc<SupplierPipeline<S, E, I>>) -> Router
where
    S: SupplierStore + 'static,
    E: EmbeddingService + 'static,
    I: ImageStorage + 'static,
{
    Router::new()
        .route("/api/v1/suppliers", post(onboard_handler::<S, E, I>))
        .route(
            "/api/v1/suppliers/score-pending",
            post(score_pending_handler::<S, E, I>),
        )
        .route(
            "/api/v1/suppliers/:supplier_id",
            get(status_handler::<S, E, I>),
        )
        .route(
            "/api/v1/suppliers/:supplier_id/advance",
            post(advance_handler::<S, E, I>),
        )
        .route(
            "/api/v1/suppliers/:supplier_id/rescore",
            post(rescore_handler::<S, E, I>),
        )
        .route(
            "/api/v1/suppliers/:supplier_id/simulate",
            post(simulate_handler::<S, E, I>),
        )
        .route("/api/v1/dashboard", get(dashboard_handler::<S, E, I>))
        .with_state(pipeline)
}

pub(crate) async fn onboard_handler<S, E, I>(
    State(pipeline): State<Arc<SupplierPipeline<S, E, I>>>,
    axum::Json(submission): axum::Json<NewSupplier>,
) -> Response
where
    S: SupplierStore + 'static,
    E: EmbeddingService + 'static,
    I: ImageStorage + 'static,
{
    match pipeline.onboard(submission) {
        Ok(record) => (StatusCode::ACCEPTED, axum::Json(record.status_view())).into_response(),
        Err(error) => pipeline_error_response(error),
    }
}

pub(crate) async fn status_handler<S, E, I>(
    State(pipeline): State<Arc<SupplierPipeline<S, E, I>>>,
    Path(supplier_id): Path<String>,
) -> Response
where
    S: SupplierStore + 'static,
    E: EmbeddingService + 'static,
    I: ImageStorage + 'static,
{
    match pipeline.get(&SupplierId(supplier_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(error) => pipeline_error_response(error),
    }
}

pub(crate) async fn advance_handler<S, E, I>(
    State(pipeline): State<Arc<SupplierPipeline<S, E, I>>>,
    Path(supplier_id): Path<String>,
) -> Response
where
    S: SupplierStore + 'static,
    E: EmbeddingService + 'static,
    I: ImageStorage + 'static,
{
    match pipeline.advance(&SupplierId(supplier_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(error) => pipeline_error_response(error),
    }
}

pub(crate) async fn rescore_handler<S, E, I>(
    State(pipeline): State<Arc<SupplierPipeline<S, E, I>>>,
    Path(supplier_id): Path<String>,
) -> Response
where
    S: SupplierStore + 'static,
    E: EmbeddingService + 'static,
    I: ImageStorage + 'static,
{
    match pipeline.rescore(&SupplierId(supplier_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Err(error) => pipeline_error_response(error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PendingQuery {
    pub(crate) limit: Option<usize>,
}

pub(crate) async fn score_pending_handler<S, E, I>(
    State(pipeline): State<Arc<SupplierPipeline<S, E, I>>>,
    Query(query): Query<PendingQuery>,
) -> Response
where
    S: SupplierStore + 'static,
    E: EmbeddingService + 'static,
    I: ImageStorage + 'static,
{
    let limit = query.limit.unwrap_or(DEFAULT_PENDING_LIMIT);
    match pipeline.score_pending(limit) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome.summary())).into_response(),
        Err(error) => pipeline_error_response(error),
    }
}

pub(crate) async fn dashboard_handler<S, E, I>(
    State(pipeline): State<Arc<SupplierPipeline<S, E, I>>>,
    Query(query): Query<DashboardQuery>,
) -> Response
where
    S: SupplierStore + 'static,
    E: EmbeddingService + 'static,
    I: ImageStorage + 'static,
{
    let filter = match query.into_filter() {
        Ok(filter) => filter,
        Err(error) => return error_response(StatusCode::BAD_REQUEST, error.to_string()),
    };

    match pipeline.list() {
        Ok(records) => {
            let view = dashboard::build_dashboard(&records, &filter);
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => pipeline_error_response(error),
    }
}

pub(crate) async fn simulate_handler<S, E, I>(
    State(pipeline): State<Arc<SupplierPipeline<S, E, I>>>,
    Path(supplier_id): Path<String>,
    axum::Json(plan): axum::Json<ImprovementPlan>,
) -> Response
where
    S: SupplierStore + 'static,
    E: EmbeddingService + 'static,
    I: ImageStorage + 'static,
{
    let record = match pipeline.get(&SupplierId(supplier_id)) {
        Ok(record) => record,
        Err(error) => return pipeline_error_response(error),
    };

    let Some(row) = DashboardRow::from_record(&record) else {
        let payload = json!({
            "supplier_id": record.supplier_id,
            "stage": record.stage(),
            "error": "supplier has no recommendation yet",
        });
        return (StatusCode::CONFLICT, axum::Json(payload)).into_response();
    };

    match dashboard::simulate(&row, &plan) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(error) => error_response(StatusCode::UNPROCESSABLE_ENTITY, error.to_string()),
    }
}

pub(crate) fn pipeline_error_response(error: PipelineError) -> Response {
    match error {
        PipelineError::Validation(error) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, error.to_string())
        }
        PipelineError::NotFound(_) | PipelineError::Store(StoreError::NotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, error.to_string())
        }
        PipelineError::StageFailed {
            ref supplier_id,
            stage,
            ref source,
        } => {
            let status = match source {
                StageFailure::OutOfOrder { .. } => StatusCode::CONFLICT,
                _ => StatusCode::BAD_GATEWAY,
            };
            let payload = json!({
                "supplier_id": supplier_id,
                "stage": stage,
                "error": error.to_string(),
            });
            (status, axum::Json(payload)).into_response()
        }
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    let payload = json!({
        "error": message,
    });
    (status, axum::Json(payload)).into_response()
}
