use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::suppliers::domain::SupplierId;
use crate::suppliers::router::status_handler;
use crate::suppliers::SupplierPipeline;

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("json body")))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

fn submission_json(name: &str) -> serde_json::Value {
    serde_json::to_value(submission(name)).expect("submission serializes")
}

#[tokio::test]
async fn onboard_route_returns_accepted_with_status_view() {
    let Harness { pipeline, .. } = harness();
    let router = router_with(pipeline);

    let response = router
        .oneshot(post_json("/api/v1/suppliers", &submission_json("Green Looms")))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["supplier_id"], "SUP1");
    assert_eq!(payload["stage"], "recommended");
    assert_eq!(payload["recommendation"], "Preferred");
    assert_eq!(payload["scores"]["overall"], 87.5);
}

#[tokio::test]
async fn onboard_route_rejects_invalid_submissions() {
    let Harness { pipeline, .. } = harness();
    let router = router_with(pipeline);
    let mut body = submission_json("Broken");
    body["audit_summary"] = json!("");

    let response = router
        .oneshot(post_json("/api/v1/suppliers", &body))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .expect("error message")
        .contains("audit_summary"));
}

#[tokio::test]
async fn onboard_route_reports_failing_stage_as_bad_gateway() {
    let pipeline = SupplierPipeline::new(
        Arc::new(MemoryStore::default()),
        Arc::new(FailingEmbedder),
        Arc::new(MemoryImages::default()),
        Arc::new(models(TEST_DIMENSION)),
    );
    let router = crate::suppliers::supplier_router(Arc::new(pipeline));

    let response = router
        .oneshot(post_json("/api/v1/suppliers", &submission_json("Offline")))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["supplier_id"], "SUP1");
    assert_eq!(payload["stage"], "embedded");
}

#[tokio::test]
async fn status_handler_returns_not_found_for_unknown_ids() {
    let Harness { pipeline, .. } = harness();

    let response = status_handler(State(Arc::new(pipeline)), Path("SUP404".to_string())).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn advance_route_finishes_an_embedded_supplier() {
    let Harness {
        pipeline, store, ..
    } = harness();
    store.seed(embedded_record(5, profile("India", "High", "Inactive", 0.0)));
    let router = router_with(pipeline);

    let response = router
        .oneshot(post_json("/api/v1/suppliers/SUP5/advance", &json!({})))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["recommendation"], "Neutral");
    assert_eq!(
        store.get(&SupplierId::from_sequence(5)).overall_score(),
        Some(55.0)
    );
}

#[tokio::test]
async fn rescore_route_conflicts_for_unscored_suppliers() {
    let Harness {
        pipeline, store, ..
    } = harness();
    store.seed(embedded_record(5, profile("India", "High", "Inactive", 0.0)));
    let router = router_with(pipeline);

    let response = router
        .oneshot(post_json("/api/v1/suppliers/SUP5/rescore", &json!({})))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn score_pending_route_summarizes_the_batch() {
    let Harness {
        pipeline, store, ..
    } = harness();
    store.seed(embedded_record(1, profile("Kenya", "Low", "Active", 10.0)));
    store.seed(embedded_record(2, profile("Atlantis", "Low", "Active", 10.0)));
    let router = router_with(pipeline);

    let response = router
        .oneshot(post_json("/api/v1/suppliers/score-pending?limit=5", &json!({})))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["scored"], json!(["SUP1"]));
    assert_eq!(payload["failed"][0]["supplier_id"], "SUP2");
    assert_eq!(payload["failed"][0]["stage"], "scored");
}

#[tokio::test]
async fn dashboard_route_filters_recommended_suppliers() {
    let Harness { pipeline, .. } = harness();
    let router = router_with(pipeline);

    for name in ["First", "Second"] {
        let response = router
            .clone()
            .oneshot(post_json("/api/v1/suppliers", &submission_json(name)))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    let response = router
        .clone()
        .oneshot(get("/api/v1/dashboard?countries=Kenya&recommendations=Preferred"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["kpis"]["total_suppliers"], 2);
    assert_eq!(payload["kpis"]["preferred_share_pct"], 100.0);
    assert_eq!(payload["insights"]["top_country"], "Kenya");

    let response = router
        .oneshot(get("/api/v1/dashboard?recommendations=Excellent"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn simulate_route_projects_improvements() {
    let Harness { pipeline, .. } = harness();
    let record = pipeline.onboard(submission("Simulated")).expect("onboards");
    let router = router_with(pipeline);

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/suppliers/{}/simulate", record.supplier_id),
            &json!({ "carbon": 0, "water": 25, "waste": 0, "social": 0 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["projected"]["water"], 100.0);
    assert_eq!(payload["projected_overall"], 92.5);
    assert_eq!(payload["investment"], 250_000);
    assert_eq!(payload["achievement"], "top_tier");
}
