use crate::infra::{AppState, CatalogService, MEDIA_ROUTE};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use rental_hub::access::{AccessGate, PolicyStore};
use rental_hub::properties::{admin_router, property_router};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;

pub(crate) fn with_catalog_routes<S>(
    gate: Arc<AccessGate<S>>,
    service: Arc<CatalogService>,
    media_dir: &Path,
) -> axum::Router
where
    S: PolicyStore + 'static,
{
    property_router(Arc::clone(&gate), service)
        .merge(admin_router(gate))
        .nest_service(MEDIA_ROUTE, ServeDir::new(media_dir))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
