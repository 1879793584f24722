use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::metrics;
use crate::state::AppState;

/// Thin ambient HTTP surface: health and Prometheus metrics only (spec §1,
/// §6 — the REST API over detections/alerts/jobs is out of scope).
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let indices = state.search.cat_indices("*").await.unwrap_or_default();
    (StatusCode::OK, Json(json!({"status": "ok", "indices": indices.len()})))
}

async fn metrics_handler() -> impl IntoResponse {
    (StatusCode::OK, metrics::render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::executor::{AuditStore, ResponseActionStore};
    use crate::models::response::{AuditLog, ResponseAction};
    use crate::notify::LogNotificationChannel;
    use crate::search::InMemorySearchService;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct NoopStore;
    #[async_trait::async_trait]
    impl AuditStore for NoopStore {
        async fn save(&self, _log: AuditLog) {}
    }
    #[async_trait::async_trait]
    impl ResponseActionStore for NoopStore {
        async fn save(&self, _action: ResponseAction) {}
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let state = AppState::new(
            Default::default(),
            Arc::new(InMemorySearchService::new()),
            Vec::new(),
            None,
            None,
            Arc::new(NoopStore),
            Arc::new(NoopStore),
            Arc::new(LogNotificationChannel::new()),
        );
        let app = create_router(state);
        let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
