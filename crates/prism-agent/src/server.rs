//! HTTP scrape surface
//!
//! `GET /` serves a static informational page, `GET /health` a liveness
//! probe, and `GET /metrics/:cluster` the exposition text for one
//! cluster's registry. The metrics handler is the scrape-time driver: it
//! runs the credential refresh hook, triggers every collector, then
//! encodes the per-cluster registry.

use crate::routes::RouteTable;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use prism_api::CredentialProvider;
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tracing::warn;

const INDEX_PAGE: &str = "<html><head><title>prismeter</title></head>\
<body><h1>prismeter</h1>\
<p>Per-cluster metrics are served under <code>/metrics/{cluster-name}</code>.</p>\
</body></html>";

/// Shared state of the scrape server.
#[derive(Clone)]
pub struct AppState {
    table: Arc<RouteTable>,
    provider: Arc<dyn CredentialProvider>,
}

impl AppState {
    pub fn new(table: Arc<RouteTable>, provider: Arc<dyn CredentialProvider>) -> Self {
        Self { table, provider }
    }
}

/// Build the axum application.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/metrics/:cluster", get(metrics_handler))
        .with_state(state)
}

/// Handler for the informational index page.
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

/// Handler for the liveness probe.
async fn health_handler() -> Response {
    (StatusCode::OK, "OK").into_response()
}

/// Handler for one cluster's scrape route.
async fn metrics_handler(
    State(state): State<AppState>,
    Path(cluster): Path<String>,
) -> Response {
    let target = match state.table.get(&cluster) {
        Some(target) => target,
        None => return (StatusCode::NOT_FOUND, "unknown cluster").into_response(),
    };

    target
        .cluster
        .refresh_credentials_if_needed(state.provider.as_ref())
        .await;

    for collector in &target.collectors {
        collector.collect().await;
    }

    let encoder = TextEncoder::new();
    let metric_families = target.cluster.registry().gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(cluster = %cluster, error = %e, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response();
    }

    match String::from_utf8(buffer) {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", encoder.format_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(cluster = %cluster, error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::ScrapeTarget;
    use axum::body::Body;
    use axum::http::Request;
    use prism_api::{
        ClientPolicy, Cluster, CredentialPair, RoleClass, StaticCredentialProvider,
    };
    use tower::ServiceExt;

    fn test_state(table: Arc<RouteTable>) -> AppState {
        let provider = StaticCredentialProvider::new(CredentialPair::new("svc", "secret"));
        AppState::new(table, Arc::new(provider))
    }

    async fn empty_target(name: &str) -> Arc<ScrapeTarget> {
        let provider = StaticCredentialProvider::new(CredentialPair::new("svc", "secret"));
        let cluster = Arc::new(
            Cluster::connect(
                name,
                "https://10.0.0.4:9440",
                RoleClass::Element,
                &provider,
                &ClientPolicy::default(),
            )
            .await
            .unwrap(),
        );
        Arc::new(ScrapeTarget::new(cluster, Vec::new()))
    }

    #[tokio::test]
    async fn test_index_and_health() {
        let app = router(test_state(Arc::new(RouteTable::new())));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_cluster_is_not_found() {
        let app = router(test_state(Arc::new(RouteTable::new())));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_registered_cluster_serves_exposition_content_type() {
        let table = Arc::new(RouteTable::new());
        table.try_register("pe-01", empty_target("pe-01").await);
        let app = router(test_state(table));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics/pe-01")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("text/plain"));
    }
}
