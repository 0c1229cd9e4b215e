use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use warden_engine::NodeInfoCache;
use warden_observe::Metrics;
use warden_store::Cluster;

use crate::handlers;
use crate::state::AppState;

pub fn build_app(
    info_cache: Arc<NodeInfoCache>,
    metrics: Arc<Metrics>,
    cluster: Arc<dyn Cluster>,
) -> Router {
    let state = AppState { info_cache, metrics, cluster };

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/v1/info", get(handlers::info))
        .route("/api/v1/events", get(handlers::events))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tower::util::ServiceExt;
    use warden_domain::NodeState;
    use warden_engine::NodeInfo;
    use warden_store::InMemoryCluster;

    fn test_app() -> (Router, Arc<NodeInfoCache>, Arc<Metrics>) {
        let info_cache = Arc::new(NodeInfoCache::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let cluster = Arc::new(InMemoryCluster::new());
        let app = build_app(info_cache.clone(), metrics.clone(), cluster);
        (app, info_cache, metrics)
    }

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn health_returns_200() {
        let (app, _, _) = test_app();
        let (status, _) = get_text(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn index_serves_dashboard() {
        let (app, _, _) = test_app();
        let (status, body) = get_text(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<html"));
    }

    #[tokio::test]
    async fn info_reflects_published_snapshots() {
        let (app, info_cache, _) = test_app();
        let (status, body) = get_text(app.clone(), "/api/v1/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "[]");

        info_cache.publish(NodeInfo {
            node: "n1".into(),
            state: NodeState::Required,
            labels: BTreeMap::new(),
            profiles: Vec::new(),
            updated_at: Utc::now(),
        });
        let (_, body) = get_text(app, "/api/v1/info").await;
        assert!(body.contains("\"n1\""));
        assert!(body.contains("maintenance-required"));
    }

    #[tokio::test]
    async fn metrics_exposes_contractual_names() {
        let (app, _, metrics) = test_app();
        metrics.record_transition_failure("default");
        let (status, body) = get_text(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("maintenance_controller_transition_failure_count"));
    }

    #[tokio::test]
    async fn events_endpoint_returns_json() {
        let (app, _, _) = test_app();
        let (status, body) = get_text(app, "/api/v1/events?limit=5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "[]");
    }
}
