//! HTTP 操作员边界
//!
//! GET/POST 资源路由，对应核心的 Register / IngestMetric /
//! QueryEvents / Dispatch 等普通函数调用。

pub mod error;
pub mod handlers;

use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::application::services::dispatcher::PolicyDispatcher;
use crate::application::services::ingest::IngestionService;
use crate::application::services::registry::AgentRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AgentRegistry>,
    pub dispatcher: Arc<PolicyDispatcher>,
    pub ingest: Arc<IngestionService>,
    pub nats_url: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/agents",
            get(handlers::list_agents).post(handlers::register_agent),
        )
        .route("/api/agents/{uid}", get(handlers::get_agent))
        .route(
            "/api/metrics",
            get(handlers::list_metrics).post(handlers::ingest_metric),
        )
        .route("/api/events", get(handlers::query_events))
        .route("/api/policy", axum::routing::post(handlers::dispatch_policy))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::dispatcher::PolicyDispatcher;
    use crate::infrastructure::persistence::memory::{
        MemoryAgentRepository, MemoryEventRepository, MemoryMetricRepository,
    };
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use vigil_core::check::CheckRegistry;
    use vigil_core::transport::{MemoryBus, MessageBus};

    fn test_router() -> Router {
        let registry = Arc::new(AgentRegistry::new(Arc::new(MemoryAgentRepository::new())));
        let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
        let dispatcher = Arc::new(PolicyDispatcher::new(
            registry.clone(),
            Arc::new(CheckRegistry::with_builtin()),
            bus,
        ));
        let ingest = Arc::new(IngestionService::new(
            registry.clone(),
            Arc::new(MemoryEventRepository::new()),
            Arc::new(MemoryMetricRepository::new()),
        ));
        router(AppState {
            registry,
            dispatcher,
            ingest,
            nats_url: "nats://127.0.0.1:4222".to_string(),
        })
    }

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_then_get_agent() {
        let app = test_router();

        let response = app
            .clone()
            .oneshot(json_post(
                "/api/agents",
                serde_json::json!({"uid": "a1", "host_name": "web-1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/agents/a1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let view: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(view["uid"], "a1");
        assert_eq!(view["status"], "online");
    }

    #[tokio::test]
    async fn test_register_empty_uid_is_400() {
        let app = test_router();
        let response = app
            .oneshot(json_post(
                "/api/agents",
                serde_json::json!({"uid": "", "host_name": "web-1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_unknown_agent_is_404() {
        let app = test_router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/agents/ghost")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_events_malformed_window_is_400() {
        let app = test_router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/events?uid=a1&policy_name=x&t=soon")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_agent_is_404() {
        let app = test_router();
        let response = app
            .oneshot(json_post(
                "/api/policy",
                serde_json::json!({
                    "policy_type": "tcp",
                    "agent_uid": "ghost",
                    "parameters": {"alias": "x", "port": "80", "frequency": "1s"}
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metric_for_unknown_agent_is_404() {
        let app = test_router();
        let response = app
            .oneshot(json_post(
                "/api/metrics",
                serde_json::json!({"agent_uid": "ghost", "data": {"load": 1.0}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
