//! `api` crate — HTTP surface over the workflow engine.
//!
//! Routes:
//!   POST   /workflows
//!   GET    /workflows/{id}
//!   POST   /workflows/{id}/executions
//!   POST   /workflows/{id}/triggers
//!   GET    /workflows/{id}/triggers
//!   DELETE /triggers/{id}
//!   GET    /executions/{id}
//!   POST   /executions/{id}/cancel
//!   POST   /hooks/{trigger_id}
//!   POST   /events/{name}

pub mod error;
pub mod handlers;

use std::future::Future;

use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use engine::WorkflowEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: WorkflowEngine,
}

impl AppState {
    pub fn new(engine: WorkflowEngine) -> Self {
        Self { engine }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/workflows", post(handlers::workflows::publish))
        .route("/workflows/{id}", get(handlers::workflows::get))
        .route("/workflows/{id}/executions", post(handlers::workflows::start))
        .route(
            "/workflows/{id}/triggers",
            post(handlers::triggers::register).get(handlers::triggers::list),
        )
        .route("/triggers/{id}", delete(handlers::triggers::delete))
        .route("/executions/{id}", get(handlers::executions::get))
        .route("/executions/{id}/cancel", post(handlers::executions::cancel))
        .route("/hooks/{trigger_id}", post(handlers::hooks::receive))
        .route("/events/{name}", post(handlers::events::emit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    bind: &str,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use engine::{EngineConfig, InMemoryStore};
    use nodes::mock::MockAction;
    use nodes::ActionRegistry;

    fn app() -> (Router, WorkflowEngine) {
        let mut actions = ActionRegistry::with_builtins();
        actions.register("charge", Arc::new(MockAction::returning(json!({ "receipt": 1 }))));
        let engine = WorkflowEngine::new(
            EngineConfig::default(),
            Arc::new(InMemoryStore::new()),
            Arc::new(actions),
        );
        (router(AppState::new(engine.clone())), engine)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    fn checkout() -> Value {
        json!({
            "name": "checkout",
            "entryNodeId": "pay",
            "nodes": [
                { "id": "pay", "type": "task", "config": { "action": "charge" } },
                { "id": "notify", "type": "task", "config": { "action": "log" } }
            ],
            "edges": [
                { "id": "e1", "sourceNodeId": "pay", "targetNodeId": "notify" }
            ]
        })
    }

    async fn publish(app: &Router) -> String {
        let (status, body) = send(app, "POST", "/workflows", Some(checkout())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["version"], json!(1));
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn start_and_inspect_an_execution() {
        let (app, engine) = app();
        let id = publish(&app).await;

        let (status, def) = send(&app, "GET", &format!("/workflows/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(def["nodes"][0]["type"], json!("task"));

        let (status, accepted) = send(
            &app,
            "POST",
            &format!("/workflows/{id}/executions"),
            Some(json!({ "triggerType": "manual", "payload": { "orderId": 42 } })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(accepted["status"], json!("pending"));

        let execution_id: Uuid = accepted["executionId"].as_str().unwrap().parse().unwrap();
        engine.wait(execution_id).await.unwrap();

        let (status, execution) = send(&app, "GET", &format!("/executions/{execution_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(execution["status"], json!("completed"));
        assert_eq!(execution["variables"]["orderId"], json!(42));
        assert_eq!(execution["nodeLogs"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn start_without_a_body_is_a_manual_start() {
        let (app, _) = app();
        let id = publish(&app).await;
        let (status, accepted) = send(&app, "POST", &format!("/workflows/{id}/executions"), None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(accepted["executionId"].is_string());
    }

    #[tokio::test]
    async fn invalid_definitions_return_every_violation() {
        let (app, _) = app();
        let mut def = checkout();
        def["entryNodeId"] = json!("nowhere");
        def["nodes"][1]["type"] = json!("teleport");

        let (status, body) = send(&app, "POST", "/workflows", Some(def)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let kinds: Vec<&str> = body["violations"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v["kind"].as_str())
            .collect();
        assert!(kinds.len() >= 2, "{body}");
    }

    #[tokio::test]
    async fn unknown_resources_are_not_found() {
        let (app, _) = app();
        let id = Uuid::new_v4();
        for (method, uri) in [
            ("GET", format!("/workflows/{id}")),
            ("GET", format!("/executions/{id}")),
            ("POST", format!("/executions/{id}/cancel")),
            ("POST", format!("/workflows/{id}/executions")),
            ("DELETE", format!("/triggers/{id}")),
            ("POST", format!("/hooks/{id}")),
        ] {
            let (status, _) = send(&app, method, &uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn cancelling_a_finished_execution_conflicts() {
        let (app, engine) = app();
        let id = publish(&app).await;
        let (_, accepted) = send(&app, "POST", &format!("/workflows/{id}/executions"), None).await;
        let execution_id: Uuid = accepted["executionId"].as_str().unwrap().parse().unwrap();
        engine.wait(execution_id).await.unwrap();

        let (status, body) = send(&app, "POST", &format!("/executions/{execution_id}/cancel"), None).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["status"], json!("completed"));
    }

    #[tokio::test]
    async fn webhook_triggers_start_executions() {
        let (app, engine) = app();
        let id = publish(&app).await;

        let (status, trigger) = send(
            &app,
            "POST",
            &format!("/workflows/{id}/triggers"),
            Some(json!({ "type": "webhook", "config": { "path": "/orders" } })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let trigger_id = trigger["id"].as_str().unwrap().to_string();

        let (status, accepted) = send(
            &app,
            "POST",
            &format!("/hooks/{trigger_id}"),
            Some(json!({ "orderId": 9 })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let execution_id: Uuid = accepted["executionId"].as_str().unwrap().parse().unwrap();
        let execution = engine.wait(execution_id).await.unwrap();
        assert_eq!(execution.variables["orderId"], json!(9));

        let (status, listed) = send(&app, "GET", &format!("/workflows/{id}/triggers"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "DELETE", &format!("/triggers/{trigger_id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "POST", &format!("/hooks/{trigger_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bad_trigger_configs_are_rejected() {
        let (app, _) = app();
        let id = publish(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/workflows/{id}/triggers"),
            Some(json!({ "type": "schedule", "config": { "cron": "whenever" } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("whenever"));

        let (status, event) = send(
            &app,
            "POST",
            &format!("/workflows/{id}/triggers"),
            Some(json!({ "type": "event", "config": { "event": "order.created" } })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = send(&app, "POST", &format!("/hooks/{}", event["id"].as_str().unwrap()), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn events_fan_out_to_subscribers() {
        let (app, _) = app();
        let id = publish(&app).await;
        send(
            &app,
            "POST",
            &format!("/workflows/{id}/triggers"),
            Some(json!({ "type": "event", "config": { "event": "order.created" } })),
        )
        .await;

        let (status, body) = send(&app, "POST", "/events/order.created", Some(json!({ "orderId": 1 }))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["executions"].as_array().unwrap().len(), 1);

        let (_, body) = send(&app, "POST", "/events/nobody.listens", None).await;
        assert!(body["executions"].as_array().unwrap().is_empty());
    }
}
