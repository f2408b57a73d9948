//! Composes the full `/api` + `/ws` + `/health` router (§6).

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, health, runs, workflows};
use crate::ratelimit::rate_limit;
use crate::state::SharedState;
use crate::ws::ws_handler;

pub fn build_router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/workflows", get(workflows::list).post(workflows::create))
        .route(
            "/workflows/{id}",
            get(workflows::get).put(workflows::update).delete(workflows::delete),
        )
        .route("/workflows/{id}/execute", post(workflows::execute))
        .route("/workflows/{id}/runs", get(workflows::list_runs))
        .route("/runs/{id}", get(runs::get))
        .route("/runs/{id}/events", get(runs::events))
        .route("/runs/{id}/cancel", post(runs::cancel))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ws", get(ws_handler))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let state = test_state();
        let app = build_router(state);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_then_create_workflow_roundtrips() {
        let state = test_state();
        let app = build_router(state);

        let register_body = serde_json::json!({
            "tenant_name": "Acme",
            "email": "owner@acme.test",
            "password": "a-strong-password",
        });
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/register")
                    .header("content-type", "application/json")
                    .body(Body::from(register_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let auth_resp: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let token = auth_resp["token"].as_str().unwrap();

        let workflow_body = serde_json::json!({
            "name": "Greeter",
            "definition": {
                "metadata": {"name": "Greeter", "version": 1},
                "nodes": {
                    "start": {
                        "id": "start",
                        "type": "TRANSFORM",
                        "config": {"template": {"greeting": "hello"}},
                        "next": [],
                    }
                },
                "edges": [],
                "entrypoint": "start",
            }
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/workflows")
                    .header("content-type", "application/json")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::from(workflow_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
