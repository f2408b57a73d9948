//! HTTP-level coverage of the run-lifecycle scenarios (linear execution,
//! condition branching, mid-run cancellation) against the real router, with
//! a `StepWorker` pumping the in-memory job queue the same way the binary
//! does.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use workflow_engine::worker::StepWorker;
use workflow_service::routes::build_router;
use workflow_service::test_support::test_state;

async fn register(app: &axum::Router) -> String {
    let body = serde_json::json!({
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
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    parsed["token"].as_str().unwrap().to_string()
}

async fn create_workflow(app: &axum::Router, token: &str, definition: serde_json::Value) -> serde_json::Value {
    let body = serde_json::json!({"name": "scenario", "definition": definition});
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/workflows")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn execute(app: &axum::Router, token: &str, workflow_id: &str, input: serde_json::Value) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/workflows/{workflow_id}/execute"))
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::from(serde_json::json!({"input": input}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get_run(app: &axum::Router, token: &str, run_id: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/runs/{run_id}"))
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Polls `GET /runs/{id}` until `run.status` leaves `RUNNING`, or panics
/// once `timeout` elapses.
async fn await_terminal(app: &axum::Router, token: &str, run_id: &str, timeout: Duration) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let detail = get_run(app, token, run_id).await;
        let status = detail["run"]["status"].as_str().unwrap();
        if status != "RUNNING" {
            return detail;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("run {run_id} did not reach a terminal status within {timeout:?}: {detail}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// S1 — linear `a -> b -> c` TRANSFORM chain completes in order.
#[tokio::test]
async fn linear_workflow_completes() {
    let state = test_state();
    let app = build_router(state.clone());

    let shutdown = CancellationToken::new();
    let worker = StepWorker::new(
        state.job_store.clone(),
        state.engine.clone(),
        state.runs.clone(),
        state.steps.clone(),
    );
    let worker_shutdown = shutdown.clone();
    let worker_handle = tokio::spawn(async move { worker.run(worker_shutdown).await });

    let token = register(&app).await;
    let definition = serde_json::json!({
        "metadata": {"name": "linear", "version": 1},
        "nodes": {
            "a": {"id": "a", "type": "TRANSFORM", "config": {"template": {}}, "next": ["b"]},
            "b": {"id": "b", "type": "TRANSFORM", "config": {"template": {}}, "next": ["c"]},
            "c": {"id": "c", "type": "TRANSFORM", "config": {"template": {}}, "next": []},
        },
        "edges": [],
        "entrypoint": "a",
    });
    let workflow = create_workflow(&app, &token, definition).await;
    let workflow_id = workflow["id"].as_str().unwrap().to_string();

    let run = execute(&app, &token, &workflow_id, serde_json::json!({"x": 1})).await;
    let run_id = run["run"]["id"].as_str().unwrap().to_string();

    let detail = await_terminal(&app, &token, &run_id, Duration::from_secs(5)).await;
    assert_eq!(detail["run"]["status"], "COMPLETED");
    let steps = detail["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 3);
    assert!(steps.iter().all(|s| s["status"] == "COMPLETED"));

    shutdown.cancel();
    let _ = worker_handle.await;
}

/// S2 — the untaken `CONDITION` branch ends `SKIPPED`, not stuck `PENDING`.
#[tokio::test]
async fn condition_branch_skips_the_untaken_edge() {
    let state = test_state();
    let app = build_router(state.clone());

    let shutdown = CancellationToken::new();
    let worker = StepWorker::new(
        state.job_store.clone(),
        state.engine.clone(),
        state.runs.clone(),
        state.steps.clone(),
    );
    let worker_shutdown = shutdown.clone();
    let worker_handle = tokio::spawn(async move { worker.run(worker_shutdown).await });

    let token = register(&app).await;
    let definition = serde_json::json!({
        "metadata": {"name": "branch", "version": 1},
        "nodes": {
            "check": {
                "id": "check",
                "type": "CONDITION",
                "config": {"expression": "input.value > 10", "true_branch": "hi", "false_branch": "lo"},
                "next": [],
            },
            "hi": {"id": "hi", "type": "TRANSFORM", "config": {"template": {}}, "next": []},
            "lo": {"id": "lo", "type": "TRANSFORM", "config": {"template": {}}, "next": []},
        },
        "edges": [],
        "entrypoint": "check",
    });
    let workflow = create_workflow(&app, &token, definition).await;
    let workflow_id = workflow["id"].as_str().unwrap().to_string();

    let run = execute(&app, &token, &workflow_id, serde_json::json!({"value": 20})).await;
    let run_id = run["run"]["id"].as_str().unwrap().to_string();

    let detail = await_terminal(&app, &token, &run_id, Duration::from_secs(5)).await;
    assert_eq!(detail["run"]["status"], "COMPLETED");
    let steps = detail["steps"].as_array().unwrap();
    let lo = steps.iter().find(|s| s["step_key"] == "lo").unwrap();
    assert_eq!(lo["status"], "SKIPPED");
    let hi = steps.iter().find(|s| s["step_key"] == "hi").unwrap();
    assert_eq!(hi["status"], "COMPLETED");

    shutdown.cancel();
    let _ = worker_handle.await;
}

/// S6 — cancelling mid-run skips every step still in flight and emits no
/// further completion.
#[tokio::test]
async fn cancel_mid_run_skips_remaining_steps() {
    let state = test_state();
    let app = build_router(state.clone());

    let token = register(&app).await;
    let definition = serde_json::json!({
        "metadata": {"name": "delayed", "version": 1},
        "nodes": {
            "wait": {"id": "wait", "type": "DELAY", "config": {"delay_ms": 10_000}, "next": []},
        },
        "edges": [],
        "entrypoint": "wait",
    });
    let workflow = create_workflow(&app, &token, definition).await;
    let workflow_id = workflow["id"].as_str().unwrap().to_string();

    // No worker is started: the entrypoint job sits on the queue
    // untouched, exactly like a step still in flight when cancel arrives.
    let run = execute(&app, &token, &workflow_id, serde_json::json!({})).await;
    let run_id = run["run"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/runs/{run_id}/cancel"))
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let detail = get_run(&app, &token, &run_id).await;
    assert_eq!(detail["run"]["status"], "CANCELLED");
    let steps = detail["steps"].as_array().unwrap();
    assert!(steps.iter().all(|s| s["status"] == "SKIPPED"));
}
