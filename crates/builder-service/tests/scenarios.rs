//! HTTP-level coverage of the publish/serve and rollback scenarios against
//! the real router, with a `BuildWorker` pumping the in-memory build queue
//! the same way the binary does.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use builder_engine::worker::BuildWorker;
use builder_service::routes::build_router;
use builder_service::test_support::test_state;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

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

async fn create_site(app: &axum::Router, token: &str, subdomain: &str) -> serde_json::Value {
    let body = serde_json::json!({
        "name": "Acme Site",
        "slug": subdomain,
        "subdomain": subdomain,
    });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/sites")
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

async fn create_page(
    app: &axum::Router,
    token: &str,
    site_id: &str,
    path: &str,
    title: &str,
) -> serde_json::Value {
    let body = serde_json::json!({
        "path": path,
        "title": title,
        "content": {"sections": []},
        "is_published": true,
    });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/sites/{site_id}/pages"))
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

async fn publish(app: &axum::Router, token: &str, site_id: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/sites/{site_id}/publish"))
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get_serve(app: &axum::Router, path: &str) -> (StatusCode, String, Option<String>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let version = response
        .headers()
        .get("x-site-version")
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8_lossy(&bytes).to_string();
    (status, body, version)
}

/// Polls `GET /serve/{subdomain}` until the version header matches
/// `expected_version`, or panics once `timeout` elapses. Waits on the build
/// worker finishing the async build rather than assuming it already has.
async fn await_version(app: &axum::Router, subdomain: &str, expected_version: &str, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let (status, _, version) = get_serve(app, &format!("/serve/{subdomain}")).await;
        if status == StatusCode::OK && version.as_deref() == Some(expected_version) {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("serve/{subdomain} never reached version {expected_version} within {timeout:?} (last status {status}, version {version:?})");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// S4 — publish then serve: `/` and `/about` both resolve to their page
/// content with the version header set, and an unknown path 404s.
#[tokio::test]
async fn publish_then_serve_resolves_pages_and_404s_unknown_path() {
    let state = test_state();
    let app = build_router(state.clone());

    let shutdown = CancellationToken::new();
    let worker = BuildWorker::new(state.job_store.clone(), state.build_engine.clone())
        .with_resolver(state.resolver.clone());
    let worker_shutdown = shutdown.clone();
    let worker_handle = tokio::spawn(async move { worker.run(worker_shutdown).await });

    let token = register(&app).await;
    let site = create_site(&app, &token, "launch").await;
    let site_id = site["id"].as_str().unwrap().to_string();

    create_page(&app, &token, &site_id, "/", "Home").await;
    create_page(&app, &token, &site_id, "/about", "About").await;

    publish(&app, &token, &site_id).await;
    await_version(&app, "launch", "1", Duration::from_secs(5)).await;

    let (status, body, version) = get_serve(&app, "/serve/launch").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(version.as_deref(), Some("1"));
    assert!(body.contains("Home"));

    let (status, body, _) = get_serve(&app, "/serve/launch/about").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("About"));

    let (status, _, _) = get_serve(&app, "/serve/launch/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    shutdown.cancel();
    let _ = worker_handle.await;
}

/// S5 — rollback: after two publishes, rolling back to version 1 makes
/// `/serve/{subdomain}` return version 1's content again.
#[tokio::test]
async fn rollback_restores_the_earlier_version() {
    let state = test_state();
    let app = build_router(state.clone());

    let shutdown = CancellationToken::new();
    let worker = BuildWorker::new(state.job_store.clone(), state.build_engine.clone())
        .with_resolver(state.resolver.clone());
    let worker_shutdown = shutdown.clone();
    let worker_handle = tokio::spawn(async move { worker.run(worker_shutdown).await });

    let token = register(&app).await;
    let site = create_site(&app, &token, "rollback-me").await;
    let site_id = site["id"].as_str().unwrap().to_string();

    create_page(&app, &token, &site_id, "/", "Version One").await;

    let first = publish(&app, &token, &site_id).await;
    let v1_id = first["version"]["id"].as_str().unwrap().to_string();
    await_version(&app, "rollback-me", "1", Duration::from_secs(5)).await;

    create_page(&app, &token, &site_id, "/changelog", "Version Two").await;
    publish(&app, &token, &site_id).await;
    await_version(&app, "rollback-me", "2", Duration::from_secs(5)).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/sites/{site_id}/rollback"))
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::from(
                    serde_json::json!({"target_version_id": v1_id}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body, version) = get_serve(&app, "/serve/rollback-me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(version.as_deref(), Some("1"));
    assert!(body.contains("Version One"));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/sites/{site_id}/versions"))
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let versions: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let versions = versions.as_array().unwrap();
    let v1 = versions.iter().find(|v| v["version"] == 1).unwrap();
    let v2 = versions.iter().find(|v| v["version"] == 2).unwrap();
    assert_eq!(v1["status"], "READY");
    assert_eq!(v2["status"], "SUPERSEDED");

    shutdown.cancel();
    let _ = worker_handle.await;
}
