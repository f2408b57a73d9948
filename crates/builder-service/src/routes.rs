//! Composes the full `/api` + public `/serve` + `/health` router (§6).

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, health, pages, publish, serve, sites};
use crate::ratelimit::rate_limit;
use crate::state::SharedState;

pub fn build_router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/sites", get(sites::list).post(sites::create))
        .route(
            "/sites/{id}",
            get(sites::get).put(sites::update).delete(sites::delete),
        )
        .route("/sites/{id}/publish", post(publish::publish))
        .route("/sites/{id}/rollback", post(publish::rollback))
        .route("/sites/{id}/versions", get(publish::versions))
        .route("/sites/{id}/pages", get(pages::list).post(pages::create))
        .route(
            "/sites/{id}/pages/{page_id}",
            axum::routing::put(pages::update).delete(pages::delete),
        )
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit));

    // The public artifact route carries no bearer token; it is still
    // subject to the rate limiter, keyed by remote address (§4.5, §6).
    let public = Router::new()
        .route("/serve/{subdomain}", get(serve::serve_root))
        .route("/serve/{subdomain}/{*path}", get(serve::serve_path))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api)
        .merge(public)
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
    async fn unknown_subdomain_serves_404() {
        let state = test_state();
        let app = build_router(state);
        let response = app
            .oneshot(Request::builder().uri("/serve/ghost").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn register_then_create_site_roundtrips() {
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

        let site_body = serde_json::json!({
            "name": "Acme Site",
            "slug": "acme-site",
            "subdomain": "acme",
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/sites")
                    .header("content-type", "application/json")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::from(site_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
