//! Per-client rate limiting middleware (§6 "100 req/min per client" default).
//!
//! Keyed on the bearer token when present (so a tenant's limiter budget
//! follows the caller across connections) and falls back to the remote
//! socket address for unauthenticated requests like `/auth/login`.

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

use crate::error::ApiError;
use crate::state::SharedState;

fn client_key(req: &Request) -> String {
    req.headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_key(&req);
    if !state.rate_limiter.check(&key) {
        return Err(ApiError::RateLimit);
    }
    Ok(next.run(req).await)
}
