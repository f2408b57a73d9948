//! `GET /serve/{subdomain}[/{...path}]` (§4.5): public, unauthenticated
//! artifact serving through the `SiteResolver`.

use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use builder_engine::resolver::ResolveError;

use crate::state::SharedState;

pub async fn serve_root(
    State(state): State<SharedState>,
    Path(subdomain): Path<String>,
) -> Response {
    serve(state, subdomain, String::new()).await
}

pub async fn serve_path(
    State(state): State<SharedState>,
    Path((subdomain, path)): Path<(String, String)>,
) -> Response {
    serve(state, subdomain, path).await
}

async fn serve(state: SharedState, subdomain: String, path: String) -> Response {
    let request_path = if path.is_empty() {
        "/".to_string()
    } else {
        format!("/{path}")
    };

    match state.resolver.resolve(&subdomain, &request_path).await {
        Ok(resolved) => {
            let mut response = resolved.object.bytes.into_response();
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&resolved.object.content_type) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            if let Ok(value) = HeaderValue::from_str(resolved.cache_control) {
                headers.insert(header::CACHE_CONTROL, value);
            }
            if let Ok(value) = HeaderValue::from_str(&resolved.version.to_string()) {
                headers.insert("x-site-version", value);
            }
            response
        }
        Err(ResolveError::NotFound) | Err(ResolveError::SiteNotFound) | Err(ResolveError::NoActiveVersion) => {
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
        Err(err) => {
            tracing::error!(%err, "serve resolution failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}
