//! Serving layer: maps request paths to cache keys.

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::cache::DefinitionCache;

/// Every request resolves against the cache: the path minus its
/// leading separator is the cache key.
pub fn router(cache: DefinitionCache) -> Router {
    Router::new().fallback(serve_definition).with_state(cache)
}

async fn serve_definition(State(cache): State<DefinitionCache>, uri: Uri) -> Response {
    let filename = uri.path().trim_start_matches('/');
    match cache.get(filename) {
        Some(bytes) => {
            debug!(filename, "serving cached definition");
            ([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response()
        }
        None => {
            warn!(filename, "cache miss");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
