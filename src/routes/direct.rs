//! Ext Direct routes.

use crate::handlers::direct::{api, route};
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};
use tower_http::limit::RequestBodyLimitLayer;

/// POST {url} and GET {url}/api for the state's `DirectConfig`, with request bodies capped at
/// `body_limit` bytes.
pub fn direct_routes(state: AppState, body_limit: usize) -> Router {
    let url = state.direct.url.clone();
    Router::new()
        .route(&url, post(route))
        .route(&format!("{}/api", url), get(api))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
