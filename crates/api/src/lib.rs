//! Axum HTTP front-end: `/manifest.json` and `/stream/:type/:id`, wrapped in
//! the tracing/CORS/timeout middleware stack the rest of the addon protocol
//! expects.

pub mod error;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use streamforge_aggregator::Aggregator;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
}

/// Build the router; `request_timeout` should sit slightly above the
/// Aggregator's own fan-out deadline so the HTTP layer's timeout never
/// fires first.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/manifest.json", get(manifest).options(preflight))
        .route("/stream/:media_type/:id", get(stream).options(preflight))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(tower_http::cors::Any)
                        .allow_methods([Method::GET, Method::OPTIONS]),
                )
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

/// `CorsLayer` handles preflight negotiation but answers it with a bare
/// `200`; the addon protocol requires `OPTIONS` itself to come back `204`,
/// so this route answers it directly rather than falling through.
async fn preflight() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert("Allow", HeaderValue::from_static("GET, OPTIONS"));
    response
}

async fn manifest() -> Json<Value> {
    Json(json!({
        "id": "org.streamforge.resolver",
        "version": "1.0.0",
        "name": "Streamforge",
        "description": "Aggregated torrent streams for movies and series",
        "resources": ["stream"],
        "types": ["movie", "series"],
        "idPrefixes": ["tt"],
        "catalogs": [],
        "behaviorHints": { "p2p": true },
    }))
}

async fn stream(
    State(state): State<AppState>,
    Path((media_type, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let id = id.strip_suffix(".json").unwrap_or(&id);
    let response = state.aggregator.handle_stream(&media_type, id).await?;
    Ok(Json(serde_json::to_value(response).unwrap_or_else(|_| json!({ "streams": [] }))))
}
