//! HTTP surface: `POST /api/v1/analyze` and `GET /health`.

mod error;
mod handlers;

pub use error::{ApiError, ErrorBody};

use crate::service::RiskService;
use axum::routing::{get, post};
use axum::Router;
use std::collections::HashSet;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RiskService>,
    pub api_keys: Arc<HashSet<String>>,
}

impl AppState {
    pub fn new(service: Arc<RiskService>, api_keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            service,
            api_keys: Arc::new(api_keys.into_iter().collect()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/analyze", post(handlers::analyze))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
