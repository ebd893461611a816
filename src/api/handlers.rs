use super::{ApiError, AppState, API_KEY_HEADER};
use crate::request::AnalysisRequest;
use crate::service::{AnalysisResponse, HealthReport};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.service.health().await)
}

/// Key check, admission, then body parsing.
pub async fn analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|k| !k.is_empty())
        .ok_or(ApiError::MissingApiKey)?;
    if !state.api_keys.contains(key) {
        return Err(ApiError::InvalidApiKey);
    }
    state.service.admit(key)?;

    let mut de = serde_json::Deserializer::from_slice(&body);
    let request: AnalysisRequest = serde_path_to_error::deserialize(&mut de).map_err(ApiError::malformed)?;
    de.end().map_err(|e| ApiError::Malformed {
        message: e.to_string(),
        field: None,
    })?;
    let response = state.service.analyze(request).await?;
    Ok(Json(response))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
