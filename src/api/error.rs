use crate::request::{FieldError, ValidationErrors};
use crate::service::ServiceError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("invalid API key")]
    InvalidApiKey,
    #[error("rate limit exceeded")]
    RateLimited { retry_after: Duration },
    /// Unparseable body; `field` is the JSON path where parsing stopped, if any.
    #[error("malformed request body: {message}")]
    Malformed { message: String, field: Option<String> },
    #[error("request validation failed")]
    Validation(ValidationErrors),
    #[error("not found")]
    NotFound,
}

/// Uniform error payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub status_code: u16,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

impl ApiError {
    pub fn malformed(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let path = err.path().to_string();
        ApiError::Malformed {
            message: err.inner().to_string(),
            field: (path != ".").then_some(path),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingApiKey => StatusCode::UNAUTHORIZED,
            ApiError::InvalidApiKey => StatusCode::FORBIDDEN,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Malformed { .. } | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::RateLimited { retry_after } => ApiError::RateLimited { retry_after },
            ServiceError::Validation(errors) => ApiError::Validation(errors),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match &self {
            // Whole seconds, rounded up
            ApiError::RateLimited { retry_after } => Some(retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0)),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            status_code: status.as_u16(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            details: match self {
                ApiError::Validation(v) => Some(v.errors),
                ApiError::Malformed {
                    message,
                    field: Some(field),
                } => Some(vec![FieldError { field, message }]),
                _ => None,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        response
    }
}
