use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use situ_client::ClientError;
use situ_client::types::ErrorBody;

/// Errors returned by the HTTP handlers, rendered as `{"error": {...}}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("caption service is not configured")]
    CaptionUnavailable,
    #[error(transparent)]
    Upstream(#[from] ClientError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::CaptionUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(e) => match e {
                ClientError::Upstream {
                    details: Some(_), ..
                } => StatusCode::BAD_REQUEST,
                ClientError::PredictionFailed { .. } => StatusCode::BAD_GATEWAY,
                ClientError::PollExhausted { .. } => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::warn!("request rejected: {}", self);
        }

        let body = match self {
            // Pass the upstream's own error object through untouched.
            ApiError::Upstream(ClientError::Upstream {
                details: Some(details),
                ..
            }) => json!(ErrorBody::new(details)),
            other => json!({ "error": { "message": other.to_string() } }),
        };
        (status, Json(body)).into_response()
    }
}
