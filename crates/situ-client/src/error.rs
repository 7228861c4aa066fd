use situ_types::{ErrorDetails, PredictionStatus};

/// Failures of the upstream chat and caption APIs.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decode upstream payload: {0}")]
    Decode(#[from] serde_json::Error),
    /// Non-2xx response. `details` is set when the upstream sent a structured
    /// `{"error": {...}}` body.
    #[error("upstream returned {status}: {message}")]
    Upstream {
        status: u16,
        message: String,
        details: Option<ErrorDetails>,
    },
    #[error("upstream returned no completion choices")]
    EmptyCompletion,
    #[error("prediction {id} ended with status {}", status.as_str())]
    PredictionFailed {
        id: String,
        status: PredictionStatus,
        error: Option<serde_json::Value>,
    },
    #[error("prediction {id} not finished after {attempts} polls")]
    PollExhausted { id: String, attempts: u32 },
}
