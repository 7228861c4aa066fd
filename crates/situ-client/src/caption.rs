use crate::error::ClientError;
use secrecy::ExposeSecret;
use situ_types::{CaptionRequest, CreatePrediction, Prediction, PredictionInput, PredictionStatus};

mod config;

pub use config::{CaptionConfig, CaptionConfigBuilder, PollPolicy};

/// Client for an asynchronous prediction API (image captioning).
///
/// A caption is a two-step job: create a prediction, then poll it until it
/// reaches a terminal state.
pub struct CaptionClient {
    http: reqwest::Client,
    config: CaptionConfig,
}

impl CaptionClient {
    pub fn new(config: CaptionConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &CaptionConfig {
        &self.config
    }

    /// Runs a caption job to completion and returns the terminal payload.
    pub async fn caption(&self, request: &CaptionRequest) -> Result<Prediction, ClientError> {
        let created = self.create_prediction(request).await?;
        tracing::debug!("created prediction {} ({})", created.id, created.status.as_str());
        self.wait_for(created).await
    }

    pub async fn create_prediction(
        &self,
        request: &CaptionRequest,
    ) -> Result<Prediction, ClientError> {
        let body = CreatePrediction {
            version: self.config.model_version(),
            input: PredictionInput::from(request),
        };
        let response = self
            .http
            .post(format!("{}/predictions", self.config.base_url()))
            .header(
                "Authorization",
                format!("Token {}", self.config.api_token().expose_secret()),
            )
            .json(&body)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn get_prediction(&self, id: &str) -> Result<Prediction, ClientError> {
        let response = self
            .http
            .get(format!("{}/predictions/{}", self.config.base_url(), id))
            .header(
                "Authorization",
                format!("Token {}", self.config.api_token().expose_secret()),
            )
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Polls `prediction` until it succeeds, fails, or the attempt cap is hit.
    pub async fn wait_for(&self, prediction: Prediction) -> Result<Prediction, ClientError> {
        let policy = *self.config.poll();
        let mut current = prediction;
        let mut attempts = 0;

        loop {
            match current.status {
                PredictionStatus::Succeeded => return Ok(current),
                PredictionStatus::Failed | PredictionStatus::Canceled => {
                    tracing::warn!(
                        "prediction {} ended with status {}",
                        current.id,
                        current.status.as_str()
                    );
                    return Err(ClientError::PredictionFailed {
                        id: current.id,
                        status: current.status,
                        error: current.error,
                    });
                }
                _ => {}
            }

            if attempts >= policy.max_attempts {
                return Err(ClientError::PollExhausted {
                    id: current.id,
                    attempts,
                });
            }

            attempts += 1;
            tokio::time::sleep(policy.delay_for(attempts)).await;
            tracing::trace!("polling prediction {} (attempt {})", current.id, attempts);
            current = self.get_prediction(&current.id).await?;
        }
    }

    async fn decode(response: reqwest::Response) -> Result<Prediction, ClientError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Upstream {
                status: status.as_u16(),
                message: text,
                details: None,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::extract::{Path, State};
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(3),
        }
    }

    fn client_for(base: &str, max_attempts: u32) -> CaptionClient {
        CaptionClient::new(
            CaptionConfig::builder()
                .with_base_url(base)
                .with_api_token("r8-test")
                .with_model_version("v1")
                .with_poll_policy(fast_policy(max_attempts))
                .build(),
        )
    }

    /// Upstream whose predictions stay `processing` for `pending_polls` polls
    /// and then settle on `final_status`.
    fn upstream(pending_polls: u32, final_status: &'static str, polls: Arc<AtomicU32>) -> Router {
        Router::new()
            .route(
                "/predictions",
                post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                    assert_eq!(headers["authorization"], "Token r8-test");
                    assert_eq!(body["version"], "v1");
                    assert_eq!(body["input"]["caption"], json!(false));
                    assert_eq!(body["input"]["question"], "What are the hands doing?");
                    Json(json!({"id": "p1", "status": "starting"}))
                }),
            )
            .route(
                "/predictions/{id}",
                get(
                    move |State(polls): State<Arc<AtomicU32>>, Path(id): Path<String>| async move {
                        let n = polls.fetch_add(1, Ordering::SeqCst) + 1;
                        if n <= pending_polls {
                            Json(json!({"id": id, "status": "processing"}))
                        } else {
                            Json(json!({"id": id, "status": final_status, "output": "typing on a keyboard"}))
                        }
                    },
                ),
            )
            .with_state(polls)
    }

    #[tokio::test]
    async fn polls_until_succeeded() {
        let polls = Arc::new(AtomicU32::new(0));
        let client = client_for(&serve(upstream(2, "succeeded", polls.clone())).await, 10);

        let prediction = client
            .caption(&CaptionRequest::question("data:image/png;base64,AA", "What are the hands doing?"))
            .await
            .unwrap();

        assert_eq!(prediction.status, PredictionStatus::Succeeded);
        assert_eq!(prediction.output_text().as_deref(), Some("typing on a keyboard"));
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_prediction_is_an_error() {
        let polls = Arc::new(AtomicU32::new(0));
        let client = client_for(&serve(upstream(0, "failed", polls)).await, 10);

        let err = client
            .caption(&CaptionRequest::question("data:image/png;base64,AA", "What are the hands doing?"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::PredictionFailed { status: PredictionStatus::Failed, .. }
        ));
    }

    #[tokio::test]
    async fn canceled_prediction_is_an_error() {
        let polls = Arc::new(AtomicU32::new(0));
        let client = client_for(&serve(upstream(1, "canceled", polls)).await, 10);

        let err = client
            .caption(&CaptionRequest::question("data:image/png;base64,AA", "What are the hands doing?"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::PredictionFailed { status: PredictionStatus::Canceled, .. }
        ));
    }

    #[tokio::test]
    async fn gives_up_after_attempt_cap() {
        let polls = Arc::new(AtomicU32::new(0));
        let client = client_for(&serve(upstream(100, "succeeded", polls.clone())).await, 3);

        let err = client
            .caption(&CaptionRequest::question("data:image/png;base64,AA", "What are the hands doing?"))
            .await
            .unwrap_err();

        match err {
            ClientError::PollExhausted { id, attempts } => {
                assert_eq!(id, "p1");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected poll exhaustion, got {other:?}"),
        }
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn already_terminal_prediction_is_not_polled() {
        let client = client_for("http://127.0.0.1:9", 3);
        let done: Prediction =
            serde_json::from_value(json!({"id": "p9", "status": "succeeded", "output": "a kitchen"})).unwrap();

        let prediction = client.wait_for(done).await.unwrap();
        assert_eq!(prediction.output_text().as_deref(), Some("a kitchen"));
    }
}
