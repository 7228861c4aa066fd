use crate::error::ClientError;
use secrecy::ExposeSecret;
use situ_types::{ChatCompletion, ChatRequest, ErrorBody, Message, Usage};
use std::sync::{Arc, Mutex, PoisonError};

mod config;
mod consts;
mod stats;

pub use config::{Config, ConfigBuilder};
pub use stats::Stats;

/// Client for an OpenAI-compatible chat completion endpoint.
pub struct ChatClient {
    http: reqwest::Client,
    config: Config,
    stats: Arc<Mutex<Stats>>,
}

impl ChatClient {
    pub fn new(config: Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            stats: Arc::new(Mutex::new(Stats::new())),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> Stats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sends `request` upstream as-is and returns the raw completion payload.
    pub async fn forward(&self, request: &ChatRequest) -> Result<serde_json::Value, ClientError> {
        tracing::debug!(
            "forwarding chat request: model={}, messages={}",
            request.model,
            request.messages.len()
        );

        let response = self
            .http
            .post(self.config.endpoint())
            .bearer_auth(self.config.api_key().expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // Keep the structured error when the upstream sent one.
            let details = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .map(|body| body.error);
            let message = details
                .as_ref()
                .map(|d| d.message().to_string())
                .unwrap_or(text);
            tracing::warn!("chat upstream returned {}: {}", status, message);
            return Err(ClientError::Upstream {
                status: status.as_u16(),
                message,
                details,
            });
        }

        let payload: serde_json::Value = serde_json::from_str(&text)?;
        let usage = payload
            .get("usage")
            .and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok());
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update_usage(usage);

        Ok(payload)
    }

    /// Single-turn completion of `prompt` with the configured model and
    /// temperature. Returns the first choice's content untouched.
    pub async fn complete(&self, prompt: &str) -> Result<String, ClientError> {
        let request = ChatRequest::new(self.config.model())
            .with_message(Message::user(prompt))
            .with_temperature(self.config.temperature());

        let payload = self.forward(&request).await?;
        let completion: ChatCompletion = serde_json::from_value(payload)?;

        completion
            .first_content()
            .map(str::to_string)
            .ok_or(ClientError::EmptyCompletion)
    }
}
