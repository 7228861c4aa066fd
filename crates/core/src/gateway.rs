use anyhow::{Context, Result, bail};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use situ_client::ChatClient;
use std::sync::Arc;

/// Phrase that marks a canned model refusal.
const REFUSAL_MARKER: &str = "AI language model";

// Everything the orchestration loop needs from a language model: one prompt
// in, one line of text out. Keeping it behind a trait lets the loop run against
// the real chat API, the `/api/chat` proxy, or a mock in tests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InferenceGateway: Send + Sync {
    /// Completes `prompt`. Implementations reject an empty prompt and return
    /// text that has been through [`sanitize_completion`].
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
impl<G: InferenceGateway + ?Sized> InferenceGateway for Arc<G> {
    async fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt).await
    }
}

/// Flattens line breaks to spaces and blanks out refusals.
pub fn sanitize_completion(raw: &str) -> String {
    if raw.contains(REFUSAL_MARKER) {
        return String::new();
    }
    raw.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// [`InferenceGateway`] over the chat completion client.
pub struct ChatGateway {
    client: Arc<ChatClient>,
}

impl ChatGateway {
    pub fn new(client: Arc<ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl InferenceGateway for ChatGateway {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            bail!("refusing to send an empty prompt");
        }

        let raw = self
            .client
            .complete(prompt)
            .await
            .context("chat completion failed")?;
        tracing::trace!("completion: {}", raw);

        let text = sanitize_completion(&raw);
        if text.is_empty() {
            tracing::warn!("completion was empty or a refusal");
        }
        Ok(text)
    }
}
