use secrecy::SecretString;
use std::time::Duration;

pub const REPLICATE_API_TOKEN: &str = "REPLICATE_API_TOKEN";
pub const PREDICTIONS_BASE_URL: &str = "https://api.replicate.com/v1";
/// BLIP-2 image captioning / visual question answering.
pub const BLIP2_VERSION: &str = "4b32258c42e9efd4288bb9910bc532a69727f9acd26aa08e175713a0a857a608";

/// Bounded polling with capped linear backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl PollPolicy {
    /// Delay before poll number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(attempt.max(1))
            .min(self.max_delay)
    }
}

pub struct CaptionConfig {
    base_url: String,
    api_token: SecretString,
    model_version: String,
    poll: PollPolicy,
}

pub struct CaptionConfigBuilder {
    config: CaptionConfig,
}

impl Default for CaptionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptionConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CaptionConfig::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_token(mut self, api_token: &str) -> Self {
        self.config.api_token = SecretString::from(api_token.to_string());
        self
    }

    pub fn with_model_version(mut self, model_version: &str) -> Self {
        self.config.model_version = model_version.to_string();
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.config.poll = poll;
        self
    }

    pub fn build(self) -> CaptionConfig {
        self.config
    }
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptionConfig {
    pub fn new() -> Self {
        Self {
            base_url: PREDICTIONS_BASE_URL.to_string(),
            api_token: std::env::var(REPLICATE_API_TOKEN)
                .unwrap_or_default()
                .into(),
            model_version: BLIP2_VERSION.to_string(),
            poll: PollPolicy::default(),
        }
    }

    pub fn builder() -> CaptionConfigBuilder {
        CaptionConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_token(&self) -> &SecretString {
        &self.api_token
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn poll(&self) -> &PollPolicy {
        &self.poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_linearly_then_caps() {
        let policy = PollPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(4), Duration::from_secs(1));
        assert_eq!(policy.delay_for(8), Duration::from_secs(2));
        assert_eq!(policy.delay_for(30), Duration::from_secs(2));
    }
}
