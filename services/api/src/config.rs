use secrecy::{ExposeSecret, SecretString};
use situ_client::{CaptionConfig, Config as ChatConfig};
use situ_core::SituationVariant;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub openai_api_key: SecretString,
    pub chat_endpoint: Option<String>,
    pub chat_model: String,
    pub chat_temperature: f32,
    /// Captioning is disabled when unset.
    pub replicate_api_token: Option<SecretString>,
    pub caption_base_url: Option<String>,
    pub caption_model_version: Option<String>,
    pub tick_interval: Duration,
    pub warmup: Duration,
    pub hand_window: Duration,
    pub prompts_dir: Option<PathBuf>,
    pub situation_variant: SituationVariant,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables, reading a `.env` file
    /// in the current directory first if there is one.
    ///
    /// *   `BIND_ADDRESS`: address and port to listen on. Defaults to "0.0.0.0:3000".
    /// *   `OPENAI_API_KEY`: key for the chat completion API. Required.
    /// *   `CHAT_ENDPOINT`: (Optional) completions URL, for compatible upstreams.
    /// *   `CHAT_MODEL`: (Optional) Defaults to "gpt-4o".
    /// *   `CHAT_TEMPERATURE`: (Optional) Defaults to 0.0.
    /// *   `REPLICATE_API_TOKEN`: (Optional) key for the caption model.
    /// *   `CAPTION_BASE_URL`, `CAPTION_MODEL_VERSION`: (Optional) caption upstream overrides.
    /// *   `TICK_INTERVAL_MS`: (Optional) orchestration period. Defaults to 100.
    /// *   `WARMUP_MS`: (Optional) delay before the first tick. Defaults to 5000.
    /// *   `HAND_WINDOW_MS`: (Optional) hand presence window. Defaults to 2000.
    /// *   `PROMPTS_DIR`: (Optional) directory of `.md` prompt overrides.
    /// *   `SITUATION_PROMPT`: (Optional) "reasoning" or "short". Defaults to "reasoning".
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_address = var("BIND_ADDRESS")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let openai_api_key = var("OPENAI_API_KEY")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let chat_temperature = match var("CHAT_TEMPERATURE") {
            Some(raw) => raw
                .parse::<f32>()
                .ok()
                .filter(|t| t.is_finite() && *t >= 0.0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "CHAT_TEMPERATURE".to_string(),
                        format!("'{}' is not a non-negative number", raw),
                    )
                })?,
            None => 0.0,
        };

        let tick_interval = millis(&var, "TICK_INTERVAL_MS", 100)?;
        if tick_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "TICK_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let situation_variant = match var("SITUATION_PROMPT") {
            Some(raw) => raw
                .parse::<SituationVariant>()
                .map_err(|e| ConfigError::InvalidValue("SITUATION_PROMPT".to_string(), e))?,
            None => SituationVariant::default(),
        };

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            openai_api_key,
            chat_endpoint: var("CHAT_ENDPOINT"),
            chat_model: var("CHAT_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
            chat_temperature,
            replicate_api_token: var("REPLICATE_API_TOKEN").map(SecretString::from),
            caption_base_url: var("CAPTION_BASE_URL"),
            caption_model_version: var("CAPTION_MODEL_VERSION"),
            tick_interval,
            warmup: millis(&var, "WARMUP_MS", 5000)?,
            hand_window: millis(&var, "HAND_WINDOW_MS", 2000)?,
            prompts_dir: var("PROMPTS_DIR").map(PathBuf::from),
            situation_variant,
            log_level,
        })
    }

    pub fn chat_config(&self) -> ChatConfig {
        let mut builder = ChatConfig::builder()
            .with_api_key(self.openai_api_key.expose_secret())
            .with_model(&self.chat_model)
            .with_temperature(self.chat_temperature);
        if let Some(endpoint) = &self.chat_endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        builder.build()
    }

    /// `None` when no caption token is configured.
    pub fn caption_config(&self) -> Option<CaptionConfig> {
        let token = self.replicate_api_token.as_ref()?;
        let mut builder = CaptionConfig::builder().with_api_token(token.expose_secret());
        if let Some(base_url) = &self.caption_base_url {
            builder = builder.with_base_url(base_url);
        }
        if let Some(version) = &self.caption_model_version {
            builder = builder.with_model_version(version);
        }
        Some(builder.build())
    }
}

fn millis(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(Duration::from_millis(default)),
    }
}
