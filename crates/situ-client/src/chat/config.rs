use super::consts;
use secrecy::SecretString;

pub struct Config {
    endpoint: String,
    api_key: SecretString,
    model: String,
    temperature: f32,
}

pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    /// Full URL of the completions endpoint. Point this at a `/api/chat`
    /// proxy to keep the key off the calling host.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.config.endpoint = endpoint.to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.config.api_key = SecretString::from(api_key.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    // Defaults, with the key taken from the environment when present.
    pub fn new() -> Self {
        Self {
            endpoint: consts::CHAT_COMPLETIONS_URL.to_string(),
            api_key: std::env::var(consts::OPENAI_API_KEY)
                .unwrap_or_default()
                .into(),
            model: consts::DEFAULT_MODEL.to_string(),
            temperature: consts::DEFAULT_TEMPERATURE,
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}
