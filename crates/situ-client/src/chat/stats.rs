use situ_types::Usage;

/// Running token totals across every completion made by one client.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    requests: u64,
    total_tokens: u64,
    input_tokens: u64,
    output_tokens: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn update_usage(&mut self, usage: Option<Usage>) {
        self.requests += 1;
        if let Some(usage) = usage {
            self.total_tokens += u64::from(usage.total_tokens);
            self.input_tokens += u64::from(usage.prompt_tokens);
            self.output_tokens += u64::from(usage.completion_tokens);
        }
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }
}
