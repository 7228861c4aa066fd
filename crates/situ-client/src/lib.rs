mod caption;
mod chat;
mod error;

pub use situ_types as types;
pub use caption::{CaptionClient, CaptionConfig, CaptionConfigBuilder, PollPolicy};
pub use chat::{ChatClient, Config, ConfigBuilder, Stats};
pub use error::ClientError;
