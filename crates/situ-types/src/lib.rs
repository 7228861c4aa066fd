//now people using the types library can use these types
pub mod caption;
pub mod chat;

//re-export types for easier access
pub use caption::{CaptionRequest, CreatePrediction, Prediction, PredictionInput, PredictionStatus};
pub use chat::error::{ErrorBody, ErrorDetails};
pub use chat::{ChatCompletion, ChatRequest, Choice, Message, MessageRole, Usage};
