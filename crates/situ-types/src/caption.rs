use serde_json::{Map, Value};

/// Body of a `/imageCaption` call.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CaptionRequest {
    /// The frame as a data URL (`data:image/png;base64,...`).
    pub image: String,
    /// `true` asks for a free caption, `false` answers `question` instead.
    #[serde(default)]
    pub caption: bool,
    #[serde(default)]
    pub question: String,
}

impl CaptionRequest {
    pub fn scene(image: &str) -> Self {
        Self {
            image: image.to_string(),
            caption: true,
            question: String::new(),
        }
    }

    pub fn question(image: &str, question: &str) -> Self {
        Self {
            image: image.to_string(),
            caption: false,
            question: question.to_string(),
        }
    }
}

/// Input block of a prediction job.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PredictionInput {
    pub image: String,
    pub caption: bool,
    pub question: String,
}

impl From<&CaptionRequest> for PredictionInput {
    fn from(request: &CaptionRequest) -> Self {
        Self {
            image: request.image.clone(),
            caption: request.caption,
            question: request.question.clone(),
        }
    }
}

/// `POST /predictions` body.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CreatePrediction<'a> {
    pub version: &'a str,
    pub input: PredictionInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PredictionStatus::Succeeded | PredictionStatus::Failed | PredictionStatus::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::Starting => "starting",
            PredictionStatus::Processing => "processing",
            PredictionStatus::Succeeded => "succeeded",
            PredictionStatus::Failed => "failed",
            PredictionStatus::Canceled => "canceled",
            PredictionStatus::Unknown => "unknown",
        }
    }
}

/// A caption prediction job. Fields the service does not read are kept in
/// `extra` so the terminal payload is returned to callers unchanged.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Prediction {
    /// The output as caption text. BLIP-2 returns a plain string; anything
    /// else is rendered as JSON.
    pub fn output_text(&self) -> Option<String> {
        match self.output.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
