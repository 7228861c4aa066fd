/// The `{"error": {...}}` envelope returned by the chat completion API.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetails,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorDetails {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    param: Option<String>,
}

impl ErrorDetails {
    pub fn error_type(&self) -> Option<&str> {
        self.error_type.as_deref()
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }
}

impl ErrorDetails {
    pub fn new(message: &str) -> Self {
        Self {
            error_type: None,
            code: None,
            message: message.to_string(),
            param: None,
        }
    }

    pub fn with_type(mut self, error_type: &str) -> Self {
        self.error_type = Some(error_type.to_string());
        self
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    pub fn with_param(mut self, param: &str) -> Self {
        self.param = Some(param.to_string());
        self
    }
}

impl ErrorBody {
    pub fn new(error: ErrorDetails) -> Self {
        Self { error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upstream_error_envelope() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"error":{"message":"Invalid model","type":"invalid_request_error","param":"model","code":null}}"#,
        )
        .unwrap();

        assert_eq!(body.error.message(), "Invalid model");
        assert_eq!(body.error.error_type(), Some("invalid_request_error"));
        assert_eq!(body.error.param(), Some("model"));
        assert_eq!(body.error.code(), None);
    }

    #[test]
    fn message_only_error_skips_empty_fields() {
        let body = ErrorBody::new(ErrorDetails::new("upstream unreachable"));
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"error":{"message":"upstream unreachable"}}"#);
    }
}
