use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Internal,
}

/// JSON error body returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: Some(code),
        }
    }

    /// Body of the catch-all 404 for unknown paths.
    pub fn not_found() -> Self {
        Self {
            error: "Not found".into(),
            code: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catch_all_body_carries_only_the_message() {
        let body = serde_json::to_value(ApiError::not_found()).expect("json");
        assert_eq!(body, serde_json::json!({ "error": "Not found" }));
    }

    #[test]
    fn bodies_without_code_still_parse() {
        let error: ApiError =
            serde_json::from_str(r#"{"error":"Internal server error"}"#).expect("parse");
        assert_eq!(error.code, None);
        assert_eq!(error.error, "Internal server error");
    }
}
