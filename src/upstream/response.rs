//! Decoded upstream responses.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::upstream::error::{UpstreamError, UpstreamResult};

/// Response body, decoded according to the content type.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
}

impl ResponseBody {
    /// Decode raw bytes. JSON content types must carry valid JSON.
    pub fn decode(content_type: Option<&str>, bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let is_json = content_type
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);

        if is_json {
            serde_json::from_slice(bytes).map(ResponseBody::Json)
        } else {
            Ok(ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned()))
        }
    }

    /// Error bodies are best-effort: JSON when it parses, `{"error": text}` otherwise.
    pub fn decode_error(bytes: &[u8]) -> serde_json::Value {
        serde_json::from_slice(bytes).unwrap_or_else(|_| {
            serde_json::json!({ "error": String::from_utf8_lossy(bytes) })
        })
    }

    /// JSON view of the body; text bodies become `{"content": text}`.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => serde_json::json!({ "content": text }),
        }
    }
}

/// Result of a successful upstream attempt.
#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub status: StatusCode,
    pub body: ResponseBody,
    pub headers: HeaderMap,
}

impl ParsedResponse {
    pub fn json(status: StatusCode, body: serde_json::Value) -> Self {
        Self {
            status,
            body: ResponseBody::Json(body),
            headers: HeaderMap::new(),
        }
    }

    /// Deserialize the body into a typed payload.
    ///
    /// Shape mismatches are response validation errors.
    pub fn parse<T: DeserializeOwned>(self, service: &str) -> UpstreamResult<T> {
        match self.body {
            ResponseBody::Json(value) => serde_json::from_value(value).map_err(|e| {
                UpstreamError::response_validation(service, format!("Invalid response format: {}", e))
            }),
            ResponseBody::Text(_) => Err(UpstreamError::response_validation(
                service,
                "Expected a JSON response body",
            )),
        }
    }
}
