//! Error kinds surfaced by collection operations.
//!
//! Two kinds matter to a screen: the backend rejected the payload
//! (`ValidationError`, possibly blaming specific fields) or the request could
//! not be completed (`FetchError`). Both leave local state untouched and map
//! to a single human-readable message via [`CollectionError::user_message`].
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Backend rejection of a payload (400/422-class response).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub message: Option<String>,
    /// Field name -> messages blaming that field.
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    /// Parse a rejection body. Accepts `{"message": .., "errors": {field: msg | [msg]}}`
    /// and FastAPI's `{"detail": [{"loc": [.., field], "msg": ..}]}`.
    pub fn from_body(body: &str) -> Self {
        let Ok(json) = serde_json::from_str::<Value>(body) else {
            return Self {
                message: plain_text_message(body),
                fields: BTreeMap::new(),
            };
        };

        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for key in ["errors", "fields"] {
            if let Some(Value::Object(map)) = json.get(key) {
                for (field, msgs) in map {
                    let entry = fields.entry(field.clone()).or_default();
                    match msgs {
                        Value::String(s) => entry.push(s.clone()),
                        Value::Array(items) => entry.extend(
                            items.iter().filter_map(Value::as_str).map(str::to_string),
                        ),
                        _ => {}
                    }
                }
            }
        }
        if let Some(Value::Array(details)) = json.get("detail") {
            for detail in details {
                let field = detail
                    .get("loc")
                    .and_then(Value::as_array)
                    .and_then(|loc| loc.last())
                    .map(|last| match last {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    });
                let msg = detail.get("msg").and_then(Value::as_str);
                if let (Some(field), Some(msg)) = (field, msg) {
                    fields.entry(field).or_default().push(msg.to_string());
                }
            }
        }
        fields.retain(|_, msgs| !msgs.is_empty());

        Self {
            message: json_message(&json),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&[String]> {
        self.fields.get(name).map(Vec::as_slice)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, self.fields.len()) {
            (Some(msg), 0) => write!(f, "{}", msg),
            (Some(msg), n) => write!(f, "{} ({} field errors)", msg, n),
            (None, 0) => write!(f, "request rejected"),
            (None, n) => write!(f, "{} field errors", n),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Network failure, server error, or an undecodable response.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server responded {status}: {}", message.as_deref().unwrap_or("no details"))]
    Status { status: u16, message: Option<String> },
    #[error("unexpected response shape: {0}")]
    Decode(String),
    #[error("invalid request URL: {0}")]
    Url(String),
}

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("forbidden: {0}")]
    Forbidden(String),
}

pub type CollectionResult<T> = Result<T, CollectionError>;

impl CollectionError {
    /// Classify a non-success response.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            return CollectionError::Validation(ValidationError::from_body(body));
        }
        let message = match serde_json::from_str::<Value>(body) {
            Ok(json) => json_message(&json),
            Err(_) => plain_text_message(body),
        };
        CollectionError::Fetch(FetchError::Status {
            status: status.as_u16(),
            message,
        })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CollectionError::Validation(_))
    }

    /// Message to show the operator. Falls back to a generic text when the
    /// backend did not provide one.
    pub fn user_message(&self) -> String {
        match self {
            CollectionError::Validation(v) => {
                if let Some(msg) = &v.message {
                    return msg.clone();
                }
                v.fields
                    .iter()
                    .find_map(|(field, msgs)| msgs.first().map(|m| format!("{}: {}", field, m)))
                    .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
            }
            CollectionError::Fetch(FetchError::Status {
                message: Some(msg), ..
            }) => msg.clone(),
            CollectionError::Fetch(_) => GENERIC_ERROR_MESSAGE.to_string(),
            CollectionError::Forbidden(msg) => msg.clone(),
        }
    }
}

fn json_message(json: &Value) -> Option<String> {
    ["message", "detail", "error", "title"]
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

// Short plain-text bodies are worth showing; HTML error pages are not.
fn plain_text_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed.starts_with('<') || trimmed.len() > 200 {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprocessable_maps_to_validation_with_fields() {
        let body = r#"{"message":"Invalid tenant","errors":{"slug":["already taken"],"name":"required"}}"#;
        let err = CollectionError::from_status(StatusCode::UNPROCESSABLE_ENTITY, body);
        let CollectionError::Validation(v) = &err else {
            panic!("expected validation error");
        };
        assert_eq!(v.field("slug"), Some(&["already taken".to_string()][..]));
        assert_eq!(v.field("name"), Some(&["required".to_string()][..]));
        assert_eq!(err.user_message(), "Invalid tenant");
    }

    #[test]
    fn fastapi_detail_list_blames_fields() {
        let body = r#"{"detail":[{"loc":["body","email"],"msg":"value is not a valid email address","type":"value_error"}]}"#;
        let err = CollectionError::from_status(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert!(err.is_validation());
        assert_eq!(err.user_message(), "email: value is not a valid email address");
    }

    #[test]
    fn server_error_uses_detail_or_generic_message() {
        let err = CollectionError::from_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"detail":"database unavailable"}"#,
        );
        assert!(!err.is_validation());
        assert_eq!(err.user_message(), "database unavailable");

        let err = CollectionError::from_status(
            StatusCode::BAD_GATEWAY,
            "<html><body>502 Bad Gateway</body></html>",
        );
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn empty_validation_body_falls_back() {
        let err = CollectionError::from_status(StatusCode::BAD_REQUEST, "");
        assert!(err.is_validation());
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn decode_error_is_generic_to_users() {
        let err = CollectionError::from(FetchError::Decode("expected array".into()));
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
        assert!(err.to_string().contains("expected array"));
    }
}
