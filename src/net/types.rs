//! Request/response types and the transport error.
//!
//! ERROR HANDLING
//! ==============
//! Non-2xx responses surface as [`TransportError::Status`] carrying the parsed
//! [`ErrorBody`], so callers can show the server's own message when it sent
//! one and fall back to a generic text otherwise.

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{ErrorCode, FailureKind};

// =============================================================================
// REQUEST
// =============================================================================

/// A call against the API, addressed by path relative to the base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<JsonValue>,
    pub(crate) expiry_check: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), headers: HeaderMap::new(), body: None, expiry_check: true }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a header for this call only. An `Authorization` header set here
    /// takes precedence over the session credential.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Do not treat a 401 on this call as session expiry.
    #[must_use]
    pub fn without_expiry_check(mut self) -> Self {
        self.expiry_check = false;
        self
    }
}

/// Fully resolved request handed to an [`HttpBackend`](super::HttpBackend).
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<JsonValue>,
}

// =============================================================================
// RESPONSE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Parse`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_str(&self.body).map_err(|e| TransportError::Parse(e.to_string()))
    }

    #[must_use]
    pub fn error_body(&self) -> ErrorBody {
        ErrorBody::parse(&self.body)
    }
}

// =============================================================================
// ERROR BODY
// =============================================================================

/// Server-supplied error payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorBody {
    raw: String,
    message: Option<String>,
}

impl ErrorBody {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let message = match serde_json::from_str::<JsonValue>(raw) {
            Ok(value) => extract_message(&value),
            Err(_) => None,
        };
        Self { raw: raw.to_string(), message }
    }

    /// The human-readable message, if the server supplied one.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    fn summary(&self) -> &str {
        self.message().unwrap_or("no detail")
    }
}

/// `detail`, then `message`, then field errors joined as `field: msg`.
fn extract_message(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.clone()),
        JsonValue::Object(map) => {
            for key in ["detail", "message"] {
                if let Some(text) = map.get(key).and_then(flatten_messages) {
                    return Some(text);
                }
            }
            let parts: Vec<String> = map
                .iter()
                .filter_map(|(field, v)| {
                    let text = flatten_messages(v)?;
                    Some(if field == "non_field_errors" { text } else { format!("{field}: {text}") })
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        JsonValue::Array(_) => flatten_messages(value),
        _ => None,
    }
}

fn flatten_messages(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.clone()),
        JsonValue::Array(items) => {
            let texts: Vec<String> = items.iter().filter_map(flatten_messages).collect();
            (!texts.is_empty()).then(|| texts.join(" "))
        }
        _ => None,
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No response was received.
    #[error("network request failed: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("request failed with status {status}: {}", .body.summary())]
    Status { status: u16, body: ErrorBody },

    /// The response body could not be deserialized.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The request could not be built (bad header value, client setup).
    #[error("request build failed: {0}")]
    Build(String),
}

impl TransportError {
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The server's message for a status error.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => body.message(),
            _ => None,
        }
    }

    /// 401 or 403.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

impl ErrorCode for TransportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Network(_) => "E_NETWORK",
            Self::Status { status: 401, .. } => "E_UNAUTHORIZED",
            Self::Status { status: 403, .. } => "E_FORBIDDEN",
            Self::Status { status: 400..=499, .. } => "E_REJECTED",
            Self::Status { .. } => "E_SERVER",
            Self::Parse(_) => "E_PARSE",
            Self::Build(_) => "E_BUILD",
        }
    }

    fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Network(_) => FailureKind::Network,
            Self::Status { status: 401 | 403, .. } => FailureKind::Authentication,
            Self::Status { status: 400..=499, .. } => FailureKind::Validation,
            Self::Status { .. } | Self::Parse(_) | Self::Build(_) => FailureKind::Internal,
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
