//! Fetch failures, classified so the UI can say something useful.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchErrorKind {
    NotFound,
    Timeout,
    Network,
    ServerError,
    Other,
}

impl FetchErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchErrorKind::NotFound => "not-found",
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::Network => "network",
            FetchErrorKind::ServerError => "server-error",
            FetchErrorKind::Other => "other",
        }
    }

    /// The one message shown to users for this kind of failure.
    pub fn user_message(self) -> &'static str {
        match self {
            FetchErrorKind::NotFound => "Document not found. It may have been moved or removed.",
            FetchErrorKind::Timeout => {
                "Request timed out. Please check your internet connection and try again."
            }
            FetchErrorKind::Network => {
                "Unable to connect. Please check your internet connection or try again later."
            }
            FetchErrorKind::ServerError => "Server error occurred. Please try again later.",
            FetchErrorKind::Other => "Failed to load content. Please try again.",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct FetchError {
    pub message: String,
    #[serde(rename = "errorType")]
    pub kind: FetchErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            status_code: None,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Other, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Every candidate came back 404 (or there were none).
    pub fn no_content() -> Self {
        Self::new(FetchErrorKind::NotFound, "No content found")
    }

    /// A non-success HTTP status.
    pub fn from_status(status: u16, status_text: &str) -> Self {
        let kind = match status {
            404 => FetchErrorKind::NotFound,
            s if s >= 500 => FetchErrorKind::ServerError,
            _ => FetchErrorKind::Other,
        };
        Self::new(kind, format!("HTTP {status}: {status_text}")).with_status(status)
    }

    pub fn from_transport(error: &TransportError) -> Self {
        let kind = match error {
            TransportError::Timeout(_) => FetchErrorKind::Timeout,
            TransportError::Connect(_) => FetchErrorKind::Network,
            TransportError::InvalidUrl(_) => FetchErrorKind::Other,
            TransportError::Other(message) => classify_message(message),
        };
        Self::new(kind, error.to_string())
    }
}

/// Guess a kind from an error message when the transport could not tell.
pub fn classify_message(message: &str) -> FetchErrorKind {
    if message.contains("timeout") || message.contains("aborted") {
        FetchErrorKind::Timeout
    } else if ["NetworkError", "Failed to fetch", "CORS", "network"]
        .iter()
        .any(|needle| message.contains(needle))
    {
        FetchErrorKind::Network
    } else {
        FetchErrorKind::Other
    }
}
