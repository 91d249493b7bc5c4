//! Error handling for Bintray publishing
//!
//! This module provides the error taxonomy shared by the client, the
//! configuration loader and the publishing workflow, using the thiserror
//! crate for ergonomic error handling.

use thiserror::Error;

/// Transport-level failure: the request never produced an HTTP status.
///
/// Connection resets, timeouts and body read failures land here. These are the
/// only failures the retry policy will retry, since the server did not act on
/// the request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

/// Classification of a [`TransportError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Connect,
    Timeout,
    Body,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Connect => "connection failed",
            Self::Timeout => "request timed out",
            Self::Body => "failed to read response body",
            Self::Other => "request failed",
        };
        f.write_str(label)
    }
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportErrorKind::Timeout
        } else if error.is_connect() {
            TransportErrorKind::Connect
        } else if error.is_body() || error.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, error.to_string())
    }
}

/// Main error type for publishing operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Configuration errors
    #[error("missing required configuration: {}", fields.join(", "))]
    MissingConfiguration { fields: Vec<String> },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    // Client errors
    #[error("could not create HTTP client: {message}")]
    Client { message: String },

    #[error("could not encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    // Transport errors
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    // Remote errors
    #[error("{operation} rejected for {coordinates} with HTTP {status} - {body}")]
    RemoteRejection {
        operation: String,
        coordinates: String,
        status: u16,
        body: String,
    },
}

impl PublishError {
    /// Build a [`PublishError::MissingConfiguration`] from field names
    pub fn missing<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MissingConfiguration {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// HTTP status of a remote rejection, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteRejection { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if re-running the same step could succeed without changes
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::RetriesExhausted { .. } => true,
            Self::RemoteRejection { status, .. } => *status >= 500,
            Self::MissingConfiguration { .. }
            | Self::InvalidConfiguration { .. }
            | Self::Client { .. }
            | Self::Encode(_) => false,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::MissingConfiguration { .. } => vec![
                "Set the missing values in .bintray-publish.yaml",
                "Credentials can come from the environment (bintrayUser, bintrayKey)",
                "Or from gradle.properties (bintray.user, bintray.apiKey)",
            ],
            Self::InvalidConfiguration { .. } => {
                vec!["Check .bintray-publish.yaml for syntax errors"]
            }
            Self::Client { .. } => vec!["Check the configured apiUrl and TLS setup"],
            Self::Encode(_) => vec!["Check package metadata for invalid values"],
            Self::RetriesExhausted { .. } => vec![
                "Check network connectivity to the hosting service",
                "Increase maxRetries or retryDelaySeconds",
            ],
            Self::RemoteRejection { status, .. } => match status {
                401 | 403 => vec!["Verify the user and API key", "Check repository permissions"],
                404 => vec!["Verify subject, repo and package names"],
                409 => vec!["This version may already exist; bump the version"],
                _ => vec!["Read the response body above", "Check the hosting service status"],
            },
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingConfiguration { .. } => "MISSING_CONFIGURATION",
            Self::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            Self::Client { .. } => "CLIENT_ERROR",
            Self::Encode(_) => "ENCODE_ERROR",
            Self::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
            Self::RemoteRejection { .. } => "REMOTE_REJECTION",
        }
    }
}
