//! Error types for SSE subscriptions

use std::time::Duration;

use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for SSE operations
pub type StreamResult<T> = std::result::Result<T, StreamError>;

/// Conditions that end a subscription
///
/// Malformed lines are not errors; they are dropped during parsing.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Header name or value rejected while building the request
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Server answered with a status outside the accepted set
    #[error("Invalid HTTP status {status} from {url}")]
    InvalidStatus { status: u16, url: String },

    /// Overall deadline expired
    #[error("Stream timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Connection or body read failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl StreamError {
    /// Status code carried by an [`InvalidStatus`](Self::InvalidStatus) error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error came from the overall deadline
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Transport(TransportError::Timeout)
        )
    }
}
