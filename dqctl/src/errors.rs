use reqwest::StatusCode;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// No identity could be resolved for the session
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// The backend answered with a non-success status
    #[error("Request failed with status code {}", status.as_u16())]
    Api {
        status: StatusCode,
        /// `detail` field of the error body (validation and business failures)
        detail: Option<String>,
        /// `message` field of the error body
        message: Option<String>,
    },

    /// No response was received (connection, timeout, body decoding)
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// A login or registration submission is already in flight
    #[error("Another submission is already in progress")]
    Busy,

    /// Requested resource not found
    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: String },

    /// Navigation kept being redirected
    #[error("Navigation to {path} was redirected too many times")]
    RedirectLoop { path: String },

    /// Credential storage could not be read or written
    #[error("Failed to {operation}")]
    Storage { operation: String },

    /// Generic internal error
    #[error("Failed to {operation}")]
    Internal { operation: String },
}

impl Error {
    /// The HTTP status received from the backend, if the request got that far.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// True when the backend rejected the credential.
    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(StatusCode::UNAUTHORIZED)
    }

    /// The server-provided `detail` message, used for field-level display.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Error::Api { detail, .. } => detail.as_deref(),
            Error::Unauthenticated { message } => message.as_deref(),
            _ => None,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::Api { message, detail, .. } => message
                .clone()
                .or_else(|| detail.clone())
                .unwrap_or_else(|| self.to_string()),
            Error::Transport(e) if e.is_timeout() => "Request timed out".to_string(),
            Error::Transport(_) => "Request failed".to_string(),
            Error::Busy => self.to_string(),
            Error::NotFound { .. } | Error::RedirectLoop { .. } => self.to_string(),
            Error::Storage { .. } => "Could not access saved session".to_string(),
            Error::Internal { .. } => "Internal error".to_string(),
        }
    }
}

/// Type alias for session layer results
pub type Result<T> = std::result::Result<T, Error>;
