use thiserror::Error;

use crate::validation::ValidationError;

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";
pub const NETWORK_ERROR_MESSAGE: &str =
    "Unable to reach the server. Please check your connection and try again.";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Timeout(String),

    #[error("not signed in")]
    MissingSession,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    SignupStep(String),

    /// A page opened but its data could not be loaded; carries the message
    /// the holder recorded.
    #[error("{0}")]
    PageLoad(String),
}

impl ClientError {
    /// The string a state holder stores and the presentation layer shows.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http(e) if e.is_timeout() => {
                "The server took too long to respond. Please try again.".to_string()
            }
            Self::Http(_) => NETWORK_ERROR_MESSAGE.to_string(),
            Self::Status { status, message } if message.is_empty() => {
                format!("Request failed with status {}", status)
            }
            Self::Status { message, .. } => message.clone(),
            Self::Unauthorized(message) => message.clone(),
            Self::Validation(e) => e.to_string(),
            Self::Decode(_) => "Unexpected response from the server.".to_string(),
            Self::Io(e) => e.to_string(),
            Self::Timeout(message) => message.clone(),
            Self::MissingSession => "Please sign in to continue.".to_string(),
            Self::NotFound(what) => format!("{} not found", what),
            Self::SignupStep(message) => message.clone(),
            Self::PageLoad(message) => message.clone(),
        }
    }

    /// The server rejected a write because the resource changed underneath it.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Status { status: 409, .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
