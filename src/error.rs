//! Error taxonomy for cart session calls

use thiserror::Error;

/// Failure surfaced by every cart operation.
///
/// Cloneable because a single bootstrap result is handed to every caller
/// awaiting it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server {
        status: u16,
        message: Option<String>,
        code: Option<String>,
    },

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("No data in response")]
    NoData,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CartError {
    /// Server error code, when the Store API returned one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Server { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether the caller should re-bootstrap or prompt for login.
    pub fn requires_authentication(&self) -> bool {
        matches!(self, Self::AuthenticationRequired)
    }
}

impl From<reqwest::Error> for CartError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            Self::InvalidUrl(e.to_string())
        } else if e.is_decode() {
            Self::Decoding(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for CartError {
    fn from(e: serde_json::Error) -> Self { Self::Decoding(e.to_string()) }
}

impl From<validator::ValidationErrors> for CartError {
    fn from(e: validator::ValidationErrors) -> Self { Self::InvalidRequest(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, CartError>;
