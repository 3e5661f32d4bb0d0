//! Error types and handlers for registry client operations

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Every failure the client engine can report.
///
/// Payloads are owned strings so an error can be cloned into a batch
/// result without holding on to the underlying source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Network-level failure (DNS, connect, timeout, reset)
    #[error("Network error: {0}")]
    Transport(String),
    /// Non-2xx response carrying a registry-supplied reason
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Unsupported request method: {0}")]
    UnsupportedMethod(String),
    /// Authenticated endpoint invoked without stored credentials
    #[error("You are not logged in. Run `glopm login` first.")]
    NotLoggedIn,
    #[error("Package {0} has no published versions")]
    NoVersionsAvailable(String),
    #[error("Could not resolve version: {0}")]
    Resolution(String),
    /// Stream or write failure while materialising a download
    #[error("Download failed: {0}")]
    Download(String),
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl RegistryError {
    /// HTTP status of an API error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            RegistryError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, RegistryError::Transport(_))
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        handlers::NetworkErrorHandler::handle_network_error(&err, "request")
    }
}

impl From<url::ParseError> for RegistryError {
    fn from(err: url::ParseError) -> Self {
        RegistryError::Validation(err.to_string())
    }
}
