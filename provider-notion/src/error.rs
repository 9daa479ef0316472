//! Error types for the Notion provider

use bridge_traits::error::{BridgeError, ProviderError};
use thiserror::Error;

pub(crate) const PROVIDER_ID: &str = "notion";

#[derive(Error, Debug)]
pub enum NotionError {
    #[error("Notion is not connected")]
    AuthenticationRequired,

    /// Non-success status; `code` is Notion's machine-readable error code
    /// (`object_not_found`, `validation_error`, ...)
    #[error("Notion API error (status {status_code}): {message}")]
    ApiError {
        status_code: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid page: {0}")]
    InvalidPage(String),
}

pub type Result<T> = std::result::Result<T, NotionError>;

impl From<BridgeError> for NotionError {
    fn from(error: BridgeError) -> Self {
        NotionError::NetworkError(error.to_string())
    }
}

impl From<NotionError> for ProviderError {
    fn from(error: NotionError) -> Self {
        match error {
            NotionError::AuthenticationRequired => ProviderError::AuthenticationRequired {
                provider: PROVIDER_ID.to_string(),
            },
            NotionError::ApiError {
                status_code,
                message,
                ..
            } => ProviderError::Api {
                provider: PROVIDER_ID.to_string(),
                status_code,
                message,
            },
            NotionError::ParseError(msg) => ProviderError::Parse(msg),
            NotionError::NetworkError(msg) => ProviderError::Network(msg),
            NotionError::InvalidPage(msg) => ProviderError::InvalidInput(msg),
        }
    }
}
