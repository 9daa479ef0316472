//! Error types for the Google Calendar provider

use bridge_traits::error::{BridgeError, ProviderError};
use thiserror::Error;

pub(crate) const PROVIDER_ID: &str = "google_calendar";

/// Google Calendar provider errors
#[derive(Error, Debug)]
pub enum GoogleCalendarError {
    /// No valid credential for Google Calendar
    #[error("Google Calendar is not connected")]
    AuthenticationRequired,

    /// API request returned a non-success status
    #[error("Google Calendar API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    /// Draft or patch that cannot be sent as an event
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}

/// Result type for Google Calendar operations
pub type Result<T> = std::result::Result<T, GoogleCalendarError>;

impl From<BridgeError> for GoogleCalendarError {
    fn from(error: BridgeError) -> Self {
        GoogleCalendarError::NetworkError(error.to_string())
    }
}

impl From<GoogleCalendarError> for ProviderError {
    fn from(error: GoogleCalendarError) -> Self {
        match error {
            GoogleCalendarError::AuthenticationRequired => ProviderError::AuthenticationRequired {
                provider: PROVIDER_ID.to_string(),
            },
            GoogleCalendarError::ApiError {
                status_code,
                message,
            } => ProviderError::Api {
                provider: PROVIDER_ID.to_string(),
                status_code,
                message,
            },
            GoogleCalendarError::ParseError(msg) => ProviderError::Parse(msg),
            GoogleCalendarError::NetworkError(msg) => ProviderError::Network(msg),
            GoogleCalendarError::InvalidEvent(msg) => ProviderError::InvalidInput(msg),
        }
    }
}
