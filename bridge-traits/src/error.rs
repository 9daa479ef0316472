use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// Connection reset, timeout, or a surface that is mid-navigation and
    /// cannot be inspected right now. Callers may try again later.
    #[error("Transient network error: {0}")]
    NetworkTransient(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::NetworkTransient(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error returned by every [`ProviderClient`](crate::provider::ProviderClient)
/// operation.
///
/// The variants are shared by all providers so that the sync layer can report
/// failures without knowing which API produced them.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// No valid credential is held for the provider; the caller has to run the
    /// authorization handshake again.
    #[error("Authentication required for {provider}")]
    AuthenticationRequired { provider: String },

    /// The provider answered with a non-success status. `status_code` is passed
    /// through untouched.
    #[error("{provider} API error ({status_code}): {message}")]
    Api {
        provider: String,
        status_code: u16,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ProviderError {
    /// HTTP status carried by an API error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    pub fn is_authentication_required(&self) -> bool {
        matches!(self, ProviderError::AuthenticationRequired { .. })
    }

    /// Whether a caller-level retry has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) => true,
            ProviderError::Api { status_code, .. } => *status_code == 429 || *status_code >= 500,
            _ => false,
        }
    }
}

impl From<BridgeError> for ProviderError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::NetworkTransient(message) => ProviderError::Network(message),
            other => ProviderError::Network(other.to_string()),
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_keeps_status_code() {
        let error = ProviderError::Api {
            provider: "notion".to_string(),
            status_code: 403,
            message: "restricted_resource".to_string(),
        };

        assert_eq!(error.status_code(), Some(403));
        assert!(!error.is_retryable());
        assert_eq!(
            error.to_string(),
            "notion API error (403): restricted_resource"
        );
    }

    #[test]
    fn test_retryable_classification() {
        let throttled = ProviderError::Api {
            provider: "google_calendar".to_string(),
            status_code: 429,
            message: "rateLimitExceeded".to_string(),
        };
        let auth = ProviderError::AuthenticationRequired {
            provider: "google_calendar".to_string(),
        };

        assert!(throttled.is_retryable());
        assert!(ProviderError::Network("reset".to_string()).is_retryable());
        assert!(!auth.is_retryable());
        assert!(auth.is_authentication_required());
    }

    #[test]
    fn test_bridge_error_converts_to_network() {
        let error: ProviderError = BridgeError::NetworkTransient("timed out".to_string()).into();
        assert!(matches!(error, ProviderError::Network(ref m) if m == "timed out"));
    }
}
