use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Required settings are missing, or the provider cannot use the requested
    /// flow. Raised before any network call or surface is opened.
    #[error("Configuration error for {provider}: {message}")]
    Configuration { provider: String, message: String },

    /// The state returned with a token or code does not belong to the pending
    /// request. The handshake is aborted and nothing is stored.
    #[error("Anti-forgery state mismatch for {provider}; authorization aborted")]
    CsrfMismatch { provider: String },

    #[error("Authentication required for {provider}")]
    AuthenticationRequired { provider: String },

    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    #[error("No pending authorization for {provider}")]
    NoPendingRequest { provider: String },

    #[error("Authorization for {provider} is already being awaited")]
    AlreadyAwaiting { provider: String },

    #[error("Authorization request for {provider} expired")]
    RequestExpired { provider: String },

    #[error("Token exchange for {provider} failed ({status_code}): {message}")]
    TokenExchange {
        provider: String,
        status_code: u16,
        message: String,
    },

    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("Authorization surface error: {0}")]
    Surface(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl AuthError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, AuthError::Configuration { .. })
    }

    pub fn is_csrf_mismatch(&self) -> bool {
        matches!(self, AuthError::CsrfMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
