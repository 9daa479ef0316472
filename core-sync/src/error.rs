use core_auth::ProviderKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Provider {provider} is not registered")]
    ProviderNotRegistered { provider: ProviderKind },

    #[error("Automatic sync is already running")]
    AutoSyncRunning,

    #[error("Invalid sync interval: {0}")]
    InvalidInterval(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
