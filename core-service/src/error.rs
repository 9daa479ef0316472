use thiserror::Error;

/// Failures while starting or driving the broker.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid broker configuration: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Authorization failed: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Sync failed: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Provider call failed: {0}")]
    Provider(#[from] bridge_traits::ProviderError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
