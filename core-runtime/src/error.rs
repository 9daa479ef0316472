use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or inconsistent configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// A host capability was neither injected nor available by default
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Invalid environment variable {name}: {message}")]
    Env { name: String, message: String },

    /// A default capability could not be constructed
    #[error("Failed to create default {capability}: {message}")]
    DefaultCapability { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
