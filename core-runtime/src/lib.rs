//! # Core Runtime Module
//!
//! Shared runtime infrastructure for the credential & sync broker:
//! - Configuration (`BrokerConfig`, per-provider `ProviderSettings`)
//! - Event bus carrying auth and sync notifications
//! - Logging and tracing setup
//!
//! Every other core crate depends on this one; it depends only on
//! `bridge-traits` (and `bridge-desktop` for default capabilities when the
//! `desktop-shims` feature is on).

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{BrokerConfig, ProviderSettings, SettingsField};
pub use error::{Error, Result};
pub use events::{AuthEvent, CoreEvent, EventBus, SyncEvent};
