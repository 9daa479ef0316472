//! # Sync Module
//!
//! Pulls items from every connected provider in one pass.
//!
//! ## Components
//!
//! - **Registry** (`registry`): provider clients with their container and filter
//! - **Coordinator** (`coordinator`): concurrent passes, optional retry, auto-sync loop
//! - **Results** (`result`): one `SyncResult` per provider per pass

pub mod coordinator;
pub mod error;
pub mod registry;
pub mod result;

pub use coordinator::{SyncConfig, SyncCoordinator};
pub use error::{Result, SyncError};
pub use registry::{ProviderRegistry, RegisteredProvider, SyncFilter};
pub use result::{SyncResult, SyncStatus};
