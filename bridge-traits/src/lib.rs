//! # Host Bridge Traits
//!
//! Capabilities the broker needs from its host, and the contract every
//! provider client implements.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - One-shot async HTTP, opt-in retry policy
//!
//! ### Authorization
//! - [`AuthSurface`](surface::AuthSurface) - Window showing the provider's consent screen
//! - [`SurfaceFactory`](surface::SurfaceFactory) - Creates one surface per handshake
//!
//! ### Providers
//! - [`ProviderClient`](provider::ProviderClient) - list/create/update/delete over an external API
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! Host capabilities report [`BridgeError`](error::BridgeError); provider
//! clients report [`ProviderError`](error::ProviderError). A transport failure
//! crossing from one to the other becomes `ProviderError::Network`.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` so implementations can be shared across
//! tokio tasks behind an `Arc`.

pub mod error;
pub mod http;
pub mod provider;
pub mod surface;
pub mod time;

pub use error::{BridgeError, ProviderError, ProviderResult};

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use provider::{ExternalItem, ItemDraft, ItemKind, ItemPatch, ListFilter, ProviderClient};
pub use surface::{AuthSurface, SurfaceFactory};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
