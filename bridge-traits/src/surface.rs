//! User-Facing Authorization Surface
//!
//! The consent screen of an OAuth provider is shown in something the user can
//! see: a popup window, the system browser, an embedded web view. The handshake
//! only needs four things from it, captured by [`AuthSurface`].

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

/// A window-like surface that displays the provider's consent screen.
///
/// Implementations must tolerate `close` being called on an already closed
/// surface.
///
/// # Errors
///
/// [`current_location`](AuthSurface::current_location) returns
/// [`BridgeError::NetworkTransient`](crate::BridgeError::NetworkTransient) when the
/// location cannot be read right now (for example while the surface is on a
/// cross-origin page). Callers treat this as "not yet" and keep polling.
#[async_trait]
pub trait AuthSurface: Send + Sync {
    /// Navigate the surface to `url` and make it visible.
    async fn open(&self, url: &str) -> Result<()>;

    /// Whether the user (or anyone else) dismissed the surface.
    async fn is_closed(&self) -> bool;

    /// The URL the surface is currently showing, once it is readable.
    async fn current_location(&self) -> Result<Option<String>>;

    /// Dismiss the surface.
    async fn close(&self) -> Result<()>;
}

/// Creates a fresh [`AuthSurface`] for each handshake.
pub trait SurfaceFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn AuthSurface>>;
}
