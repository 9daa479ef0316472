//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux):
//! - `HttpClient` using `reqwest`
//! - `AuthSurface` using the system browser and a loopback callback server
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{LoopbackSurfaceFactory, ReqwestHttpClient};
//!
//! let http_client = Arc::new(ReqwestHttpClient::new()?);
//! let surfaces = Arc::new(LoopbackSurfaceFactory::from_redirect_url(
//!     "http://127.0.0.1:8765/callback",
//! )?);
//!
//! let config = BrokerConfig::builder()
//!     .http_client(http_client)
//!     .surface_factory(surfaces)
//!     .build()?;
//! ```

mod http;
mod surface;

pub use http::ReqwestHttpClient;
pub use surface::{BrowserLauncher, LoopbackSurface, LoopbackSurfaceFactory};
