//! Loopback Authorization Surface
//!
//! Shows the consent screen in the system browser and captures the redirect
//! with a small HTTP server bound to the redirect URL's loopback address.
//!
//! The implicit grant returns the token in the URL fragment, which browsers
//! never send to a server. The callback page therefore relays the fragment
//! back as a query string, and the surface reports
//! `{redirect_url}?{parameters}` as its current location.

use async_trait::async_trait;
use axum::extract::{RawQuery, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::surface::{AuthSurface, SurfaceFactory};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Opens a URL for the user to see.
pub type BrowserLauncher = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// Parameters that mark a redirect as final.
const RESULT_PARAMS: [&str; 3] = ["access_token", "code", "error"];

const DONE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title></head>
<body><h1>Authorization received</h1><p>You can close this window.</p></body>
</html>"#;

const RELAY_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorizing...</title></head>
<body>
<p id="status">Completing authorization...</p>
<script>
  if (window.location.hash.length > 1) {
    window.location.replace(window.location.pathname + "?" + window.location.hash.substring(1));
  } else {
    document.getElementById("status").textContent = "Waiting for the provider.";
  }
</script>
</body>
</html>"#;

fn system_browser() -> BrowserLauncher {
    Arc::new(|url: &str| open::that(url))
}

/// Creates one [`LoopbackSurface`] per handshake for a fixed redirect URL.
#[derive(Clone)]
pub struct LoopbackSurfaceFactory {
    bind_addr: SocketAddr,
    redirect_base: String,
    callback_path: String,
    launcher: BrowserLauncher,
}

impl LoopbackSurfaceFactory {
    /// `redirect_url` must point at `localhost` or a loopback IP with an
    /// explicit port, e.g. `http://127.0.0.1:8765/callback`.
    pub fn from_redirect_url(redirect_url: &str) -> Result<Self> {
        let url = Url::parse(redirect_url)
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid redirect URL: {}", e)))?;

        if url.scheme() != "http" {
            return Err(BridgeError::OperationFailed(
                "Loopback redirect URL must use http".to_string(),
            ));
        }

        let ip = match url.host_str() {
            Some("localhost") => [127, 0, 0, 1].into(),
            Some(host) => host
                .trim_matches(|c: char| c == '[' || c == ']')
                .parse::<std::net::IpAddr>()
                .ok()
                .filter(|ip| ip.is_loopback())
                .ok_or_else(|| {
                    BridgeError::OperationFailed(format!("{} is not a loopback host", host))
                })?,
            None => {
                return Err(BridgeError::OperationFailed(
                    "Redirect URL has no host".to_string(),
                ))
            }
        };
        let port = url.port().ok_or_else(|| {
            BridgeError::OperationFailed("Loopback redirect URL needs an explicit port".to_string())
        })?;

        let callback_path = match url.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };
        let mut base = url.clone();
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self {
            bind_addr: SocketAddr::new(ip, port),
            redirect_base: base.to_string(),
            callback_path,
            launcher: system_browser(),
        })
    }

    /// Replace the system browser, e.g. to print the URL instead.
    pub fn with_launcher(mut self, launcher: BrowserLauncher) -> Self {
        self.launcher = launcher;
        self
    }
}

impl SurfaceFactory for LoopbackSurfaceFactory {
    fn create(&self) -> Result<Arc<dyn AuthSurface>> {
        Ok(Arc::new(LoopbackSurface {
            factory: self.clone(),
            location: Arc::new(RwLock::new(None)),
            closed: AtomicBool::new(false),
            server: Mutex::new(None),
        }))
    }
}

struct CallbackServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

#[derive(Clone)]
struct CallbackState {
    redirect_base: String,
    location: Arc<RwLock<Option<String>>>,
}

/// System browser plus loopback capture.
///
/// A browser tab cannot be observed, so the surface reads as closed only
/// after [`close`](AuthSurface::close) or when its server stops.
pub struct LoopbackSurface {
    factory: LoopbackSurfaceFactory,
    location: Arc<RwLock<Option<String>>>,
    closed: AtomicBool,
    server: Mutex<Option<CallbackServer>>,
}

impl LoopbackSurface {
    /// Address the callback server listens on, once opened.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.server.lock().await.as_ref().map(|server| server.local_addr)
    }

    async fn start_server(&self) -> Result<()> {
        let mut server = self.server.lock().await;
        if server.is_some() {
            return Ok(());
        }

        let listener = TcpListener::bind(self.factory.bind_addr).await.map_err(|e| {
            BridgeError::OperationFailed(format!(
                "Failed to bind callback server on {}: {}",
                self.factory.bind_addr, e
            ))
        })?;
        let local_addr = listener.local_addr()?;

        let state = CallbackState {
            redirect_base: self.factory.redirect_base.clone(),
            location: Arc::clone(&self.location),
        };
        let app = Router::new()
            .route(&self.factory.callback_path, get(handle_callback))
            .with_state(state);

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
            {
                error!(error = %e, "Callback server failed");
            }
        });

        debug!(addr = %local_addr, "Callback server listening");
        *server = Some(CallbackServer {
            local_addr,
            shutdown,
            task,
        });
        Ok(())
    }
}

#[async_trait]
impl AuthSurface for LoopbackSurface {
    async fn open(&self, url: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("Surface already closed".to_string()));
        }
        self.start_server().await?;

        let launcher = Arc::clone(&self.factory.launcher);
        let target = url.to_string();
        let launched = tokio::task::spawn_blocking(move || launcher(&target))
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Browser launch panicked: {}", e)))?;

        if let Err(e) = launched {
            warn!(error = %e, "Could not open the browser");
            self.close().await?;
            return Err(BridgeError::OperationFailed(format!(
                "Failed to open browser: {}",
                e
            )));
        }

        info!("Consent screen opened in the system browser");
        Ok(())
    }

    async fn is_closed(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return true;
        }
        self.server
            .lock()
            .await
            .as_ref()
            .is_some_and(|server| server.task.is_finished())
    }

    async fn current_location(&self) -> Result<Option<String>> {
        Ok(self.location.read().await.clone())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);

        let Some(server) = self.server.lock().await.take() else {
            return Ok(());
        };
        server.shutdown.cancel();
        if let Err(e) = server.task.await {
            warn!(error = %e, "Callback server ended abnormally");
        }
        debug!("Callback server stopped");
        Ok(())
    }
}

async fn handle_callback(
    State(state): State<CallbackState>,
    RawQuery(query): RawQuery,
) -> Html<&'static str> {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return Html(RELAY_PAGE);
    };

    let is_result = url::form_urlencoded::parse(query.as_bytes())
        .any(|(key, _)| RESULT_PARAMS.iter().any(|param| key == *param));
    if !is_result {
        return Html(RELAY_PAGE);
    }

    *state.location.write().await = Some(format!("{}?{}", state.redirect_base, query));
    debug!("Redirect captured");
    Html(DONE_PAGE)
}
