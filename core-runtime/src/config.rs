//! # Broker Configuration Module
//!
//! Builder-based configuration for the credential & sync broker.
//!
//! ## Overview
//!
//! [`BrokerConfig`] bundles the host capabilities the broker needs (HTTP
//! client, clock, authorization surface) with the per-provider settings a
//! user enters on a settings screen and the timing knobs of the handshake and
//! the auto-sync loop. The builder fails fast when a capability is missing or a
//! timing value makes no sense.
//!
//! Provider settings are only checked for *presence*, and only when an
//! operation needs them: an empty Notion key does not stop Google Calendar
//! from working.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{BrokerConfig, ProviderSettings};
//! use std::sync::Arc;
//!
//! let config = BrokerConfig::builder()
//!     .http_client(Arc::new(ReqwestHttpClient::new()?))
//!     .google_calendar(ProviderSettings::from_env("GOOGLE"))
//!     .notion(ProviderSettings::from_env("NOTION"))
//!     .notion_database_id("8a1c...")
//!     .build()?;
//! ```
//!
//! ## Environment
//!
//! [`ProviderSettings::from_env`] reads `<PREFIX>_CLIENT_ID`,
//! `<PREFIX>_CLIENT_SECRET`, `<PREFIX>_API_KEY`, `<PREFIX>_REDIRECT_URL`
//! (falling back to `REDIRECT_URL`) and `<PREFIX>_SCOPES` (space or comma
//! separated). [`load_dotenv`] pulls a `.env` file into the process
//! environment first.

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, RetryPolicy, SurfaceFactory, SystemClock};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Handshake deadline when nothing else is configured.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// How often the surface location is probed.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// How often the surface is checked for having been closed.
pub const DEFAULT_CLOSED_CHECK_INTERVAL: Duration = Duration::from_millis(1000);
/// Period of the automatic sync loop.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30 * 60);
/// Calendar listed and written to when none is configured.
pub const DEFAULT_GOOGLE_CALENDAR_ID: &str = "primary";

/// Load a `.env` file from the working directory (or a parent) into the
/// process environment. Returns `false` when no file was found.
pub fn load_dotenv() -> bool {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "Loaded environment file");
            true
        }
        Err(err) if err.not_found() => false,
        Err(err) => {
            tracing::warn!(error = %err, "Ignoring unreadable environment file");
            false
        }
    }
}

// ============================================================================
// Provider settings
// ============================================================================

/// A single field of [`ProviderSettings`], used to report what is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsField {
    ClientId,
    ClientSecret,
    ApiKey,
    RedirectUrl,
    Scopes,
}

impl SettingsField {
    pub fn name(&self) -> &'static str {
        match self {
            SettingsField::ClientId => "client_id",
            SettingsField::ClientSecret => "client_secret",
            SettingsField::ApiKey => "api_key",
            SettingsField::RedirectUrl => "redirect_url",
            SettingsField::Scopes => "scopes",
        }
    }
}

impl fmt::Display for SettingsField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Credentials and endpoints a user configures for one provider.
///
/// Google Calendar uses `client_id` + `api_key` for the popup flow and
/// `client_id` + `client_secret` for the backend code flow. Notion uses
/// `api_key` as its integration token.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub api_key: Option<String>,
    pub redirect_url: String,
    pub scopes: Vec<String>,
}

impl ProviderSettings {
    pub fn new(client_id: impl Into<String>, redirect_url: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_url: redirect_url.into(),
            ..Default::default()
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Read settings from `<PREFIX>_*` environment variables.
    pub fn from_env(prefix: &str) -> Self {
        Self::from_lookup(prefix, |name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            lookup(&format!("{}_{}", prefix, suffix)).filter(|value| !value.trim().is_empty())
        };

        let scopes = var("SCOPES")
            .map(|raw| {
                raw.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|scope| !scope.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            client_id: var("CLIENT_ID").unwrap_or_default(),
            client_secret: var("CLIENT_SECRET"),
            api_key: var("API_KEY"),
            redirect_url: var("REDIRECT_URL")
                .or_else(|| lookup("REDIRECT_URL"))
                .unwrap_or_default(),
            scopes,
        }
    }

    fn is_present(&self, field: SettingsField) -> bool {
        fn filled(value: &str) -> bool {
            !value.trim().is_empty()
        }

        match field {
            SettingsField::ClientId => filled(&self.client_id),
            SettingsField::ClientSecret => self.client_secret.as_deref().is_some_and(filled),
            SettingsField::ApiKey => self.api_key.as_deref().is_some_and(filled),
            SettingsField::RedirectUrl => filled(&self.redirect_url),
            SettingsField::Scopes => self.scopes.iter().any(|scope| filled(scope)),
        }
    }

    /// Fields from `required` that are absent or blank, in the given order.
    pub fn missing(&self, required: &[SettingsField]) -> Vec<SettingsField> {
        required
            .iter()
            .copied()
            .filter(|field| !self.is_present(*field))
            .collect()
    }

    /// `Ok` when every field in `required` is present.
    pub fn require(&self, required: &[SettingsField]) -> Result<()> {
        let missing = self.missing(required);
        if missing.is_empty() {
            return Ok(());
        }

        let names: Vec<&str> = missing.iter().map(SettingsField::name).collect();
        Err(Error::Config(format!(
            "Missing required provider settings: {}",
            names.join(", ")
        )))
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

// ============================================================================
// Broker configuration
// ============================================================================

/// Everything the broker needs to start. Build with [`BrokerConfig::builder`].
#[derive(Clone)]
pub struct BrokerConfig {
    /// HTTP client used for token exchange and every provider call
    pub http_client: Arc<dyn HttpClient>,

    /// Time source for request timestamps and credential expiry
    pub clock: Arc<dyn Clock>,

    /// Creates the window shown during the popup flow. Without one only the
    /// code flow and integration tokens are available.
    pub surface_factory: Option<Arc<dyn SurfaceFactory>>,

    pub google_calendar: ProviderSettings,
    pub notion: ProviderSettings,

    /// Calendar synced and written to
    pub google_calendar_id: String,

    /// Notion database synced and written to
    pub notion_database_id: Option<String>,

    /// Fixed deadline of every handshake
    pub auth_timeout: Duration,
    pub poll_interval: Duration,
    pub closed_check_interval: Duration,

    /// Period of the automatic sync loop
    pub sync_interval: Duration,
    /// Start the automatic sync loop together with the broker
    pub auto_sync: bool,
    /// Retry policy the sync coordinator applies per provider
    pub sync_retry: RetryPolicy,

    pub event_buffer_size: usize,
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("clock", &"Clock { ... }")
            .field(
                "surface_factory",
                &self
                    .surface_factory
                    .as_ref()
                    .map(|_| "SurfaceFactory { ... }"),
            )
            .field("google_calendar", &self.google_calendar)
            .field("notion", &self.notion)
            .field("google_calendar_id", &self.google_calendar_id)
            .field("notion_database_id", &self.notion_database_id)
            .field("auth_timeout", &self.auth_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("closed_check_interval", &self.closed_check_interval)
            .field("sync_interval", &self.sync_interval)
            .field("auto_sync", &self.auto_sync)
            .field("sync_retry", &self.sync_retry)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl BrokerConfig {
    pub fn builder() -> BrokerConfigBuilder {
        BrokerConfigBuilder::default()
    }

    /// Validates timing values and identifiers.
    pub fn validate(&self) -> Result<()> {
        if self.auth_timeout.is_zero() {
            return Err(Error::Config(
                "Authorization timeout must be greater than zero".to_string(),
            ));
        }

        if self.poll_interval.is_zero() || self.closed_check_interval.is_zero() {
            return Err(Error::Config(
                "Surface polling intervals must be greater than zero".to_string(),
            ));
        }

        if self.poll_interval >= self.auth_timeout {
            return Err(Error::Config(format!(
                "Poll interval ({:?}) must be shorter than the authorization timeout ({:?})",
                self.poll_interval, self.auth_timeout
            )));
        }

        if self.sync_interval < Duration::from_secs(1) {
            return Err(Error::Config(
                "Sync interval must be at least one second".to_string(),
            ));
        }

        if self.google_calendar_id.trim().is_empty() {
            return Err(Error::Config(
                "Google calendar id cannot be empty. Use \"primary\" for the user's main calendar."
                    .to_string(),
            ));
        }

        if self
            .notion_database_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            return Err(Error::Config(
                "Notion database id cannot be blank; leave it unset instead".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "An HttpClient implementation is required for token exchange and provider calls. \
                 Desktop: enable the 'desktop-shims' feature to use the reqwest-based client. \
                 Other hosts: inject an adapter with .http_client()."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new().map_err(|e| Error::DefaultCapability {
        capability: "HttpClient".to_string(),
        message: e.to_string(),
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_surface_factory(_redirect_url: &str) -> Option<Arc<dyn SurfaceFactory>> {
    None
}

/// The loopback surface, when the Google redirect URL points at this machine.
#[cfg(feature = "desktop-shims")]
fn provide_default_surface_factory(redirect_url: &str) -> Option<Arc<dyn SurfaceFactory>> {
    use bridge_desktop::LoopbackSurfaceFactory;

    if redirect_url.trim().is_empty() {
        return None;
    }
    match LoopbackSurfaceFactory::from_redirect_url(redirect_url) {
        Ok(factory) => Some(Arc::new(factory)),
        Err(e) => {
            tracing::debug!(error = %e, "No loopback surface for this redirect URL");
            None
        }
    }
}

/// Builder for [`BrokerConfig`].
#[derive(Default)]
pub struct BrokerConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    surface_factory: Option<Arc<dyn SurfaceFactory>>,
    google_calendar: Option<ProviderSettings>,
    notion: Option<ProviderSettings>,
    google_calendar_id: Option<String>,
    notion_database_id: Option<String>,
    auth_timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    closed_check_interval: Option<Duration>,
    sync_interval: Option<Duration>,
    auto_sync: bool,
    sync_retry: Option<RetryPolicy>,
    event_buffer_size: Option<usize>,
}

impl BrokerConfigBuilder {
    /// Sets the HTTP client implementation.
    ///
    /// Required unless the `desktop-shims` feature provides the reqwest-based
    /// default.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the time source. Default: [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn surface_factory(mut self, factory: Arc<dyn SurfaceFactory>) -> Self {
        self.surface_factory = Some(factory);
        self
    }

    pub fn google_calendar(mut self, settings: ProviderSettings) -> Self {
        self.google_calendar = Some(settings);
        self
    }

    pub fn notion(mut self, settings: ProviderSettings) -> Self {
        self.notion = Some(settings);
        self
    }

    /// Default: `primary`
    pub fn google_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.google_calendar_id = Some(calendar_id.into());
        self
    }

    pub fn notion_database_id(mut self, database_id: impl Into<String>) -> Self {
        self.notion_database_id = Some(database_id.into());
        self
    }

    /// Default: 5 minutes
    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = Some(timeout);
        self
    }

    /// Default: 500 ms
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Default: 1 second
    pub fn closed_check_interval(mut self, interval: Duration) -> Self {
        self.closed_check_interval = Some(interval);
        self
    }

    /// Default: 30 minutes
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    pub fn auto_sync(mut self, enabled: bool) -> Self {
        self.auto_sync = enabled;
        self
    }

    /// Default: [`RetryPolicy::none`]
    pub fn sync_retry(mut self, policy: RetryPolicy) -> Self {
        self.sync_retry = Some(policy);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Fill every unset provider field from the environment.
    ///
    /// Reads `GOOGLE_*` and `NOTION_*` settings, `GOOGLE_CALENDAR_ID`,
    /// `NOTION_DATABASE_ID` and `SYNC_INTERVAL_MINUTES`.
    pub fn with_env(self) -> Result<Self> {
        self.with_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`with_env`](Self::with_env) with an arbitrary variable source.
    pub fn with_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.google_calendar.is_none() {
            self.google_calendar = Some(ProviderSettings::from_lookup("GOOGLE", &lookup));
        }
        if self.notion.is_none() {
            self.notion = Some(ProviderSettings::from_lookup("NOTION", &lookup));
        }
        if self.google_calendar_id.is_none() {
            self.google_calendar_id = lookup("GOOGLE_CALENDAR_ID");
        }
        if self.notion_database_id.is_none() {
            self.notion_database_id = lookup("NOTION_DATABASE_ID");
        }
        if self.sync_interval.is_none() {
            if let Some(raw) = lookup("SYNC_INTERVAL_MINUTES") {
                let minutes: u64 = raw.trim().parse().map_err(|_| Error::Env {
                    name: "SYNC_INTERVAL_MINUTES".to_string(),
                    message: format!("expected a whole number of minutes, got '{}'", raw),
                })?;
                self.sync_interval = Some(Duration::from_secs(minutes * 60));
            }
        }
        Ok(self)
    }

    /// Builds the final `BrokerConfig`.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no HTTP client is available
    /// - [`Error::Config`] when a timing value or identifier is invalid
    pub fn build(self) -> Result<BrokerConfig> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let google_calendar = self.google_calendar.unwrap_or_default();
        let surface_factory = self
            .surface_factory
            .or_else(|| provide_default_surface_factory(&google_calendar.redirect_url));

        let config = BrokerConfig {
            http_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            surface_factory,
            google_calendar,
            notion: self.notion.unwrap_or_default(),
            google_calendar_id: self
                .google_calendar_id
                .unwrap_or_else(|| DEFAULT_GOOGLE_CALENDAR_ID.to_string()),
            notion_database_id: self.notion_database_id,
            auth_timeout: self.auth_timeout.unwrap_or(DEFAULT_AUTH_TIMEOUT),
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            closed_check_interval: self
                .closed_check_interval
                .unwrap_or(DEFAULT_CLOSED_CHECK_INTERVAL),
            sync_interval: self.sync_interval.unwrap_or(DEFAULT_SYNC_INTERVAL),
            auto_sync: self.auto_sync,
            sync_retry: self.sync_retry.unwrap_or_default(),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, HttpRequest, HttpResponse};
    use std::collections::HashMap;

    struct NoopHttpClient;

    #[async_trait]
    impl HttpClient for NoopHttpClient {
        async fn execute(
            &self,
            _request: HttpRequest,
        ) -> std::result::Result<HttpResponse, BridgeError> {
            Err(BridgeError::NotAvailable("offline".to_string()))
        }
    }

    fn builder() -> BrokerConfigBuilder {
        BrokerConfig::builder().http_client(Arc::new(NoopHttpClient))
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_build_with_defaults() {
        let config = builder().build().unwrap();

        assert_eq!(config.auth_timeout, Duration::from_secs(300));
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.closed_check_interval, Duration::from_secs(1));
        assert_eq!(config.sync_interval, Duration::from_secs(1800));
        assert_eq!(config.google_calendar_id, "primary");
        assert_eq!(config.sync_retry, RetryPolicy::none());
        assert!(config.surface_factory.is_none());
        assert!(!config.auto_sync);
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_http_client() {
        let result = BrokerConfig::builder().build();
        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "HttpClient"
        ));
    }

    #[test]
    fn test_validate_rejects_poll_interval_longer_than_timeout() {
        let result = builder()
            .auth_timeout(Duration::from_millis(400))
            .poll_interval(Duration::from_millis(500))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_blank_calendar_id() {
        let result = builder().google_calendar_id("  ").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        assert!(builder().auth_timeout(Duration::ZERO).build().is_err());
        assert!(builder()
            .closed_check_interval(Duration::ZERO)
            .build()
            .is_err());
        assert!(builder()
            .sync_interval(Duration::from_millis(10))
            .build()
            .is_err());
    }

    #[test]
    fn test_settings_missing_reports_blank_fields() {
        let settings = ProviderSettings::new("", "http://localhost:3000").with_api_key("X");

        let missing = settings.missing(&[
            SettingsField::ClientId,
            SettingsField::ApiKey,
            SettingsField::RedirectUrl,
        ]);
        assert_eq!(missing, vec![SettingsField::ClientId]);

        let err = settings
            .require(&[SettingsField::ClientId, SettingsField::ClientSecret])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required provider settings: client_id, client_secret"
        );
    }

    #[test]
    fn test_settings_whitespace_counts_as_missing() {
        let settings = ProviderSettings::new("  ", "x").with_scopes(["", " "]);
        assert_eq!(
            settings.missing(&[SettingsField::ClientId, SettingsField::Scopes]),
            vec![SettingsField::ClientId, SettingsField::Scopes]
        );
    }

    #[test]
    fn test_settings_from_lookup() {
        let lookup = lookup_from(&[
            ("GOOGLE_CLIENT_ID", "client.apps.googleusercontent.com"),
            ("GOOGLE_CLIENT_SECRET", "GOCSPX-secret"),
            ("GOOGLE_SCOPES", "calendar.readonly, calendar.events"),
            ("REDIRECT_URL", "http://localhost:3001/auth/google/callback"),
            ("NOTION_API_KEY", "  "),
        ]);

        let google = ProviderSettings::from_lookup("GOOGLE", &lookup);
        assert_eq!(google.client_id, "client.apps.googleusercontent.com");
        assert_eq!(google.client_secret.as_deref(), Some("GOCSPX-secret"));
        assert_eq!(google.scopes, vec!["calendar.readonly", "calendar.events"]);
        assert_eq!(
            google.redirect_url,
            "http://localhost:3001/auth/google/callback"
        );

        let notion = ProviderSettings::from_lookup("NOTION", &lookup);
        assert_eq!(notion.api_key, None);
    }

    #[test]
    fn test_builder_with_lookup_fills_unset_fields() {
        let lookup = lookup_from(&[
            ("NOTION_API_KEY", "secret_abc"),
            ("NOTION_DATABASE_ID", "db-1"),
            ("GOOGLE_CALENDAR_ID", "team@group.calendar.google.com"),
            ("SYNC_INTERVAL_MINUTES", "15"),
        ]);

        let config = builder()
            .google_calendar_id("primary")
            .with_lookup(lookup)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.google_calendar_id, "primary");
        assert_eq!(config.notion_database_id.as_deref(), Some("db-1"));
        assert_eq!(config.notion.api_key.as_deref(), Some("secret_abc"));
        assert_eq!(config.sync_interval, Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_builder_with_lookup_rejects_bad_interval() {
        let result = builder().with_lookup(lookup_from(&[("SYNC_INTERVAL_MINUTES", "soon")]));
        assert!(matches!(result, Err(Error::Env { ref name, .. }) if name == "SYNC_INTERVAL_MINUTES"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let settings = ProviderSettings::new("id", "http://localhost")
            .with_api_key("AIza-secret")
            .with_client_secret("GOCSPX-secret");

        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("AIza-secret"));
        assert!(!rendered.contains("GOCSPX-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
