//! # Authorization Handshake Manager
//!
//! Owns the lifecycle of every authorization request: opening the consent
//! surface, watching where it navigates, validating what comes back and
//! storing the resulting credential.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ──begin──▶ Pending ──▶ Authorized | Denied | TimedOut | Closed
//!                    │
//!                    └──▶ Failed (state mismatch, token exchange error)
//! ```
//!
//! At most one request is pending per provider. Starting a new one retires
//! the previous request: its surface is closed and anyone awaiting it sees
//! [`HandshakeOutcome::Closed`].
//!
//! ## Polling
//!
//! [`HandshakeManager::await_completion`] checks the surface location every
//! `poll_interval` and whether it was dismissed every `closed_check_interval`,
//! until the request deadline. Waits use the tokio timer, so tests can run
//! with paused time. Unreadable locations (cross-origin pages) are treated as
//! "not yet". Dropping the `await_completion` future before it settles
//! retires the request and closes its surface.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{HandshakeManager, ProviderKind};
//! use core_runtime::{BrokerConfig, EventBus};
//!
//! # async fn run(config: BrokerConfig) -> core_auth::Result<()> {
//! let manager = HandshakeManager::new(&config, EventBus::default());
//!
//! let handle = manager.begin_authorization(ProviderKind::GoogleCalendar).await?;
//! let outcome = manager.await_completion(&handle, None).await?;
//! println!("Google Calendar: {}", outcome.state());
//! # Ok(())
//! # }
//! ```

use crate::credentials::{CredentialReader, CredentialStore};
use crate::error::{AuthError, Result};
use crate::oauth::{
    endpoints_for, generate_state, parse_redirect, OAuthConfig, OAuthFlowManager, PkceVerifier,
    RedirectOutcome,
};
use crate::types::{
    AuthFlow, AuthorizationRequest, CodeCallback, Credential, HandshakeHandle, HandshakeOutcome,
    HandshakeState, ProviderInfo, ProviderKind,
};
use bridge_traits::http::HttpClient;
use bridge_traits::surface::{AuthSurface, SurfaceFactory};
use bridge_traits::time::Clock;
use core_runtime::config::{BrokerConfig, ProviderSettings, SettingsField};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

const POPUP_FIELDS: [SettingsField; 3] = [
    SettingsField::ClientId,
    SettingsField::ApiKey,
    SettingsField::RedirectUrl,
];

const CODE_FLOW_FIELDS: [SettingsField; 3] = [
    SettingsField::ClientId,
    SettingsField::ClientSecret,
    SettingsField::RedirectUrl,
];

/// A surface that is closed at most once, whoever gets there first.
struct SurfaceGuard {
    surface: Arc<dyn AuthSurface>,
    closed: AtomicBool,
}

impl SurfaceGuard {
    fn new(surface: Arc<dyn AuthSurface>) -> Self {
        Self {
            surface,
            closed: AtomicBool::new(false),
        }
    }

    async fn close_once(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.surface.close().await {
            debug!(error = %e, "Closing authorization surface failed");
        }
    }
}

/// Retires the request when an `await_completion` future is dropped before
/// it settles, so the surface does not outlive its waiter.
struct AwaitGuard {
    pending: Arc<Mutex<HashMap<ProviderKind, PendingHandshake>>>,
    states: Arc<RwLock<HashMap<ProviderKind, HandshakeState>>>,
    event_bus: EventBus,
    provider: ProviderKind,
    request_id: Uuid,
    surface: Arc<SurfaceGuard>,
    armed: bool,
}

impl AwaitGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AwaitGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(request_id = %self.request_id, "Await dropped outside a runtime");
            return;
        };

        let pending = self.pending.clone();
        let states = self.states.clone();
        let event_bus = self.event_bus.clone();
        let surface = self.surface.clone();
        let provider = self.provider;
        let request_id = self.request_id;
        runtime.spawn(async move {
            let removed = {
                let mut pending = pending.lock().await;
                let current = pending
                    .get(&provider)
                    .is_some_and(|entry| entry.request.id == request_id);
                current.then(|| pending.remove(&provider)).flatten()
            };
            surface.close_once().await;
            if let Some(entry) = removed {
                debug!(request_id = %request_id, "Await dropped, retiring authorization");
                entry.cancel.cancel();
                states.write().await.insert(provider, HandshakeState::Closed);
                let _ = event_bus.emit(CoreEvent::Auth(AuthEvent::Closed {
                    provider: provider.as_str().to_string(),
                }));
            }
        });
    }
}

struct PendingHandshake {
    request: AuthorizationRequest,
    redirect_uri: String,
    surface: Option<Arc<SurfaceGuard>>,
    cancel: CancellationToken,
    awaiting: bool,
    code_flow: Option<(OAuthConfig, PkceVerifier)>,
}

/// Runs authorization handshakes and owns the credential store.
pub struct HandshakeManager {
    settings: RwLock<HashMap<ProviderKind, ProviderSettings>>,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    surface_factory: Option<Arc<dyn SurfaceFactory>>,
    store: CredentialStore,
    event_bus: EventBus,
    auth_timeout: Duration,
    poll_interval: Duration,
    closed_check_interval: Duration,
    pending: Arc<Mutex<HashMap<ProviderKind, PendingHandshake>>>,
    states: Arc<RwLock<HashMap<ProviderKind, HandshakeState>>>,
    shutdown: CancellationToken,
}

impl HandshakeManager {
    pub fn new(config: &BrokerConfig, event_bus: EventBus) -> Self {
        Self {
            settings: RwLock::new(HashMap::from([
                (ProviderKind::GoogleCalendar, config.google_calendar.clone()),
                (ProviderKind::Notion, config.notion.clone()),
            ])),
            http_client: config.http_client.clone(),
            clock: config.clock.clone(),
            surface_factory: config.surface_factory.clone(),
            store: CredentialStore::new(config.clock.clone()),
            event_bus,
            auth_timeout: config.auth_timeout,
            poll_interval: config.poll_interval,
            closed_check_interval: config.closed_check_interval,
            pending: Arc::new(Mutex::new(HashMap::new())),
            states: Arc::new(RwLock::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Read-only view handed to provider clients.
    pub fn credentials(&self) -> CredentialReader {
        self.store.reader()
    }

    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        ProviderKind::ALL
            .into_iter()
            .map(|kind| {
                let endpoints = endpoints_for(kind);
                ProviderInfo {
                    kind,
                    display_name: kind.display_name().to_string(),
                    supports_popup_flow: kind.supports_popup_flow(),
                    supports_code_flow: kind.supports_code_flow(),
                    uses_integration_token: kind.uses_integration_token(),
                    auth_url: endpoints.as_ref().map(|e| e.auth_url.to_string()),
                    token_url: endpoints.as_ref().map(|e| e.token_url.to_string()),
                    default_scopes: endpoints
                        .map(|e| e.default_scopes.iter().map(|s| s.to_string()).collect())
                        .unwrap_or_default(),
                }
            })
            .collect()
    }

    pub async fn handshake_state(&self, provider: ProviderKind) -> HandshakeState {
        self.states
            .read()
            .await
            .get(&provider)
            .copied()
            .unwrap_or(HandshakeState::Idle)
    }

    /// Replace the settings later handshakes for `provider` start from.
    ///
    /// Requests already pending keep the settings they were started with.
    #[instrument(skip(self, settings), fields(provider = %provider))]
    pub async fn configure(&self, provider: ProviderKind, settings: ProviderSettings) {
        self.settings.write().await.insert(provider, settings);
        debug!("Provider settings replaced");
    }

    pub async fn is_connected(&self, provider: ProviderKind) -> bool {
        self.store.reader().is_valid(provider).await
    }

    pub async fn connected_providers(&self) -> Vec<ProviderKind> {
        self.store.reader().connected().await
    }

    /// Start a popup handshake.
    ///
    /// Validates settings, opens a fresh surface on the consent URL and
    /// registers the request as pending. Any earlier request for the same
    /// provider is retired.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Configuration`] when settings are missing, no surface
    ///   is available, or the provider has no popup flow. Nothing is opened.
    /// - [`AuthError::Surface`] when the surface cannot be created or opened.
    #[instrument(skip(self), fields(provider = %provider))]
    pub async fn begin_authorization(&self, provider: ProviderKind) -> Result<HandshakeHandle> {
        if !provider.supports_popup_flow() {
            return Err(configuration(
                provider,
                "provider is connected with an integration token, not a popup",
            ));
        }

        let settings = self.settings_for(provider).await;
        require_settings(provider, &settings, &POPUP_FIELDS)?;

        let factory = self
            .surface_factory
            .as_ref()
            .ok_or_else(|| configuration(provider, "no authorization surface available"))?;

        let oauth = OAuthConfig::for_provider(provider, &settings)?;
        let redirect_uri = oauth.redirect_uri.clone();
        let state = generate_state();
        let url = OAuthFlowManager::new(oauth, self.http_client.clone())
            .implicit_authorization_url(&state)?;

        let surface = factory
            .create()
            .map_err(|e| AuthError::Surface(e.to_string()))?;
        let guard = Arc::new(SurfaceGuard::new(surface));

        self.retire(provider).await;

        if let Err(e) = guard.surface.open(&url).await {
            guard.close_once().await;
            self.set_state(provider, HandshakeState::Failed).await;
            self.emit_error(provider, format!("could not open authorization surface: {}", e));
            return Err(AuthError::Surface(e.to_string()));
        }

        let request = self.new_request(provider, state, AuthFlow::Implicit);
        let handle = HandshakeHandle {
            provider,
            request_id: request.id,
            authorization_url: url,
        };

        self.register(PendingHandshake {
            request,
            redirect_uri,
            surface: Some(guard),
            cancel: self.shutdown.child_token(),
            awaiting: false,
            code_flow: None,
        })
        .await;

        info!(request_id = %handle.request_id, "Authorization surface opened");
        Ok(handle)
    }

    /// Wait for the pending request behind `handle` to resolve.
    ///
    /// `timeout` can only shorten the request's own deadline. The surface is
    /// closed exactly once whatever the outcome.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NoPendingRequest`] when the request is unknown or was replaced
    /// - [`AuthError::AlreadyAwaiting`] when another caller is waiting on it
    /// - [`AuthError::CsrfMismatch`] when the returned state does not match;
    ///   nothing is stored
    #[instrument(skip(self, handle), fields(provider = %handle.provider, request_id = %handle.request_id))]
    pub async fn await_completion(
        &self,
        handle: &HandshakeHandle,
        timeout: Option<Duration>,
    ) -> Result<HandshakeOutcome> {
        let provider = handle.provider;
        let (request, redirect_uri, surface, cancel) = {
            let mut pending = self.pending.lock().await;
            let entry = pending
                .get_mut(&provider)
                .filter(|entry| entry.request.id == handle.request_id)
                .ok_or_else(|| AuthError::NoPendingRequest {
                    provider: provider.to_string(),
                })?;
            if entry.awaiting {
                return Err(AuthError::AlreadyAwaiting {
                    provider: provider.to_string(),
                });
            }
            let surface = entry.surface.clone().ok_or_else(|| {
                configuration(provider, "request completes through the redirect callback")
            })?;
            entry.awaiting = true;
            (
                entry.request.clone(),
                entry.redirect_uri.clone(),
                surface,
                entry.cancel.clone(),
            )
        };

        let guard = AwaitGuard {
            pending: self.pending.clone(),
            states: self.states.clone(),
            event_bus: self.event_bus.clone(),
            provider,
            request_id: request.id,
            surface: surface.clone(),
            armed: true,
        };

        let remaining = (request.timeout_at - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let budget = timeout.map_or(remaining, |t| t.min(remaining));
        let deadline = Instant::now() + budget;

        let result = self
            .poll_surface(&request, &redirect_uri, &surface, &cancel, deadline)
            .await;

        let settled = self.finish(&request, &surface, result).await;
        guard.disarm();
        settled
    }

    async fn poll_surface(
        &self,
        request: &AuthorizationRequest,
        redirect_uri: &str,
        surface: &SurfaceGuard,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Result<HandshakeOutcome> {
        let start = Instant::now();
        let mut poll = interval_at(start + self.poll_interval, self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut closed_check = interval_at(
            start + self.closed_check_interval,
            self.closed_check_interval,
        );
        closed_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let expiry = tokio::time::sleep_until(deadline);
        tokio::pin!(expiry);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(HandshakeOutcome::Closed),
                _ = &mut expiry => return Ok(HandshakeOutcome::TimedOut),
                _ = closed_check.tick() => {
                    if surface.surface.is_closed().await {
                        return Ok(HandshakeOutcome::Closed);
                    }
                }
                _ = poll.tick() => {
                    if let Some(outcome) = self.inspect_location(request, redirect_uri, surface).await? {
                        return Ok(outcome);
                    }
                }
            }
        }
    }

    async fn inspect_location(
        &self,
        request: &AuthorizationRequest,
        redirect_uri: &str,
        surface: &SurfaceGuard,
    ) -> Result<Option<HandshakeOutcome>> {
        let location = match surface.surface.current_location().await {
            Ok(Some(location)) => location,
            Ok(None) => return Ok(None),
            Err(e) => {
                trace!(error = %e, "Surface location not readable yet");
                return Ok(None);
            }
        };

        match parse_redirect(&location, redirect_uri) {
            RedirectOutcome::Token {
                access_token,
                token_type,
                expires_in,
                scope,
                state,
            } => {
                verify_state(request, state.as_deref())?;

                let is_bearer = token_type
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case("bearer"));
                if !is_bearer {
                    debug!("Ignoring redirect with a non-Bearer token");
                    return Ok(None);
                }

                let mut credential = Credential::new(request.provider, access_token)
                    .with_scopes(split_scopes(scope.as_deref()));
                if let Some(seconds) = expires_in {
                    credential =
                        credential.with_expiry(self.clock.now() + chrono::Duration::seconds(seconds));
                }
                Ok(Some(HandshakeOutcome::Authorized(credential)))
            }
            RedirectOutcome::Error {
                error,
                description,
                state,
            } => {
                verify_state(request, state.as_deref())?;
                Ok(Some(HandshakeOutcome::Denied { error, description }))
            }
            RedirectOutcome::Code { .. } => {
                debug!("Ignoring authorization code on a popup request");
                Ok(None)
            }
            RedirectOutcome::Pending => Ok(None),
        }
    }

    /// Settle an awaited request: unregister it if it is still current, close
    /// the surface, store the credential and publish the result.
    async fn finish(
        &self,
        request: &AuthorizationRequest,
        surface: &SurfaceGuard,
        result: Result<HandshakeOutcome>,
    ) -> Result<HandshakeOutcome> {
        let provider = request.provider;
        let still_current = {
            let mut pending = self.pending.lock().await;
            let current = pending
                .get(&provider)
                .is_some_and(|entry| entry.request.id == request.id);
            if current {
                pending.remove(&provider);
            }
            current
        };

        surface.close_once().await;

        let result = match result {
            Ok(HandshakeOutcome::Authorized(_)) if !still_current => Ok(HandshakeOutcome::Closed),
            other => other,
        };

        match &result {
            Ok(outcome) => {
                if let HandshakeOutcome::Authorized(credential) = outcome {
                    self.store.insert(credential.clone()).await;
                }
                if still_current {
                    self.set_state(provider, outcome.state()).await;
                }
                self.emit_outcome(provider, outcome);
            }
            Err(e) => {
                warn!(error = %e, "Authorization aborted");
                if still_current {
                    self.set_state(provider, HandshakeState::Failed).await;
                }
                self.emit_error(provider, e.to_string());
            }
        }

        result
    }

    /// Abandon the pending request for `provider`, if any.
    ///
    /// Returns `true` when a request was pending. Awaiting callers resolve
    /// with [`HandshakeOutcome::Closed`].
    #[instrument(skip(self), fields(provider = %provider))]
    pub async fn cancel_authorization(&self, provider: ProviderKind) -> bool {
        self.retire(provider).await
    }

    /// Start a backend code-flow handshake. No surface is opened; the caller
    /// sends the user to `authorization_url` and the provider redirects back
    /// to the configured callback.
    #[instrument(skip(self), fields(provider = %provider))]
    pub async fn begin_code_authorization(&self, provider: ProviderKind) -> Result<HandshakeHandle> {
        if !provider.supports_code_flow() {
            return Err(configuration(
                provider,
                "provider does not support the authorization code flow",
            ));
        }

        let settings = self.settings_for(provider).await;
        require_settings(provider, &settings, &CODE_FLOW_FIELDS)?;

        let oauth = OAuthConfig::for_provider(provider, &settings)?;
        let redirect_uri = oauth.redirect_uri.clone();
        let state = generate_state();
        let verifier = PkceVerifier::new();
        let url = OAuthFlowManager::new(oauth.clone(), self.http_client.clone())
            .code_authorization_url(&state, &verifier)?;

        self.retire(provider).await;

        let request = self.new_request(provider, state, AuthFlow::AuthorizationCode);
        let handle = HandshakeHandle {
            provider,
            request_id: request.id,
            authorization_url: url,
        };

        self.register(PendingHandshake {
            request,
            redirect_uri,
            surface: None,
            cancel: self.shutdown.child_token(),
            awaiting: false,
            code_flow: Some((oauth, verifier)),
        })
        .await;

        Ok(handle)
    }

    /// Complete a code-flow handshake from the redirect's query parameters.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NoPendingRequest`] without a pending code-flow request
    /// - [`AuthError::CsrfMismatch`] when `state` is missing or wrong
    /// - [`AuthError::RequestExpired`] past the request deadline
    /// - [`AuthError::TokenExchange`] when the token endpoint rejects the code
    #[instrument(skip(self, callback), fields(provider = %provider))]
    pub async fn complete_code_authorization(
        &self,
        provider: ProviderKind,
        callback: &CodeCallback,
    ) -> Result<HandshakeOutcome> {
        let entry = {
            let mut pending = self.pending.lock().await;
            let is_code_flow = pending
                .get(&provider)
                .is_some_and(|entry| entry.code_flow.is_some());
            if !is_code_flow {
                return Err(AuthError::NoPendingRequest {
                    provider: provider.to_string(),
                });
            }
            pending.remove(&provider)
        };
        let Some(PendingHandshake {
            request,
            code_flow: Some((oauth, verifier)),
            ..
        }) = entry
        else {
            return Err(AuthError::NoPendingRequest {
                provider: provider.to_string(),
            });
        };

        let result = self
            .settle_code_callback(&request, oauth, &verifier, callback)
            .await;

        match &result {
            Ok(outcome) => {
                if let HandshakeOutcome::Authorized(credential) = outcome {
                    self.store.insert(credential.clone()).await;
                }
                self.set_state(provider, outcome.state()).await;
                self.emit_outcome(provider, outcome);
            }
            Err(AuthError::RequestExpired { .. }) => {
                self.set_state(provider, HandshakeState::TimedOut).await;
                self.emit(AuthEvent::TimedOut {
                    provider: provider.as_str().to_string(),
                });
            }
            Err(e) => {
                warn!(error = %e, "Code authorization aborted");
                self.set_state(provider, HandshakeState::Failed).await;
                self.emit_error(provider, e.to_string());
            }
        }

        result
    }

    async fn settle_code_callback(
        &self,
        request: &AuthorizationRequest,
        oauth: OAuthConfig,
        verifier: &PkceVerifier,
        callback: &CodeCallback,
    ) -> Result<HandshakeOutcome> {
        verify_state(request, callback.state.as_deref())?;

        if request.is_expired_at(self.clock.now()) {
            return Err(AuthError::RequestExpired {
                provider: request.provider.to_string(),
            });
        }

        if let Some(error) = &callback.error {
            return Ok(HandshakeOutcome::Denied {
                error: error.clone(),
                description: callback.error_description.clone(),
            });
        }

        let code = callback
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| AuthError::InvalidTokenResponse("callback carried no code".to_string()))?;

        let token = OAuthFlowManager::new(oauth, self.http_client.clone())
            .exchange_code(code, verifier)
            .await?;

        let mut credential = Credential::new(request.provider, token.access_token)
            .with_scopes(split_scopes(token.scope.as_deref()));
        if let Some(seconds) = token.expires_in {
            credential = credential.with_expiry(self.clock.now() + chrono::Duration::seconds(seconds));
        }
        Ok(HandshakeOutcome::Authorized(credential))
    }

    /// Connect an integration-token provider.
    ///
    /// Uses `token` when given, otherwise the configured API key.
    #[instrument(skip(self, token), fields(provider = %provider))]
    pub async fn authorize_with_token(
        &self,
        provider: ProviderKind,
        token: Option<&str>,
    ) -> Result<Credential> {
        if !provider.uses_integration_token() {
            return Err(configuration(
                provider,
                "provider requires an interactive authorization",
            ));
        }

        let token = match token {
            Some(token) => token.trim().to_string(),
            None => self
                .settings_for(provider)
                .await
                .api_key
                .unwrap_or_default(),
        };
        if token.trim().is_empty() {
            return Err(configuration(
                provider,
                format!("Missing required provider settings: {}", SettingsField::ApiKey),
            ));
        }

        let credential = Credential::new(provider, token);
        self.store.insert(credential.clone()).await;
        self.set_state(provider, HandshakeState::Authorized).await;
        self.emit(AuthEvent::SignedIn {
            provider: provider.as_str().to_string(),
            expires_at: None,
        });

        info!("Integration token stored");
        Ok(credential)
    }

    /// Drop the stored credential. Returns `true` when one existed.
    #[instrument(skip(self), fields(provider = %provider))]
    pub async fn disconnect(&self, provider: ProviderKind) -> bool {
        let removed = self.store.remove(provider).await;
        if removed {
            self.set_state(provider, HandshakeState::Idle).await;
            self.emit(AuthEvent::SignedOut {
                provider: provider.as_str().to_string(),
            });
            info!("Provider disconnected");
        }
        removed
    }

    /// Cancel every pending request and close their surfaces.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        for provider in ProviderKind::ALL {
            self.retire(provider).await;
        }
    }

    async fn settings_for(&self, provider: ProviderKind) -> ProviderSettings {
        self.settings
            .read()
            .await
            .get(&provider)
            .cloned()
            .unwrap_or_default()
    }

    fn new_request(&self, provider: ProviderKind, state: String, flow: AuthFlow) -> AuthorizationRequest {
        let now = self.clock.now();
        let lifetime =
            chrono::Duration::from_std(self.auth_timeout).unwrap_or_else(|_| chrono::Duration::minutes(5));
        AuthorizationRequest {
            id: Uuid::new_v4(),
            provider,
            anti_forgery_state: state,
            flow,
            created_at: now,
            timeout_at: now + lifetime,
        }
    }

    async fn register(&self, entry: PendingHandshake) {
        let provider = entry.request.provider;
        let request_id = entry.request.id;
        let replaced = self.pending.lock().await.insert(provider, entry);
        if let Some(old) = replaced {
            self.retire_entry(provider, old).await;
        }
        self.set_state(provider, HandshakeState::Pending).await;
        self.emit(AuthEvent::SigningIn {
            provider: provider.as_str().to_string(),
            request_id: request_id.to_string(),
        });
    }

    /// Remove the pending request, cancel its waiter and close its surface.
    async fn retire(&self, provider: ProviderKind) -> bool {
        let Some(entry) = self.pending.lock().await.remove(&provider) else {
            return false;
        };
        self.retire_entry(provider, entry).await;
        true
    }

    async fn retire_entry(&self, provider: ProviderKind, entry: PendingHandshake) {
        debug!(request_id = %entry.request.id, "Retiring pending authorization");
        entry.cancel.cancel();
        if let Some(surface) = &entry.surface {
            surface.close_once().await;
        }

        self.set_state(provider, HandshakeState::Closed).await;
        if !entry.awaiting {
            self.emit(AuthEvent::Closed {
                provider: provider.as_str().to_string(),
            });
        }
    }

    async fn set_state(&self, provider: ProviderKind, state: HandshakeState) {
        self.states.write().await.insert(provider, state);
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }

    fn emit_outcome(&self, provider: ProviderKind, outcome: &HandshakeOutcome) {
        let provider = provider.as_str().to_string();
        let event = match outcome {
            HandshakeOutcome::Authorized(credential) => AuthEvent::SignedIn {
                provider,
                expires_at: credential.expires_at.map(|at| at.timestamp()),
            },
            HandshakeOutcome::Denied { error, .. } => AuthEvent::Denied {
                provider,
                error: error.clone(),
            },
            HandshakeOutcome::TimedOut => AuthEvent::TimedOut { provider },
            HandshakeOutcome::Closed => AuthEvent::Closed { provider },
        };
        self.emit(event);
    }

    fn emit_error(&self, provider: ProviderKind, message: String) {
        self.emit(AuthEvent::AuthError {
            provider: Some(provider.as_str().to_string()),
            message,
            recoverable: true,
        });
    }
}

fn require_settings(
    provider: ProviderKind,
    settings: &ProviderSettings,
    fields: &[SettingsField],
) -> Result<()> {
    let missing = settings.missing(fields);
    if missing.is_empty() {
        return Ok(());
    }
    let names: Vec<&str> = missing.iter().map(SettingsField::name).collect();
    Err(configuration(
        provider,
        format!("Missing required provider settings: {}", names.join(", ")),
    ))
}

fn configuration(provider: ProviderKind, message: impl Into<String>) -> AuthError {
    AuthError::Configuration {
        provider: provider.to_string(),
        message: message.into(),
    }
}

/// A missing state counts as a mismatch.
fn verify_state(request: &AuthorizationRequest, returned: Option<&str>) -> Result<()> {
    if returned == Some(request.anti_forgery_state.as_str()) {
        return Ok(());
    }
    warn!(provider = %request.provider, "Anti-forgery state mismatch");
    Err(AuthError::CsrfMismatch {
        provider: request.provider.to_string(),
    })
}

fn split_scopes(scope: Option<&str>) -> Vec<String> {
    scope
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::{HttpRequest, HttpResponse};
    use bridge_traits::time::ManualClock;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use mockall::mock;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::broadcast::Receiver;

    const REDIRECT: &str = "http://localhost:3000";

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    #[derive(Default)]
    struct FakeSurface {
        opened: StdMutex<Option<String>>,
        location: StdMutex<Option<String>>,
        unreadable_polls: AtomicUsize,
        dismissed: AtomicBool,
        close_calls: AtomicUsize,
        open_yields: usize,
    }

    impl FakeSurface {
        fn navigate(&self, location: impl Into<String>) {
            *self.location.lock().unwrap() = Some(location.into());
        }

        fn closes(&self) -> usize {
            self.close_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthSurface for FakeSurface {
        async fn open(&self, url: &str) -> BridgeResult<()> {
            for _ in 0..self.open_yields {
                tokio::task::yield_now().await;
            }
            *self.opened.lock().unwrap() = Some(url.to_string());
            Ok(())
        }

        async fn is_closed(&self) -> bool {
            self.dismissed.load(Ordering::SeqCst)
        }

        async fn current_location(&self) -> BridgeResult<Option<String>> {
            let remaining = self.unreadable_polls.load(Ordering::SeqCst);
            if remaining > 0 {
                self.unreadable_polls.store(remaining - 1, Ordering::SeqCst);
                return Err(BridgeError::NetworkTransient("cross-origin".to_string()));
            }
            Ok(self.location.lock().unwrap().clone())
        }

        async fn close(&self) -> BridgeResult<()> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            self.dismissed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeFactory {
        created: StdMutex<Vec<Arc<FakeSurface>>>,
        open_yields: usize,
    }

    impl FakeFactory {
        fn surface(&self, index: usize) -> Arc<FakeSurface> {
            self.created.lock().unwrap()[index].clone()
        }

        fn count(&self) -> usize {
            self.created.lock().unwrap().len()
        }
    }

    impl SurfaceFactory for FakeFactory {
        fn create(&self) -> BridgeResult<Arc<dyn AuthSurface>> {
            let surface = Arc::new(FakeSurface {
                open_yields: self.open_yields,
                ..Default::default()
            });
            self.created.lock().unwrap().push(surface.clone());
            Ok(surface)
        }
    }

    fn start_time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn google_settings() -> ProviderSettings {
        ProviderSettings::new("client-123", REDIRECT)
            .with_api_key("api-key")
            .with_client_secret("shh")
    }

    fn build(
        google: ProviderSettings,
        http: MockHttpClient,
    ) -> (HandshakeManager, Arc<FakeFactory>, EventBus) {
        build_with_factory(google, http, Arc::new(FakeFactory::default()))
    }

    fn build_with_factory(
        google: ProviderSettings,
        http: MockHttpClient,
        factory: Arc<FakeFactory>,
    ) -> (HandshakeManager, Arc<FakeFactory>, EventBus) {
        let config = BrokerConfig::builder()
            .http_client(Arc::new(http))
            .clock(Arc::new(ManualClock::new(start_time())))
            .surface_factory(factory.clone())
            .google_calendar(google)
            .notion(ProviderSettings::default().with_api_key("secret_notion"))
            .build()
            .unwrap();
        let bus = EventBus::new(32);
        (HandshakeManager::new(&config, bus.clone()), factory, bus)
    }

    fn manager() -> (HandshakeManager, Arc<FakeFactory>, EventBus) {
        build(google_settings(), MockHttpClient::new())
    }

    fn state_of(handle: &HandshakeHandle) -> String {
        url::Url::parse(&handle.authorization_url)
            .unwrap()
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .unwrap()
    }

    fn token_redirect(state: &str) -> String {
        format!(
            "{}/#access_token=ya29.token&token_type=Bearer&expires_in=3599&scope=calendar.events&state={}",
            REDIRECT, state
        )
    }

    fn drain(rx: &mut Receiver<CoreEvent>) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_begin_without_settings_is_configuration_error() {
        let (manager, factory, _) = build(
            ProviderSettings::new("client-123", REDIRECT),
            MockHttpClient::new(),
        );

        let err = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(err.to_string().contains("api_key"));
        assert_eq!(factory.count(), 0);
        assert_eq!(
            manager.handshake_state(ProviderKind::GoogleCalendar).await,
            HandshakeState::Idle
        );
    }

    #[tokio::test]
    async fn test_reconfigured_settings_apply_to_next_begin() {
        let (manager, factory, _) = manager();

        manager
            .configure(
                ProviderKind::GoogleCalendar,
                ProviderSettings::new("", REDIRECT).with_api_key("X"),
            )
            .await;
        let err = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("client_id"));
        assert_eq!(factory.count(), 0);

        manager
            .configure(
                ProviderKind::GoogleCalendar,
                ProviderSettings::new("client-456", REDIRECT).with_api_key("X"),
            )
            .await;
        let handle = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();
        assert!(handle.authorization_url.contains("client_id=client-456"));
        assert_eq!(factory.count(), 1);
    }

    #[tokio::test]
    async fn test_notion_has_no_popup_flow() {
        let (manager, factory, _) = manager();

        let err = manager
            .begin_authorization(ProviderKind::Notion)
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(factory.count(), 0);
    }

    #[tokio::test]
    async fn test_begin_opens_surface_on_consent_url() {
        let (manager, factory, bus) = manager();
        let mut rx = bus.subscribe();

        let handle = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();

        let opened = factory.surface(0).opened.lock().unwrap().clone().unwrap();
        assert_eq!(opened, handle.authorization_url);
        assert!(opened.contains("response_type=token"));
        assert_eq!(state_of(&handle).len(), 22);
        assert_eq!(
            manager.handshake_state(ProviderKind::GoogleCalendar).await,
            HandshakeState::Pending
        );
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [CoreEvent::Auth(AuthEvent::SigningIn { .. })]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_authorized_stores_credential_and_closes_once() {
        let (manager, factory, bus) = manager();
        let handle = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();
        let mut rx = bus.subscribe();
        let surface = factory.surface(0);
        surface.navigate(token_redirect(&state_of(&handle)));

        let outcome = manager.await_completion(&handle, None).await.unwrap();

        let credential = outcome.credential().unwrap();
        assert_eq!(credential.bearer_token, "ya29.token");
        assert_eq!(
            credential.expires_at,
            Some(start_time() + chrono::Duration::seconds(3599))
        );
        assert_eq!(credential.scopes, vec!["calendar.events".to_string()]);
        assert_eq!(surface.closes(), 1);
        assert!(manager.is_connected(ProviderKind::GoogleCalendar).await);
        assert_eq!(
            manager.handshake_state(ProviderKind::GoogleCalendar).await,
            HandshakeState::Authorized
        );
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [CoreEvent::Auth(AuthEvent::SignedIn { expires_at: Some(_), .. })]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_mismatch_aborts_without_storing() {
        let (manager, factory, _) = manager();
        let handle = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();
        let surface = factory.surface(0);
        surface.navigate(token_redirect("forged"));

        let err = manager.await_completion(&handle, None).await.unwrap_err();

        assert!(err.is_csrf_mismatch());
        assert!(!manager.is_connected(ProviderKind::GoogleCalendar).await);
        assert_eq!(surface.closes(), 1);
        assert_eq!(
            manager.handshake_state(ProviderKind::GoogleCalendar).await,
            HandshakeState::Failed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_state_is_mismatch() {
        let (manager, factory, _) = manager();
        let handle = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();
        factory
            .surface(0)
            .navigate(format!("{}/#access_token=t&token_type=Bearer", REDIRECT));

        let err = manager.await_completion(&handle, None).await.unwrap_err();
        assert!(err.is_csrf_mismatch());
    }

    #[tokio::test(start_paused = true)]
    async fn test_access_denied() {
        let (manager, factory, _) = manager();
        let handle = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();
        let surface = factory.surface(0);
        surface.navigate(format!(
            "{}/#error=access_denied&state={}",
            REDIRECT,
            state_of(&handle)
        ));

        let outcome = manager.await_completion(&handle, None).await.unwrap();

        assert!(outcome.is_access_denied());
        assert_eq!(surface.closes(), 1);
        assert!(!manager.is_connected(ProviderKind::GoogleCalendar).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismissed_surface_resolves_closed() {
        let (manager, factory, _) = manager();
        let handle = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();
        factory.surface(0).dismissed.store(true, Ordering::SeqCst);

        let outcome = manager.await_completion(&handle, None).await.unwrap();

        assert_eq!(outcome, HandshakeOutcome::Closed);
        assert_eq!(factory.surface(0).closes(), 1);
        assert_eq!(
            manager.handshake_state(ProviderKind::GoogleCalendar).await,
            HandshakeState::Closed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_deadline() {
        let (manager, factory, _) = manager();
        let handle = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();
        let started = Instant::now();

        let outcome = manager.await_completion(&handle, None).await.unwrap();

        assert_eq!(outcome, HandshakeOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_secs(300));
        assert!(started.elapsed() < Duration::from_secs(301));
        assert_eq!(factory.surface(0).closes(), 1);
        assert_eq!(
            manager.handshake_state(ProviderKind::GoogleCalendar).await,
            HandshakeState::TimedOut
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_call_timeout_shortens_deadline() {
        let (manager, _, _) = manager();
        let handle = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();
        let started = Instant::now();

        let outcome = manager
            .await_completion(&handle, Some(Duration::from_secs(10)))
            .await
            .unwrap();

        assert_eq!(outcome, HandshakeOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_location_keeps_polling() {
        let (manager, factory, _) = manager();
        let handle = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();
        let surface = factory.surface(0);
        surface.unreadable_polls.store(4, Ordering::SeqCst);
        surface.navigate(token_redirect(&state_of(&handle)));

        let outcome = manager.await_completion(&handle, None).await.unwrap();

        assert_eq!(outcome.state(), HandshakeState::Authorized);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_bearer_token_is_ignored() {
        let (manager, factory, _) = manager();
        let handle = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();
        factory.surface(0).navigate(format!(
            "{}/#access_token=t&token_type=mac&state={}",
            REDIRECT,
            state_of(&handle)
        ));

        let outcome = manager
            .await_completion(&handle, Some(Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(outcome, HandshakeOutcome::TimedOut);
        assert!(!manager.is_connected(ProviderKind::GoogleCalendar).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_await_is_rejected() {
        let (manager, _, _) = manager();
        let manager = Arc::new(manager);
        let handle = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();

        let waiter = {
            let manager = manager.clone();
            let handle = handle.clone();
            tokio::spawn(async move { manager.await_completion(&handle, None).await })
        };
        tokio::task::yield_now().await;

        let err = manager.await_completion(&handle, None).await.unwrap_err();
        assert!(matches!(err, AuthError::AlreadyAwaiting { .. }));

        assert!(manager.cancel_authorization(ProviderKind::GoogleCalendar).await);
        assert_eq!(waiter.await.unwrap().unwrap(), HandshakeOutcome::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_request_supersedes_old() {
        let (manager, factory, _) = manager();
        let first = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();
        let second = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();

        assert_ne!(first.request_id, second.request_id);
        assert_ne!(state_of(&first), state_of(&second));
        assert_eq!(factory.surface(0).closes(), 1);
        assert_eq!(factory.surface(1).closes(), 0);
        assert!(matches!(
            manager.await_completion(&first, None).await,
            Err(AuthError::NoPendingRequest { .. })
        ));
        assert_eq!(
            manager.handshake_state(ProviderKind::GoogleCalendar).await,
            HandshakeState::Pending
        );

        // the old state no longer authorizes anything
        factory.surface(1).navigate(token_redirect(&state_of(&first)));
        let err = manager.await_completion(&second, None).await.unwrap_err();
        assert!(err.is_csrf_mismatch());
    }

    #[tokio::test(start_paused = true)]
    async fn test_awaiting_superseded_request_resolves_closed() {
        let (manager, factory, _) = manager();
        let manager = Arc::new(manager);
        let first = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.await_completion(&first, None).await })
        };
        tokio::task::yield_now().await;

        manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();

        assert_eq!(waiter.await.unwrap().unwrap(), HandshakeOutcome::Closed);
        assert_eq!(factory.surface(0).closes(), 1);
        assert_eq!(
            manager.handshake_state(ProviderKind::GoogleCalendar).await,
            HandshakeState::Pending
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_begins_leave_one_surface_open() {
        let factory = Arc::new(FakeFactory {
            open_yields: 3,
            ..Default::default()
        });
        let (manager, factory, _) =
            build_with_factory(google_settings(), MockHttpClient::new(), factory);

        let (first, second) = tokio::join!(
            manager.begin_authorization(ProviderKind::GoogleCalendar),
            manager.begin_authorization(ProviderKind::GoogleCalendar),
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(factory.count(), 2);
        let closes = [factory.surface(0).closes(), factory.surface(1).closes()];
        assert_eq!(closes.iter().sum::<usize>(), 1, "closes: {:?}", closes);
        assert_ne!(first.request_id, second.request_id);
        assert_eq!(
            manager.handshake_state(ProviderKind::GoogleCalendar).await,
            HandshakeState::Pending
        );

        assert!(manager.cancel_authorization(ProviderKind::GoogleCalendar).await);
        assert_eq!(factory.surface(0).closes(), 1);
        assert_eq!(factory.surface(1).closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_await_retires_request() {
        let (manager, factory, bus) = manager();
        let handle = manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();
        let mut rx = bus.subscribe();

        let waited =
            tokio::time::timeout(Duration::from_secs(1), manager.await_completion(&handle, None))
                .await;
        assert!(waited.is_err());
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(factory.surface(0).closes(), 1);
        assert_eq!(
            manager.handshake_state(ProviderKind::GoogleCalendar).await,
            HandshakeState::Closed
        );
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [CoreEvent::Auth(AuthEvent::Closed { .. })]
        ));
        assert!(matches!(
            manager.await_completion(&handle, None).await,
            Err(AuthError::NoPendingRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_without_pending_request() {
        let (manager, _, _) = manager();
        assert!(!manager.cancel_authorization(ProviderKind::GoogleCalendar).await);
    }

    #[tokio::test]
    async fn test_code_flow_exchanges_code() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: Bytes::from_static(
                    br#"{"access_token":"ya29.code","expires_in":3600,"token_type":"Bearer","scope":"a b"}"#,
                ),
            })
        });
        let (manager, factory, _) = build(google_settings(), http);

        let handle = manager
            .begin_code_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();
        assert_eq!(factory.count(), 0);
        assert!(handle.authorization_url.contains("code_challenge="));

        let callback = CodeCallback {
            code: Some("4/0A".to_string()),
            state: Some(state_of(&handle)),
            ..Default::default()
        };
        let outcome = manager
            .complete_code_authorization(ProviderKind::GoogleCalendar, &callback)
            .await
            .unwrap();

        assert_eq!(outcome.credential().unwrap().bearer_token, "ya29.code");
        assert_eq!(outcome.credential().unwrap().scopes.len(), 2);
        assert!(manager.is_connected(ProviderKind::GoogleCalendar).await);
    }

    #[tokio::test]
    async fn test_code_flow_state_mismatch_skips_exchange() {
        let (manager, _, _) = manager();
        manager
            .begin_code_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();

        let callback = CodeCallback {
            code: Some("4/0A".to_string()),
            state: Some("forged".to_string()),
            ..Default::default()
        };
        let err = manager
            .complete_code_authorization(ProviderKind::GoogleCalendar, &callback)
            .await
            .unwrap_err();

        assert!(err.is_csrf_mismatch());
        assert!(matches!(
            manager
                .complete_code_authorization(ProviderKind::GoogleCalendar, &callback)
                .await,
            Err(AuthError::NoPendingRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_code_flow_requires_client_secret() {
        let (manager, _, _) = build(
            ProviderSettings::new("client-123", REDIRECT).with_api_key("k"),
            MockHttpClient::new(),
        );

        let err = manager
            .begin_code_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_integration_token_and_disconnect() {
        let (manager, _, bus) = manager();
        let mut rx = bus.subscribe();

        let credential = manager
            .authorize_with_token(ProviderKind::Notion, None)
            .await
            .unwrap();
        assert_eq!(credential.bearer_token, "secret_notion");
        assert_eq!(manager.connected_providers().await, vec![ProviderKind::Notion]);

        assert!(manager.disconnect(ProviderKind::Notion).await);
        assert!(!manager.disconnect(ProviderKind::Notion).await);
        assert!(!manager.is_connected(ProviderKind::Notion).await);

        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [
                CoreEvent::Auth(AuthEvent::SignedIn { .. }),
                CoreEvent::Auth(AuthEvent::SignedOut { .. })
            ]
        ));
    }

    #[tokio::test]
    async fn test_integration_token_rejected_for_google() {
        let (manager, _, _) = manager();
        let err = manager
            .authorize_with_token(ProviderKind::GoogleCalendar, Some("x"))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_pending_surfaces() {
        let (manager, factory, _) = manager();
        manager
            .begin_authorization(ProviderKind::GoogleCalendar)
            .await
            .unwrap();

        manager.shutdown().await;

        assert_eq!(factory.surface(0).closes(), 1);
        assert!(!manager.cancel_authorization(ProviderKind::GoogleCalendar).await);
    }

    #[test]
    fn test_list_providers() {
        let (manager, _, _) = manager();
        let providers = manager.list_providers();

        assert_eq!(providers.len(), 2);
        assert!(providers[0].supports_popup_flow);
        assert!(providers[1].auth_url.is_none());
    }
}
