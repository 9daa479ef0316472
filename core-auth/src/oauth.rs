//! OAuth 2.0 helpers for the handshake
//!
//! Builds consent URLs for the implicit (popup) and authorization-code grants,
//! parses the redirect a surface lands on, and exchanges codes for tokens.
//!
//! # Security
//!
//! - `state` is 16 random bytes, base64url without padding
//! - The code grant always uses PKCE (S256)
//! - Tokens, codes and verifiers are never logged
//!
//! # Example
//!
//! ```
//! use core_auth::oauth::{generate_state, parse_redirect, RedirectOutcome};
//!
//! let state = generate_state();
//! let location = format!(
//!     "http://localhost:3000/#access_token=ya29&token_type=Bearer&expires_in=3599&state={}",
//!     state
//! );
//!
//! match parse_redirect(&location, "http://localhost:3000") {
//!     RedirectOutcome::Token { state: returned, .. } => assert_eq!(returned.as_deref(), Some(state.as_str())),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

use crate::error::{AuthError, Result};
use crate::types::ProviderKind;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use core_runtime::config::ProviderSettings;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};
use url::Url;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

pub const GOOGLE_CALENDAR_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/calendar.readonly",
    "https://www.googleapis.com/auth/calendar.events",
];

/// Authorization server endpoints of an OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthEndpoints {
    pub auth_url: &'static str,
    pub token_url: &'static str,
    pub default_scopes: &'static [&'static str],
}

/// Endpoints for `provider`, `None` for providers without an OAuth grant.
pub fn endpoints_for(provider: ProviderKind) -> Option<OAuthEndpoints> {
    match provider {
        ProviderKind::GoogleCalendar => Some(OAuthEndpoints {
            auth_url: GOOGLE_AUTH_URL,
            token_url: GOOGLE_TOKEN_URL,
            default_scopes: &GOOGLE_CALENDAR_SCOPES,
        }),
        ProviderKind::Notion => None,
    }
}

/// Fresh anti-forgery value: 16 random bytes, base64url without padding.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// PKCE code verifier. Only the challenge leaves the process before the
/// exchange.
#[derive(Clone)]
pub struct PkceVerifier {
    verifier: String,
}

impl PkceVerifier {
    pub fn new() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill(&mut bytes);
        Self {
            verifier: URL_SAFE_NO_PAD.encode(bytes),
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// `BASE64URL(SHA256(verifier))`
    pub fn challenge(&self) -> String {
        let digest = Sha256::digest(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceVerifier")
            .field("verifier", &"[REDACTED]")
            .finish()
    }
}

/// Client registration for one provider.
#[derive(Clone)]
pub struct OAuthConfig {
    pub provider: ProviderKind,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
}

impl OAuthConfig {
    /// Combine the provider's endpoints with configured settings. Empty
    /// configured scopes fall back to the provider defaults.
    pub fn for_provider(provider: ProviderKind, settings: &ProviderSettings) -> Result<Self> {
        let endpoints = endpoints_for(provider).ok_or_else(|| AuthError::Configuration {
            provider: provider.to_string(),
            message: "provider does not support OAuth authorization".to_string(),
        })?;

        let scopes = if settings.scopes.is_empty() {
            endpoints
                .default_scopes
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            settings.scopes.clone()
        };

        Ok(Self {
            provider,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_url.clone(),
            scopes,
            auth_url: endpoints.auth_url.to_string(),
            token_url: endpoints.token_url.to_string(),
        })
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// What a surface location says about the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// Implicit grant succeeded.
    Token {
        access_token: String,
        token_type: Option<String>,
        expires_in: Option<i64>,
        scope: Option<String>,
        state: Option<String>,
    },
    /// Provider reported an error (`access_denied` on refusal).
    Error {
        error: String,
        description: Option<String>,
        state: Option<String>,
    },
    /// Code grant redirect.
    Code { code: String, state: Option<String> },
    /// Still on the provider's pages, or not a redirect to us.
    Pending,
}

/// Inspect the location a surface currently shows.
///
/// Only locations on the redirect origin (and under its path) are considered;
/// provider pages are `Pending`. Query and fragment parameters are merged, the
/// fragment winning on conflicts.
pub fn parse_redirect(location: &str, redirect_uri: &str) -> RedirectOutcome {
    let (Ok(current), Ok(expected)) = (Url::parse(location), Url::parse(redirect_uri)) else {
        return RedirectOutcome::Pending;
    };

    if current.origin() != expected.origin() {
        return RedirectOutcome::Pending;
    }
    let expected_path = expected.path().trim_end_matches('/');
    let under_redirect = current
        .path()
        .strip_prefix(expected_path)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
    if !under_redirect {
        return RedirectOutcome::Pending;
    }

    let mut params: HashMap<String, String> = current
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if let Some(fragment) = current.fragment() {
        let fragment_params: Vec<(String, String)> =
            serde_urlencoded::from_str(fragment).unwrap_or_default();
        params.extend(fragment_params);
    }

    let state = params.get("state").cloned();

    if let Some(error) = params.get("error") {
        return RedirectOutcome::Error {
            error: error.clone(),
            description: params.get("error_description").cloned(),
            state,
        };
    }

    if let Some(access_token) = params.get("access_token") {
        return RedirectOutcome::Token {
            access_token: access_token.clone(),
            token_type: params.get("token_type").cloned(),
            expires_in: params.get("expires_in").and_then(|v| v.parse().ok()),
            scope: params.get("scope").cloned(),
            state,
        };
    }

    if let Some(code) = params.get("code") {
        return RedirectOutcome::Code {
            code: code.clone(),
            state,
        };
    }

    RedirectOutcome::Pending
}

/// Builds consent URLs and performs the code exchange for one provider.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    fn base_url(&self, response_type: &str, state: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.auth_url).map_err(|e| AuthError::Configuration {
            provider: self.config.provider.to_string(),
            message: format!("invalid authorization URL: {}", e),
        })?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", response_type)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state);

        Ok(url)
    }

    /// Consent URL for the popup flow: the token comes back in the fragment.
    #[instrument(skip(self, state), fields(provider = %self.config.provider))]
    pub fn implicit_authorization_url(&self, state: &str) -> Result<String> {
        let mut url = self.base_url("token", state)?;
        url.query_pairs_mut()
            .append_pair("include_granted_scopes", "true");

        tracing::debug!("Built implicit authorization URL");
        Ok(url.to_string())
    }

    /// Consent URL for the backend code flow with a PKCE challenge.
    #[instrument(skip(self, state, verifier), fields(provider = %self.config.provider))]
    pub fn code_authorization_url(&self, state: &str, verifier: &PkceVerifier) -> Result<String> {
        let mut url = self.base_url("code", state)?;
        url.query_pairs_mut()
            .append_pair("code_challenge", &verifier.challenge())
            .append_pair("code_challenge_method", "S256")
            .append_pair("access_type", "offline")
            .append_pair("include_granted_scopes", "true");

        tracing::debug!("Built code authorization URL");
        Ok(url.to_string())
    }

    /// Exchange an authorization code. Single attempt.
    #[instrument(skip(self, code, verifier), fields(provider = %self.config.provider))]
    pub async fn exchange_code(&self, code: &str, verifier: &PkceVerifier) -> Result<TokenResponse> {
        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.config.redirect_uri),
            ("client_id", &self.config.client_id),
            ("code_verifier", verifier.verifier()),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        let encoded = serde_urlencoded::to_string(&params)
            .map_err(|e| AuthError::InvalidTokenResponse(format!("encode failed: {}", e)))?;

        let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
            .header("Accept", "application/json")
            .form(encoded);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "unreadable error body".to_string());
            warn!(status = response.status, "Token exchange rejected");
            return Err(AuthError::TokenExchange {
                provider: self.config.provider.to_string(),
                status_code: response.status,
                message,
            });
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| AuthError::InvalidTokenResponse(e.to_string()))?;

        if !token.token_type.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::InvalidTokenResponse(format!(
                "unsupported token type {}",
                token.token_type
            )));
        }

        tracing::info!(expires_in = ?token.expires_in, "Exchanged authorization code");
        Ok(token)
    }
}
