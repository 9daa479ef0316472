use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// External services the broker can connect to.
///
/// # Examples
///
/// ```
/// use core_auth::ProviderKind;
///
/// let provider = ProviderKind::GoogleCalendar;
/// assert_eq!(provider.display_name(), "Google Calendar");
/// assert_eq!(provider.as_str(), "google_calendar");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Google Calendar (OAuth 2.0, popup or backend code flow)
    GoogleCalendar,
    /// Notion (internal integration token)
    Notion,
}

impl ProviderKind {
    /// Every supported provider, in display order.
    pub const ALL: [ProviderKind; 2] = [ProviderKind::GoogleCalendar, ProviderKind::Notion];

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::GoogleCalendar => "Google Calendar",
            ProviderKind::Notion => "Notion",
        }
    }

    /// Identifier used in logs, events and URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GoogleCalendar => "google_calendar",
            ProviderKind::Notion => "notion",
        }
    }

    /// Parse a provider identifier.
    ///
    /// Accepts the canonical id plus the short forms used in routes
    /// (`google`, `google-calendar`).
    ///
    /// ```
    /// use core_auth::ProviderKind;
    ///
    /// assert_eq!(ProviderKind::parse("google"), Some(ProviderKind::GoogleCalendar));
    /// assert_eq!(ProviderKind::parse("Notion"), Some(ProviderKind::Notion));
    /// assert_eq!(ProviderKind::parse("dropbox"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "google_calendar" | "google-calendar" | "googlecalendar" | "google" => {
                Some(ProviderKind::GoogleCalendar)
            }
            "notion" => Some(ProviderKind::Notion),
            _ => None,
        }
    }

    /// Whether the provider supports the browser popup (implicit) grant.
    pub fn supports_popup_flow(&self) -> bool {
        matches!(self, ProviderKind::GoogleCalendar)
    }

    /// Whether the provider supports the backend authorization-code grant.
    pub fn supports_code_flow(&self) -> bool {
        matches!(self, ProviderKind::GoogleCalendar)
    }

    /// Whether the provider is connected with a static integration token.
    pub fn uses_integration_token(&self) -> bool {
        matches!(self, ProviderKind::Notion)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Bearer credential for one provider, held in memory only.
///
/// A credential is usable only by the client of the same provider and only
/// until `expires_at`. There is no refresh token: an expired credential means
/// the handshake has to run again.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub provider: ProviderKind,
    pub bearer_token: String,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

impl Credential {
    pub fn new(provider: ProviderKind, bearer_token: impl Into<String>) -> Self {
        Self {
            provider,
            bearer_token: bearer_token.into(),
            token_type: "Bearer".to_string(),
            expires_at: None,
            scopes: Vec::new(),
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Usable by `provider`'s client at `now`.
    pub fn is_valid_for(&self, provider: ProviderKind, now: DateTime<Utc>) -> bool {
        self.provider == provider && !self.is_expired_at(now)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("provider", &self.provider)
            .field("bearer_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// How the provider delivers the authorization result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFlow {
    /// `response_type=token`, access token in the redirect fragment
    Implicit,
    /// `response_type=code`, code exchanged by the backend
    AuthorizationCode,
}

/// One in-flight handshake. At most one exists per provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub id: Uuid,
    pub provider: ProviderKind,
    pub anti_forgery_state: String,
    pub flow: AuthFlow,
    pub created_at: DateTime<Utc>,
    pub timeout_at: DateTime<Utc>,
}

impl AuthorizationRequest {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.timeout_at
    }
}

/// Handshake lifecycle per provider.
///
/// `Idle → Pending → {Authorized, Denied, TimedOut, Closed}`. `Failed` marks a
/// handshake aborted by an error (state mismatch, token exchange failure)
/// rather than by an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    Idle,
    Pending,
    Authorized,
    Denied,
    TimedOut,
    Closed,
    Failed,
}

impl HandshakeState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, HandshakeState::Idle | HandshakeState::Pending)
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HandshakeState::Idle => "idle",
            HandshakeState::Pending => "pending",
            HandshakeState::Authorized => "authorized",
            HandshakeState::Denied => "denied",
            HandshakeState::TimedOut => "timed out",
            HandshakeState::Closed => "closed",
            HandshakeState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// How an awaited handshake ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    Authorized(Credential),
    /// The provider reported an error, `access_denied` when the user refused.
    Denied {
        error: String,
        description: Option<String>,
    },
    TimedOut,
    /// The surface was dismissed, the request was cancelled, or a newer
    /// request for the same provider replaced it.
    Closed,
}

impl HandshakeOutcome {
    pub fn state(&self) -> HandshakeState {
        match self {
            HandshakeOutcome::Authorized(_) => HandshakeState::Authorized,
            HandshakeOutcome::Denied { .. } => HandshakeState::Denied,
            HandshakeOutcome::TimedOut => HandshakeState::TimedOut,
            HandshakeOutcome::Closed => HandshakeState::Closed,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        match self {
            HandshakeOutcome::Authorized(credential) => Some(credential),
            _ => None,
        }
    }

    /// `true` when the user explicitly refused consent.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, HandshakeOutcome::Denied { error, .. } if error == "access_denied")
    }
}

/// Returned by `begin_authorization`; passed to `await_completion`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeHandle {
    pub provider: ProviderKind,
    pub request_id: Uuid,
    pub authorization_url: String,
}

/// Query parameters of a code-flow redirect back to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CodeCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Static description of a provider for settings screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub kind: ProviderKind,
    pub display_name: String,
    pub supports_popup_flow: bool,
    pub supports_code_flow: bool,
    pub uses_integration_token: bool,
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
    pub default_scopes: Vec<String>,
}
