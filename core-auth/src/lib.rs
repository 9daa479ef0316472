//! # Authorization Module
//!
//! Connects the broker to external providers and keeps the resulting
//! credentials in memory.
//!
//! ## Overview
//!
//! - Popup handshake for Google Calendar (implicit grant, anti-forgery state)
//! - Backend authorization-code flow with PKCE
//! - Integration tokens for Notion
//! - One pending request per provider, cancellable, with a hard deadline
//! - Handshake state and auth events published on the event bus
//!
//! Credentials are never persisted and never refreshed. When one expires the
//! provider reads as disconnected until the user authorizes again.

pub mod credentials;
pub mod error;
pub mod manager;
pub mod oauth;
pub mod types;

pub use credentials::{CredentialReader, CredentialStore};
pub use error::{AuthError, Result};
pub use manager::HandshakeManager;
pub use oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier, RedirectOutcome};
pub use types::{
    AuthFlow, AuthorizationRequest, CodeCallback, Credential, HandshakeHandle, HandshakeOutcome,
    HandshakeState, ProviderInfo, ProviderKind,
};
