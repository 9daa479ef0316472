//! # Event Bus System
//!
//! Typed notifications from the handshake manager and the sync coordinator,
//! delivered over `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The UI shell does not poll the broker for status. It subscribes to the bus
//! and reacts to:
//! - **Auth events**: a handshake started, finished, was denied, timed out, or
//!   was dismissed; a credential was removed
//! - **Sync events**: a pass started, one provider finished or failed, the pass
//!   completed
//!
//! ```text
//! ┌──────────────────┐   emit   ┌───────────┐  subscribe  ┌──────────┐
//! │ HandshakeManager ├─────────>│           ├────────────>│ UI shell │
//! └──────────────────┘          │ EventBus  │             └──────────┘
//! ┌──────────────────┐   emit   │           │  subscribe  ┌──────────┐
//! │ SyncCoordinator  ├─────────>│           ├────────────>│  logger  │
//! └──────────────────┘          └───────────┘             └──────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(16);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Auth(AuthEvent::SignedOut {
//!         provider: "notion".to_string(),
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Provider disconnected");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; keep reading.
//! - **`RecvError::Closed`**: every sender is gone; the broker shut down.
//!
//! Emitting with no subscribers returns an error. Publishers ignore it with
//! `.ok()`; nobody listening is not a failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Authorization handshake and credential lifecycle
    Auth(AuthEvent),
    /// Sync passes
    Sync(SyncEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Auth(AuthEvent::Denied { .. })
            | CoreEvent::Auth(AuthEvent::TimedOut { .. })
            | CoreEvent::Sync(SyncEvent::ProviderFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedIn { .. })
            | CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Provider the event is about, when it concerns a single one.
    pub fn provider(&self) -> Option<&str> {
        match self {
            CoreEvent::Auth(AuthEvent::SigningIn { provider, .. })
            | CoreEvent::Auth(AuthEvent::SignedIn { provider, .. })
            | CoreEvent::Auth(AuthEvent::SignedOut { provider })
            | CoreEvent::Auth(AuthEvent::Denied { provider, .. })
            | CoreEvent::Auth(AuthEvent::TimedOut { provider })
            | CoreEvent::Auth(AuthEvent::Closed { provider })
            | CoreEvent::Sync(SyncEvent::ProviderCompleted { provider, .. })
            | CoreEvent::Sync(SyncEvent::ProviderFailed { provider, .. }) => {
                Some(provider.as_str())
            }
            CoreEvent::Auth(AuthEvent::AuthError { provider, .. }) => provider.as_deref(),
            CoreEvent::Sync(_) => None,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events emitted by the authorization handshake manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// A handshake was started and its surface opened.
    SigningIn {
        provider: String,
        /// Identifier of the authorization request.
        request_id: String,
    },
    /// A credential was stored.
    SignedIn {
        provider: String,
        /// Expiry of the stored credential (Unix epoch seconds), if known.
        expires_at: Option<i64>,
    },
    /// The stored credential was removed.
    SignedOut { provider: String },
    /// The provider reported an error such as `access_denied`.
    Denied { provider: String, error: String },
    /// The handshake reached its deadline.
    TimedOut { provider: String },
    /// The surface was dismissed or the request was replaced.
    Closed { provider: String },
    /// Handshake failure that is not a user decision (state mismatch, token
    /// exchange failure).
    AuthError {
        provider: Option<String>,
        message: String,
        /// Whether running the handshake again can succeed.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SigningIn { .. } => "Authorization in progress",
            AuthEvent::SignedIn { .. } => "Provider connected",
            AuthEvent::SignedOut { .. } => "Provider disconnected",
            AuthEvent::Denied { .. } => "Authorization denied",
            AuthEvent::TimedOut { .. } => "Authorization timed out",
            AuthEvent::Closed { .. } => "Authorization window closed",
            AuthEvent::AuthError { .. } => "Authorization error",
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events emitted by the sync coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A sync pass started.
    Started {
        pass_id: String,
        providers: Vec<String>,
    },
    /// One provider returned its items.
    ProviderCompleted {
        pass_id: String,
        provider: String,
        item_count: usize,
    },
    /// One provider failed; the rest of the pass continues.
    ProviderFailed {
        pass_id: String,
        provider: String,
        message: String,
        status_code: Option<u16>,
    },
    /// Every provider of the pass has reported.
    Completed {
        pass_id: String,
        succeeded: usize,
        failed: usize,
        duration_ms: u64,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::ProviderCompleted { .. } => "Provider synced",
            SyncEvent::ProviderFailed { .. } => "Provider sync failed",
            SyncEvent::Completed { .. } => "Sync completed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel shared by every component of the broker.
///
/// Cloning is cheap; clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` that skips events rejected by a predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(16);
/// let notion_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| event.provider() == Some("notion"));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
