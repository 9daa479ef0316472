//! In-memory credential store
//!
//! Holds at most one [`Credential`] per provider. Only the handshake manager
//! writes to it; provider clients receive a read-only [`CredentialReader`].
//! Nothing is persisted: credentials die with the process.

use crate::types::{Credential, ProviderKind};
use bridge_traits::time::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<RwLock<HashMap<ProviderKind, Credential>>>,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    pub fn reader(&self) -> CredentialReader {
        CredentialReader {
            source: ReaderSource::Store(self.inner.clone()),
            clock: self.clock.clone(),
        }
    }

    /// Replace the credential of `credential.provider`.
    pub(crate) async fn insert(&self, credential: Credential) {
        self.inner.write().await.insert(credential.provider, credential);
    }

    pub(crate) async fn remove(&self, provider: ProviderKind) -> bool {
        self.inner.write().await.remove(&provider).is_some()
    }
}

#[derive(Clone)]
enum ReaderSource {
    Store(Arc<RwLock<HashMap<ProviderKind, Credential>>>),
    Fixed(Arc<Credential>),
}

/// Read-only view of the credentials.
///
/// Expired credentials read as absent.
#[derive(Clone)]
pub struct CredentialReader {
    source: ReaderSource,
    clock: Arc<dyn Clock>,
}

impl CredentialReader {
    /// A reader over a single credential, for wiring provider clients outside
    /// the broker.
    pub fn fixed(credential: Credential, clock: Arc<dyn Clock>) -> Self {
        Self {
            source: ReaderSource::Fixed(Arc::new(credential)),
            clock,
        }
    }

    pub async fn get(&self, provider: ProviderKind) -> Option<Credential> {
        let now = self.clock.now();
        let credential = match &self.source {
            ReaderSource::Store(map) => map.read().await.get(&provider).cloned(),
            ReaderSource::Fixed(credential) => Some(credential.as_ref().clone()),
        };
        credential.filter(|c| c.is_valid_for(provider, now))
    }

    pub async fn bearer_token(&self, provider: ProviderKind) -> Option<String> {
        self.get(provider).await.map(|c| c.bearer_token)
    }

    pub async fn is_valid(&self, provider: ProviderKind) -> bool {
        self.get(provider).await.is_some()
    }

    /// Providers holding a valid credential, in display order.
    pub async fn connected(&self) -> Vec<ProviderKind> {
        let mut connected = Vec::new();
        for provider in ProviderKind::ALL {
            if self.is_valid(provider).await {
                connected.push(provider);
            }
        }
        connected
    }
}

impl std::fmt::Debug for CredentialReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.source {
            ReaderSource::Store(_) => "store",
            ReaderSource::Fixed(_) => "fixed",
        };
        f.debug_struct("CredentialReader").field("source", &kind).finish()
    }
}
