//! Provider clients known to the coordinator, keyed by provider.

use bridge_traits::provider::{ListFilter, ProviderClient};
use chrono::{DateTime, Utc};
use core_auth::ProviderKind;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Filter applied to `list` on every pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SyncFilter {
    /// Everything the container holds
    #[default]
    All,
    /// The same filter on every pass
    Fixed(ListFilter),
    /// Items starting from the time of the pass
    Upcoming { max_results: u32 },
}

impl SyncFilter {
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<ListFilter> {
        match self {
            SyncFilter::All => None,
            SyncFilter::Fixed(filter) => Some(filter.clone()),
            SyncFilter::Upcoming { max_results } => Some(ListFilter::upcoming(now, *max_results)),
        }
    }
}

#[derive(Clone)]
pub struct RegisteredProvider {
    pub client: Arc<dyn ProviderClient>,
    /// Calendar id or database id handed to `list`
    pub container_id: String,
    pub filter: SyncFilter,
}

#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<ProviderKind, RegisteredProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the client for `kind`.
    pub async fn register(
        &self,
        kind: ProviderKind,
        client: Arc<dyn ProviderClient>,
        container_id: impl Into<String>,
        filter: SyncFilter,
    ) {
        let container_id = container_id.into();
        info!(provider = %kind, container = %container_id, "Registered provider client");
        self.providers.write().await.insert(
            kind,
            RegisteredProvider {
                client,
                container_id,
                filter,
            },
        );
    }

    pub async fn unregister(&self, kind: ProviderKind) -> bool {
        self.providers.write().await.remove(&kind).is_some()
    }

    pub async fn get(&self, kind: ProviderKind) -> Option<RegisteredProvider> {
        self.providers.read().await.get(&kind).cloned()
    }

    pub async fn client(&self, kind: ProviderKind) -> Option<Arc<dyn ProviderClient>> {
        self.get(kind).await.map(|entry| entry.client)
    }

    /// Registered providers in `ProviderKind` order.
    pub async fn kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.providers.read().await.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_upcoming_filter_uses_pass_time() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let filter = SyncFilter::Upcoming { max_results: 10 }.resolve(now).unwrap();

        assert_eq!(filter.time_min, Some(now));
        assert_eq!(filter.max_results, Some(10));
        assert_eq!(SyncFilter::All.resolve(now), None);
    }
}
