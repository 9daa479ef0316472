//! # Sync Coordinator
//!
//! Runs sync passes over the registered provider clients.
//!
//! ## Overview
//!
//! A pass calls `list` on each requested provider with its configured
//! container and filter. Providers run concurrently and every one of them
//! reports a [`SyncResult`], in the order they were requested. A failure is
//! captured in that provider's result and never aborts the others.
//!
//! Items are not merged or deduplicated across providers.
//!
//! ## Retries
//!
//! Clients never retry. The coordinator applies [`SyncConfig::retry`], which
//! defaults to a single attempt; when more attempts are configured only
//! transient failures (network errors, 429, 5xx) are retried, so a missing
//! credential fails on the first attempt.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let coordinator = Arc::new(SyncCoordinator::new(
//!     SyncConfig::from_broker(&config),
//!     registry,
//!     handshakes.credentials(),
//!     event_bus,
//!     config.clock.clone(),
//! ));
//!
//! let results = coordinator.sync_now(&[ProviderKind::GoogleCalendar, ProviderKind::Notion]).await;
//! coordinator.start_auto_sync(Duration::from_secs(30 * 60)).await?;
//! ```

use crate::registry::{ProviderRegistry, RegisteredProvider};
use crate::result::SyncResult;
use crate::{Result, SyncError};
use bridge_traits::error::ProviderResult;
use bridge_traits::http::RetryPolicy;
use bridge_traits::provider::ExternalItem;
use bridge_traits::time::Clock;
use core_auth::{CredentialReader, ProviderKind};
use core_runtime::config::BrokerConfig;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Sync coordinator configuration
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Attempts per provider per pass
    pub retry: RetryPolicy,
}

impl SyncConfig {
    pub fn from_broker(config: &BrokerConfig) -> Self {
        Self {
            retry: config.sync_retry.clone(),
        }
    }
}

struct AutoSync {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct SyncCoordinator {
    config: SyncConfig,
    registry: Arc<ProviderRegistry>,
    credentials: CredentialReader,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    last_results: RwLock<Vec<SyncResult>>,
    auto_sync: Mutex<Option<AutoSync>>,
}

impl SyncCoordinator {
    pub fn new(
        config: SyncConfig,
        registry: Arc<ProviderRegistry>,
        credentials: CredentialReader,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            registry,
            credentials,
            event_bus,
            clock,
            last_results: RwLock::new(Vec::new()),
            auto_sync: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Sync the given providers, one result per provider in input order.
    #[instrument(skip(self), fields(providers = providers.len()))]
    pub async fn sync_now(&self, providers: &[ProviderKind]) -> Vec<SyncResult> {
        let pass_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        self.emit(SyncEvent::Started {
            pass_id: pass_id.clone(),
            providers: providers.iter().map(|p| p.as_str().to_string()).collect(),
        });

        let results = join_all(
            providers
                .iter()
                .map(|&provider| self.sync_provider(&pass_id, provider)),
        )
        .await;

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - succeeded;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(pass_id = %pass_id, succeeded, failed, duration_ms, "Sync pass finished");
        self.emit(SyncEvent::Completed {
            pass_id,
            succeeded,
            failed,
            duration_ms,
        });

        *self.last_results.write().await = results.clone();
        results
    }

    /// Sync every provider that currently holds a valid credential.
    pub async fn sync_connected(&self) -> Vec<SyncResult> {
        let connected = self.credentials.connected().await;
        if connected.is_empty() {
            debug!("No connected providers, nothing to sync");
        }
        self.sync_now(&connected).await
    }

    /// Results of the most recent pass; empty before the first one.
    pub async fn last_results(&self) -> Vec<SyncResult> {
        self.last_results.read().await.clone()
    }

    /// Run [`sync_connected`](Self::sync_connected) every `interval`, first
    /// after one full interval.
    pub async fn start_auto_sync(self: &Arc<Self>, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(SyncError::InvalidInterval(
                "interval must be greater than zero".to_string(),
            ));
        }

        let mut auto_sync = self.auto_sync.lock().await;
        if auto_sync.as_ref().is_some_and(|running| !running.task.is_finished()) {
            return Err(SyncError::AutoSyncRunning);
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let coordinator = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let results = coordinator.sync_connected().await;
                        debug!(providers = results.len(), "Automatic sync pass done");
                    }
                }
            }
            debug!("Automatic sync stopped");
        });

        info!(interval_secs = interval.as_secs(), "Automatic sync started");
        *auto_sync = Some(AutoSync { cancel, task });
        Ok(())
    }

    /// Stops the automatic loop, waiting for a pass in flight to finish.
    /// Returns `false` if it was not running.
    pub async fn stop_auto_sync(&self) -> bool {
        let Some(running) = self.auto_sync.lock().await.take() else {
            return false;
        };

        running.cancel.cancel();
        if let Err(e) = running.task.await {
            warn!(error = %e, "Automatic sync task ended abnormally");
        }
        true
    }

    pub async fn is_auto_sync_running(&self) -> bool {
        self.auto_sync
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    #[instrument(skip(self, pass_id), fields(provider = %provider))]
    async fn sync_provider(&self, pass_id: &str, provider: ProviderKind) -> SyncResult {
        let Some(entry) = self.registry.get(provider).await else {
            let error = SyncError::ProviderNotRegistered { provider };
            warn!("{}", error);
            self.emit(SyncEvent::ProviderFailed {
                pass_id: pass_id.to_string(),
                provider: provider.as_str().to_string(),
                message: error.to_string(),
                status_code: None,
            });
            return SyncResult::failure(provider, error.to_string(), self.clock.now());
        };

        match self.list_with_retry(&entry).await {
            Ok(items) => {
                debug!(count = items.len(), "Provider synced");
                self.emit(SyncEvent::ProviderCompleted {
                    pass_id: pass_id.to_string(),
                    provider: provider.as_str().to_string(),
                    item_count: items.len(),
                });
                SyncResult::success(provider, items, self.clock.now())
            }
            Err(error) => {
                warn!(error = %error, "Provider sync failed");
                self.emit(SyncEvent::ProviderFailed {
                    pass_id: pass_id.to_string(),
                    provider: provider.as_str().to_string(),
                    message: error.to_string(),
                    status_code: error.status_code(),
                });
                SyncResult::from_provider_error(provider, &error, self.clock.now())
            }
        }
    }

    async fn list_with_retry(&self, entry: &RegisteredProvider) -> ProviderResult<Vec<ExternalItem>> {
        let policy = &self.config.retry;
        let mut attempt = 1;

        loop {
            let filter = entry.filter.resolve(self.clock.now());
            match entry.client.list(&entry.container_id, filter).await {
                Ok(items) => return Ok(items),
                Err(error) if attempt < policy.max_attempts && error.is_retryable() => {
                    let delay = policy.delay_for(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %error, "Retrying list");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        self.event_bus.emit(CoreEvent::Sync(event)).ok();
    }
}
