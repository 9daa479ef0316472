//! Broker service façade and bootstrap.
//!
//! [`BrokerService::start`] wires the host-provided bridges in
//! [`BrokerConfig`] into the handshake manager, the provider clients and the
//! sync coordinator, all sharing one event bus. Desktop hosts get the
//! reqwest-based HTTP client through the default `desktop-shims` feature.
//!
//! There is no global state: everything hangs off the service value, and
//! [`BrokerService::shutdown`] tears it down.

pub mod error;

pub use core_sync::{SyncResult, SyncStatus};
pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::provider::ProviderClient;
use core_auth::{HandshakeManager, ProviderKind};
use core_runtime::config::BrokerConfig;
use core_runtime::events::EventBus;
use core_sync::{ProviderRegistry, SyncConfig, SyncCoordinator, SyncFilter};
use provider_google_calendar::GoogleCalendarConnector;
use provider_notion::NotionConnector;
use tracing::{debug, info};

/// Upper bound of upcoming events pulled from the calendar per pass.
const CALENDAR_SYNC_WINDOW: u32 = 250;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct BrokerService {
    config: Arc<BrokerConfig>,
    event_bus: EventBus,
    handshakes: Arc<HandshakeManager>,
    google_calendar: Arc<GoogleCalendarConnector>,
    notion: Arc<NotionConnector>,
    coordinator: Arc<SyncCoordinator>,
}

impl BrokerService {
    /// Build every component from `config`.
    ///
    /// Google Calendar is always registered for sync; Notion only when a
    /// database id is configured. Starts the automatic sync loop when
    /// `config.auto_sync` is set.
    pub async fn start(config: BrokerConfig) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let handshakes = Arc::new(HandshakeManager::new(&config, event_bus.clone()));
        let credentials = handshakes.credentials();

        let google_calendar = Arc::new(GoogleCalendarConnector::new(
            Arc::clone(&config.http_client),
            credentials.clone(),
            config.google_calendar_id.clone(),
        ));
        let notion = Arc::new(NotionConnector::new(
            Arc::clone(&config.http_client),
            credentials.clone(),
        ));

        let registry = Arc::new(ProviderRegistry::new());
        registry
            .register(
                ProviderKind::GoogleCalendar,
                google_calendar.clone(),
                config.google_calendar_id.clone(),
                SyncFilter::Upcoming {
                    max_results: CALENDAR_SYNC_WINDOW,
                },
            )
            .await;
        if let Some(database_id) = &config.notion_database_id {
            registry
                .register(
                    ProviderKind::Notion,
                    notion.clone(),
                    database_id.clone(),
                    SyncFilter::All,
                )
                .await;
        }

        let coordinator = Arc::new(SyncCoordinator::new(
            SyncConfig::from_broker(&config),
            registry,
            credentials,
            event_bus.clone(),
            Arc::clone(&config.clock),
        ));

        if config.auto_sync {
            coordinator.start_auto_sync(config.sync_interval).await?;
        }

        info!(
            google_calendar_id = %config.google_calendar_id,
            notion_database = config.notion_database_id.is_some(),
            auto_sync = config.auto_sync,
            "Broker started"
        );

        Ok(Self {
            config: Arc::new(config),
            event_bus,
            handshakes,
            google_calendar,
            notion,
            coordinator,
        })
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn handshakes(&self) -> &Arc<HandshakeManager> {
        &self.handshakes
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    pub fn google_calendar(&self) -> &Arc<GoogleCalendarConnector> {
        &self.google_calendar
    }

    pub fn notion(&self) -> &Arc<NotionConnector> {
        &self.notion
    }

    /// The provider client for `kind`, as the trait object.
    pub fn client(&self, kind: ProviderKind) -> Arc<dyn ProviderClient> {
        match kind {
            ProviderKind::GoogleCalendar => self.google_calendar.clone(),
            ProviderKind::Notion => self.notion.clone(),
        }
    }

    /// Cheap authenticated call proving the stored credential works.
    ///
    /// Lists the calendars of the Google account, or the databases shared
    /// with the Notion integration.
    pub async fn verify_connection(&self, kind: ProviderKind) -> Result<()> {
        match kind {
            ProviderKind::GoogleCalendar => {
                let calendars = self.google_calendar.list_calendars().await?;
                debug!(count = calendars.len(), "Google Calendar reachable");
            }
            ProviderKind::Notion => self.notion.verify_connection().await?,
        }
        Ok(())
    }

    pub async fn sync_now(&self, providers: &[ProviderKind]) -> Vec<SyncResult> {
        self.coordinator.sync_now(providers).await
    }

    pub async fn sync_connected(&self) -> Vec<SyncResult> {
        self.coordinator.sync_connected().await
    }

    /// Stop automatic sync and cancel pending handshakes.
    pub async fn shutdown(&self) {
        self.coordinator.stop_auto_sync().await;
        self.handshakes.shutdown().await;
        info!("Broker stopped");
    }
}
