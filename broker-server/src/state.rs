use core_service::BrokerService;
use std::sync::Arc;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: BrokerService,
    /// Where the browser lands after a successful authorization
    pub frontend_url: Arc<str>,
}

impl AppState {
    pub fn new(service: BrokerService, frontend_url: impl Into<String>) -> Self {
        Self {
            service,
            frontend_url: Arc::from(frontend_url.into()),
        }
    }
}
