//! Per-provider outcome of a sync pass

use bridge_traits::error::ProviderError;
use bridge_traits::provider::ExternalItem;
use chrono::{DateTime, Utc};
use core_auth::ProviderKind;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failure,
}

/// One provider's share of a pass. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResult {
    pub provider: ProviderKind,
    pub status: SyncStatus,
    pub item_count: usize,
    pub items: Vec<ExternalItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// HTTP status of a provider API failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub timestamp: DateTime<Utc>,
}

impl SyncResult {
    pub fn success(provider: ProviderKind, items: Vec<ExternalItem>, timestamp: DateTime<Utc>) -> Self {
        Self {
            provider,
            status: SyncStatus::Success,
            item_count: items.len(),
            items,
            error: None,
            status_code: None,
            timestamp,
        }
    }

    pub fn failure(provider: ProviderKind, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            provider,
            status: SyncStatus::Failure,
            item_count: 0,
            items: Vec::new(),
            error: Some(message.into()),
            status_code: None,
            timestamp,
        }
    }

    pub fn from_provider_error(
        provider: ProviderKind,
        error: &ProviderError,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            status_code: error.status_code(),
            ..Self::failure(provider, error.to_string(), timestamp)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_keeps_status_code() {
        let error = ProviderError::Api {
            provider: "notion".to_string(),
            status_code: 404,
            message: "Could not find database".to_string(),
        };

        let result = SyncResult::from_provider_error(ProviderKind::Notion, &error, Utc::now());

        assert!(!result.is_success());
        assert_eq!(result.item_count, 0);
        assert_eq!(result.status_code, Some(404));
        assert_eq!(
            result.error.as_deref(),
            Some("notion API error (404): Could not find database")
        );
    }

    #[test]
    fn test_serializes_lowercase_status() {
        let result = SyncResult::success(ProviderKind::GoogleCalendar, Vec::new(), Utc::now());
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["provider"], "google_calendar");
        assert!(json.get("error").is_none());
    }
}
