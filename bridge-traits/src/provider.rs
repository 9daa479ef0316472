//! Provider Client Abstraction
//!
//! Uniform CRUD access to one external service. Calendar events and task
//! records are normalized into [`ExternalItem`] before they leave the client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ProviderResult;

/// What kind of record an [`ExternalItem`] was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Event,
    Task,
}

/// Provider record flattened into a common shape
///
/// `timestamp` is the start time of an event or the due date of a task.
/// Everything else the provider returned that is worth showing lives in
/// `metadata` under stable, provider-documented keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalItem {
    pub id: String,
    pub kind: ItemKind,
    pub title: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
}

impl ExternalItem {
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Input for [`ProviderClient::create`]
///
/// `end` is only meaningful for events. Provider-specific fields without a
/// dedicated slot (Notion's `status`, `priority`; Google's `location`) go into
/// `fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub title: String,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub fields: HashMap<String, String>,
}

impl ItemDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn ending_at(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn all_day(mut self) -> Self {
        self.all_day = true;
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Partial update for [`ProviderClient::update`]; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub fields: HashMap<String, String>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.fields.is_empty()
    }
}

/// Optional narrowing for [`ProviderClient::list`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListFilter {
    pub time_min: Option<DateTime<Utc>>,
    pub time_max: Option<DateTime<Utc>>,
    pub max_results: Option<u32>,
    /// Provider-native filter object, passed through untouched (Notion
    /// database query filter).
    pub query: Option<serde_json::Value>,
}

impl ListFilter {
    pub fn upcoming(from: DateTime<Utc>, max_results: u32) -> Self {
        Self {
            time_min: Some(from),
            max_results: Some(max_results),
            ..Default::default()
        }
    }
}

/// CRUD access to one external REST API
///
/// Every operation checks for a valid credential before touching the network
/// and fails with
/// [`ProviderError::AuthenticationRequired`](crate::ProviderError::AuthenticationRequired)
/// otherwise. Each call performs a single attempt; a non-2xx answer surfaces as
/// [`ProviderError::Api`](crate::ProviderError::Api) with the status untouched.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::provider::{ProviderClient, ListFilter};
///
/// async fn count(client: &dyn ProviderClient, container: &str) -> usize {
///     client
///         .list(container, None)
///         .await
///         .map(|items| items.len())
///         .unwrap_or_default()
/// }
/// ```
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Stable provider identifier (`google_calendar`, `notion`)
    fn provider_id(&self) -> &'static str;

    /// List the items of a container (calendar id, database id).
    async fn list(
        &self,
        container_id: &str,
        filter: Option<ListFilter>,
    ) -> ProviderResult<Vec<ExternalItem>>;

    /// Create an item inside a container.
    async fn create(&self, container_id: &str, draft: ItemDraft) -> ProviderResult<ExternalItem>;

    /// Apply a partial update to an existing item.
    async fn update(&self, item_id: &str, patch: ItemPatch) -> ProviderResult<ExternalItem>;

    /// Remove an item. Returns `false` when the provider reports it as already
    /// gone.
    async fn delete(&self, item_id: &str) -> ProviderResult<bool>;
}
