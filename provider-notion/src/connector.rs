//! Notion API connector implementation
//!
//! Implements `ProviderClient` over a Notion task database.

use async_trait::async_trait;
use bridge_traits::error::ProviderResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::provider::{ExternalItem, ItemDraft, ItemKind, ItemPatch, ListFilter, ProviderClient};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use core_auth::{CredentialReader, ProviderKind};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::{NotionError, Result, PROVIDER_ID};
use crate::types::{
    date_property, extract_date, extract_rich_text, extract_select, extract_title,
    rich_text_property, select_property, title_property, DatabaseObject, ErrorBody,
    NotionDatabase, NotionPage, PaginatedResponse, DEFAULT_PRIORITY, DEFAULT_STATUS,
};

/// Notion API base URL
const NOTION_API_BASE: &str = "https://api.notion.com/v1";

/// API version pinned for every request
pub const NOTION_VERSION: &str = "2022-06-28";

/// Largest page size Notion accepts
const MAX_PAGE_SIZE: u32 = 100;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Notion API connector
///
/// The container of `list` and `create` is a database id; `update` and
/// `delete` address pages directly.
pub struct NotionConnector {
    http_client: Arc<dyn HttpClient>,
    credentials: CredentialReader,
    base_url: String,
}

impl NotionConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, credentials: CredentialReader) -> Self {
        Self {
            http_client,
            credentials,
            base_url: NOTION_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Databases shared with the integration.
    #[instrument(skip(self))]
    pub async fn list_databases(&self) -> ProviderResult<Vec<NotionDatabase>> {
        let token = self.bearer_token().await?;
        let mut databases = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({
                "filter": { "property": "object", "value": "database" },
            });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let url = format!("{}/search", self.base_url);
            let response = self.send(self.request(HttpMethod::Post, url, &token), Some(&body)).await?;
            let page: PaginatedResponse<DatabaseObject> = parse(&response)?;
            databases.extend(page.results.into_iter().map(NotionDatabase::from));

            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(databases)
    }

    /// Check that the stored token is accepted by Notion.
    pub async fn verify_connection(&self) -> ProviderResult<()> {
        let databases = self.list_databases().await?;
        info!(databases = databases.len(), "Notion connection verified");
        Ok(())
    }

    async fn bearer_token(&self) -> Result<String> {
        self.credentials
            .bearer_token(ProviderKind::Notion)
            .await
            .ok_or(NotionError::AuthenticationRequired)
    }

    fn request(&self, method: HttpMethod, url: String, token: &str) -> HttpRequest {
        HttpRequest::new(method, url)
            .bearer_token(token)
            .header("Notion-Version", NOTION_VERSION)
            .timeout(REQUEST_TIMEOUT)
    }

    fn page_url(&self, page_id: &str) -> String {
        format!("{}/pages/{}", self.base_url, urlencoding::encode(page_id))
    }

    /// Single attempt; non-2xx becomes `ApiError` with the status untouched.
    async fn send(&self, request: HttpRequest, body: Option<&Value>) -> Result<HttpResponse> {
        let request = match body {
            Some(body) => request.json(body)?,
            None => request,
        };
        debug!(method = request.method.as_str(), "Calling Notion");

        let response = self.http_client.execute(request).await?;
        if response.is_success() {
            return Ok(response);
        }

        let (code, message) = match response.json::<ErrorBody>() {
            Ok(body) if !body.message.is_empty() => (body.code, body.message),
            _ => (
                None,
                response
                    .text()
                    .ok()
                    .filter(|text| !text.is_empty())
                    .unwrap_or_else(|| format!("HTTP {}", response.status)),
            ),
        };
        Err(NotionError::ApiError {
            status_code: response.status,
            code,
            message,
        })
    }

    /// Convert a page into an `ExternalItem`
    fn convert_page(&self, page: NotionPage) -> ExternalItem {
        let properties = &page.properties;
        let mut metadata = HashMap::new();

        metadata.insert(
            "status".to_string(),
            extract_select(properties, "Status").unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        );
        metadata.insert(
            "priority".to_string(),
            extract_select(properties, "Priority").unwrap_or_else(|| DEFAULT_PRIORITY.to_string()),
        );

        let due_date = extract_date(properties, "Due Date");
        let timestamp = due_date.as_deref().and_then(parse_due_date);
        if let Some(due) = due_date {
            metadata.insert("due_date".to_string(), due);
        }
        if let Some(description) = extract_rich_text(properties, "Description") {
            metadata.insert("description".to_string(), description);
        }

        let title = extract_title(properties);

        let optional = [
            ("url", page.url),
            ("created_time", page.created_time),
            ("last_edited_time", page.last_edited_time),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                metadata.insert(key.to_string(), value);
            }
        }
        if page.archived {
            metadata.insert("archived".to_string(), "true".to_string());
        }

        ExternalItem {
            id: page.id,
            kind: ItemKind::Task,
            title,
            timestamp,
            metadata,
        }
    }
}

#[async_trait]
impl ProviderClient for NotionConnector {
    fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }

    #[instrument(skip(self, filter), fields(database_id = %container_id))]
    async fn list(
        &self,
        container_id: &str,
        filter: Option<ListFilter>,
    ) -> ProviderResult<Vec<ExternalItem>> {
        let token = self.bearer_token().await?;
        let filter = filter.unwrap_or_default();
        let limit = filter.max_results.map(|max| max as usize);
        let page_size = filter.max_results.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let url = format!(
            "{}/databases/{}/query",
            self.base_url,
            urlencoding::encode(container_id)
        );

        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({
                "sorts": [{ "property": "Created time", "direction": "descending" }],
                "page_size": page_size,
            });
            if let Some(query) = &filter.query {
                body["filter"] = query.clone();
            }
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let response = self
                .send(self.request(HttpMethod::Post, url.clone(), &token), Some(&body))
                .await?;
            let page: PaginatedResponse<NotionPage> = parse(&response)?;
            items.extend(page.results.into_iter().map(|p| self.convert_page(p)));

            if limit.is_some_and(|limit| items.len() >= limit) {
                break;
            }
            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        if let Some(limit) = limit {
            items.truncate(limit);
        }

        info!(count = items.len(), "Listed Notion pages");
        Ok(items)
    }

    #[instrument(skip(self, draft), fields(database_id = %container_id))]
    async fn create(&self, container_id: &str, draft: ItemDraft) -> ProviderResult<ExternalItem> {
        let token = self.bearer_token().await?;
        if draft.title.trim().is_empty() {
            return Err(NotionError::InvalidPage("a task needs a title".to_string()).into());
        }

        let mut properties = Map::new();
        properties.insert("Name".to_string(), title_property(&draft.title));
        if let Some(status) = draft.fields.get("status") {
            properties.insert("Status".to_string(), select_property(status));
        }
        if let Some(priority) = draft.fields.get("priority") {
            properties.insert("Priority".to_string(), select_property(priority));
        }
        if let Some(due) = draft.start {
            properties.insert(
                "Due Date".to_string(),
                date_property(&format_due_date(due, draft.all_day)),
            );
        }
        if let Some(description) = &draft.description {
            properties.insert("Description".to_string(), rich_text_property(description));
        }

        let body = json!({
            "parent": { "database_id": container_id },
            "properties": properties,
        });

        let url = format!("{}/pages", self.base_url);
        let response = self
            .send(self.request(HttpMethod::Post, url, &token), Some(&body))
            .await?;
        let page: NotionPage = parse(&response)?;

        info!(page_id = %page.id, "Created Notion page");
        Ok(self.convert_page(page))
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, item_id: &str, patch: ItemPatch) -> ProviderResult<ExternalItem> {
        let token = self.bearer_token().await?;
        if patch.is_empty() {
            return Err(NotionError::InvalidPage("nothing to update".to_string()).into());
        }

        let mut properties = Map::new();
        if let Some(title) = &patch.title {
            properties.insert("Name".to_string(), title_property(title));
        }
        if let Some(status) = patch.fields.get("status") {
            properties.insert("Status".to_string(), select_property(status));
        }
        if let Some(priority) = patch.fields.get("priority") {
            properties.insert("Priority".to_string(), select_property(priority));
        }
        if let Some(due) = patch.start {
            let all_day = patch.fields.get("all_day").is_some_and(|v| v == "true");
            properties.insert(
                "Due Date".to_string(),
                date_property(&format_due_date(due, all_day)),
            );
        }
        if let Some(description) = &patch.description {
            properties.insert("Description".to_string(), rich_text_property(description));
        }

        let body = json!({ "properties": properties });
        let response = self
            .send(self.request(HttpMethod::Patch, self.page_url(item_id), &token), Some(&body))
            .await?;
        let page: NotionPage = parse(&response)?;

        Ok(self.convert_page(page))
    }

    /// Archives the page.
    #[instrument(skip(self))]
    async fn delete(&self, item_id: &str) -> ProviderResult<bool> {
        let token = self.bearer_token().await?;
        let body = json!({ "archived": true });

        match self
            .send(self.request(HttpMethod::Patch, self.page_url(item_id), &token), Some(&body))
            .await
        {
            Ok(_) => Ok(true),
            Err(NotionError::ApiError {
                status_code: 404, ..
            }) => {
                debug!(page_id = item_id, "Page already gone");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn parse<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    response
        .json()
        .map_err(|e| NotionError::ParseError(e.to_string()))
}

fn format_due_date(due: DateTime<Utc>, all_day: bool) -> String {
    if all_day {
        due.date_naive().format("%Y-%m-%d").to_string()
    } else {
        due.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Due dates are either `YYYY-MM-DD` (midnight UTC) or a full date-time.
fn parse_due_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
