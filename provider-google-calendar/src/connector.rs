//! Google Calendar API connector implementation
//!
//! Implements `ProviderClient` for Google Calendar API v3.

use async_trait::async_trait;
use bridge_traits::error::ProviderResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::provider::{ExternalItem, ItemDraft, ItemKind, ItemPatch, ListFilter, ProviderClient};
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use core_auth::{CredentialReader, ProviderKind};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::{GoogleCalendarError, Result, PROVIDER_ID};
use crate::types::{
    ApiErrorEnvelope, CalendarEvent, CalendarListEntry, CalendarListResponse, EventDateTime,
    EventWrite, EventsListResponse,
};

/// Google Calendar API base URL
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Page size when the caller sets no limit (API maximum is 2500)
const DEFAULT_PAGE_SIZE: u32 = 250;

const UNTITLED_EVENT: &str = "(No title)";

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Google Calendar API connector
///
/// `list` and `create` take the calendar id as their container. `update` and
/// `delete` only receive an event id and act on the calendar the connector is
/// bound to.
///
/// # Example
///
/// ```ignore
/// use provider_google_calendar::GoogleCalendarConnector;
/// use bridge_traits::provider::{ListFilter, ProviderClient};
///
/// let connector = GoogleCalendarConnector::new(http_client, credentials, "primary");
/// let upcoming = connector
///     .list("primary", Some(ListFilter::upcoming(chrono::Utc::now(), 10)))
///     .await?;
/// ```
pub struct GoogleCalendarConnector {
    http_client: Arc<dyn HttpClient>,
    credentials: CredentialReader,
    calendar_id: String,
    base_url: String,
}

impl GoogleCalendarConnector {
    /// Create a connector bound to `calendar_id` (`"primary"` for the user's
    /// main calendar).
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        credentials: CredentialReader,
        calendar_id: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            credentials,
            calendar_id: calendar_id.into(),
            base_url: CALENDAR_API_BASE.to_string(),
        }
    }

    /// Point the connector at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    /// Calendars visible to the connected account.
    #[instrument(skip(self))]
    pub async fn list_calendars(&self) -> ProviderResult<Vec<CalendarListEntry>> {
        let token = self.bearer_token().await?;
        let url = format!("{}/users/me/calendarList", self.base_url);
        let response = self.send(self.request(HttpMethod::Get, url, &token)).await?;
        let list: CalendarListResponse = parse(&response)?;
        Ok(list.items)
    }

    async fn bearer_token(&self) -> Result<String> {
        self.credentials
            .bearer_token(ProviderKind::GoogleCalendar)
            .await
            .ok_or(GoogleCalendarError::AuthenticationRequired)
    }

    fn request(&self, method: HttpMethod, url: String, token: &str) -> HttpRequest {
        HttpRequest::new(method, url)
            .bearer_token(token)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    fn event_url(&self, event_id: &str) -> String {
        format!(
            "{}/{}",
            self.events_url(&self.calendar_id),
            urlencoding::encode(event_id)
        )
    }

    /// Single attempt; non-2xx becomes `ApiError` with the status untouched.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = request.method.as_str(), "Calling Google Calendar");
        let response = self.http_client.execute(request).await?;
        if response.is_success() {
            return Ok(response);
        }
        Err(GoogleCalendarError::ApiError {
            status_code: response.status,
            message: error_message(&response),
        })
    }

    fn list_url(&self, calendar_id: &str, filter: &ListFilter, page_size: u32, page_token: Option<&str>) -> String {
        let mut params = vec![
            ("singleEvents".to_string(), "true".to_string()),
            ("orderBy".to_string(), "startTime".to_string()),
            ("maxResults".to_string(), page_size.to_string()),
        ];
        if let Some(time_min) = filter.time_min {
            params.push(("timeMin".to_string(), rfc3339(time_min)));
        }
        if let Some(time_max) = filter.time_max {
            params.push(("timeMax".to_string(), rfc3339(time_max)));
        }
        if let Some(token) = page_token {
            params.push(("pageToken".to_string(), token.to_string()));
        }

        let query: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect();
        format!("{}?{}", self.events_url(calendar_id), query.join("&"))
    }

    /// Convert a Calendar event into an `ExternalItem`
    fn convert_event(&self, event: CalendarEvent, calendar_id: &str) -> ExternalItem {
        let mut metadata = HashMap::new();
        metadata.insert("calendar_id".to_string(), calendar_id.to_string());

        let mut timestamp = None;
        if let Some(start) = &event.start {
            if let Some(date_time) = start.date_time.as_deref() {
                timestamp = parse_rfc3339(date_time);
                metadata.insert("all_day".to_string(), "false".to_string());
            } else if let Some(date) = start.date.as_deref() {
                timestamp = parse_date(date);
                metadata.insert("all_day".to_string(), "true".to_string());
            }
            if let Some(raw) = start.raw() {
                metadata.insert("start".to_string(), raw.to_string());
            }
        }
        if let Some(end) = event.end.as_ref().and_then(EventDateTime::raw) {
            metadata.insert("end".to_string(), end.to_string());
        }

        let optional = [
            ("description", event.description),
            ("location", event.location),
            ("status", event.status),
            ("html_link", event.html_link),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                metadata.insert(key.to_string(), value);
            }
        }

        let attendees: Vec<String> = event
            .attendees
            .into_iter()
            .filter_map(|attendee| attendee.email)
            .collect();
        if !attendees.is_empty() {
            metadata.insert("attendees".to_string(), attendees.join(","));
        }

        let title = event
            .summary
            .filter(|summary| !summary.trim().is_empty())
            .unwrap_or_else(|| UNTITLED_EVENT.to_string());

        ExternalItem {
            id: event.id,
            kind: ItemKind::Event,
            title,
            timestamp,
            metadata,
        }
    }
}

#[async_trait]
impl ProviderClient for GoogleCalendarConnector {
    fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }

    #[instrument(skip(self, filter), fields(calendar_id = %container_id))]
    async fn list(
        &self,
        container_id: &str,
        filter: Option<ListFilter>,
    ) -> ProviderResult<Vec<ExternalItem>> {
        let token = self.bearer_token().await?;
        let filter = filter.unwrap_or_default();
        let limit = filter.max_results.map(|max| max as usize);
        let page_size = filter.max_results.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 2500);

        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.list_url(container_id, &filter, page_size, page_token.as_deref());
            let response = self.send(self.request(HttpMethod::Get, url, &token)).await?;
            let page: EventsListResponse = parse(&response)?;

            items.extend(
                page.items
                    .into_iter()
                    .map(|event| self.convert_event(event, container_id)),
            );

            if limit.is_some_and(|limit| items.len() >= limit) {
                break;
            }
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        if let Some(limit) = limit {
            items.truncate(limit);
        }

        info!(count = items.len(), "Listed Google Calendar events");
        Ok(items)
    }

    #[instrument(skip(self, draft), fields(calendar_id = %container_id))]
    async fn create(&self, container_id: &str, draft: ItemDraft) -> ProviderResult<ExternalItem> {
        let token = self.bearer_token().await?;

        let start = draft.start.ok_or_else(|| {
            GoogleCalendarError::InvalidEvent("an event needs a start time".to_string())
        })?;
        let (start, end) = if draft.all_day {
            let first_day = start.date_naive();
            let last_day = draft.end.map(|end| end.date_naive()).unwrap_or(first_day);
            let exclusive_end = last_day.max(first_day) + Duration::days(1);
            (
                EventDateTime::all_day(first_day.format("%Y-%m-%d").to_string()),
                EventDateTime::all_day(exclusive_end.format("%Y-%m-%d").to_string()),
            )
        } else {
            let end = draft.end.unwrap_or(start + Duration::hours(1));
            if end < start {
                return Err(GoogleCalendarError::InvalidEvent(
                    "event ends before it starts".to_string(),
                )
                .into());
            }
            (EventDateTime::timed(rfc3339(start)), EventDateTime::timed(rfc3339(end)))
        };

        let body = EventWrite {
            summary: Some(draft.title),
            description: draft.description,
            location: draft.fields.get("location").cloned(),
            start: Some(start),
            end: Some(end),
        };

        let request = self
            .request(HttpMethod::Post, self.events_url(container_id), &token)
            .json(&body)
            .map_err(GoogleCalendarError::from)?;
        let response = self.send(request).await?;
        let event: CalendarEvent = parse(&response)?;

        info!(event_id = %event.id, "Created Google Calendar event");
        Ok(self.convert_event(event, container_id))
    }

    #[instrument(skip(self, patch), fields(calendar_id = %self.calendar_id))]
    async fn update(&self, item_id: &str, patch: ItemPatch) -> ProviderResult<ExternalItem> {
        let token = self.bearer_token().await?;
        if patch.is_empty() {
            return Err(GoogleCalendarError::InvalidEvent("nothing to update".to_string()).into());
        }

        let body = EventWrite {
            summary: patch.title,
            description: patch.description,
            location: patch.fields.get("location").cloned(),
            start: patch.start.map(|start| EventDateTime::timed(rfc3339(start))),
            end: patch.end.map(|end| EventDateTime::timed(rfc3339(end))),
        };

        let request = self
            .request(HttpMethod::Patch, self.event_url(item_id), &token)
            .json(&body)
            .map_err(GoogleCalendarError::from)?;
        let response = self.send(request).await?;
        let event: CalendarEvent = parse(&response)?;

        Ok(self.convert_event(event, &self.calendar_id))
    }

    #[instrument(skip(self), fields(calendar_id = %self.calendar_id))]
    async fn delete(&self, item_id: &str) -> ProviderResult<bool> {
        let token = self.bearer_token().await?;
        let request = self.request(HttpMethod::Delete, self.event_url(item_id), &token);

        match self.send(request).await {
            Ok(_) => Ok(true),
            Err(GoogleCalendarError::ApiError {
                status_code: 404 | 410,
                ..
            }) => {
                debug!(event_id = item_id, "Event already gone");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    response
        .json()
        .map_err(|e| GoogleCalendarError::ParseError(e.to_string()))
}

fn error_message(response: &HttpResponse) -> String {
    if let Ok(envelope) = response.json::<ApiErrorEnvelope>() {
        if !envelope.error.message.is_empty() {
            return envelope.error.message;
        }
    }
    response
        .text()
        .ok()
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| format!("HTTP {}", response.status))
}

fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// All-day dates map to midnight UTC.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
