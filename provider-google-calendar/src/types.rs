//! Google Calendar API resource types
//!
//! Data structures for the Calendar API v3 payloads the connector reads and
//! writes.

use serde::{Deserialize, Serialize};

/// Event resource
///
/// See: https://developers.google.com/calendar/api/v3/reference/events#resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub start: Option<EventDateTime>,

    #[serde(default)]
    pub end: Option<EventDateTime>,

    /// `confirmed`, `tentative` or `cancelled`
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub html_link: Option<String>,

    #[serde(default)]
    pub attendees: Vec<Attendee>,
}

/// Start or end of an event: `dateTime` for timed events, `date` for all-day
/// events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    pub fn timed(rfc3339: impl Into<String>) -> Self {
        Self {
            date_time: Some(rfc3339.into()),
            ..Default::default()
        }
    }

    pub fn all_day(date: impl Into<String>) -> Self {
        Self {
            date: Some(date.into()),
            ..Default::default()
        }
    }

    /// Whichever representation is present, as sent by the API.
    pub fn raw(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attendee {
    #[serde(default)]
    pub email: Option<String>,
}

/// events.list response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsListResponse {
    #[serde(default)]
    pub items: Vec<CalendarEvent>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Body of events.insert and events.patch. Absent fields are left out so a
/// patch only touches what it names.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventWrite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
}

/// Entry of the user's calendar list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    pub id: String,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Deserialize)]
pub struct CalendarListResponse {
    #[serde(default)]
    pub items: Vec<CalendarListEntry>,
}

/// Google's error envelope: `{"error": {"code": 404, "message": "Not Found"}}`
#[derive(Debug, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
}
