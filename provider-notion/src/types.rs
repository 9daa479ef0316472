//! Notion API resource types and property helpers

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const DEFAULT_STATUS: &str = "Not Started";
pub const DEFAULT_PRIORITY: &str = "Medium";
pub const UNTITLED_DATABASE: &str = "Untitled";

/// Page object
///
/// See: https://developers.notion.com/reference/page
#[derive(Debug, Clone, Deserialize)]
pub struct NotionPage {
    pub id: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub created_time: Option<String>,

    #[serde(default)]
    pub last_edited_time: Option<String>,

    #[serde(default)]
    pub archived: bool,

    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Paginated list response shared by database queries and search.
#[derive(Debug, Deserialize)]
pub struct PaginatedResponse<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,

    #[serde(default)]
    pub next_cursor: Option<String>,

    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

/// Database object as returned by search
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseObject {
    pub id: String,

    #[serde(default)]
    pub title: Vec<RichText>,

    #[serde(default)]
    pub description: Vec<RichText>,

    #[serde(default)]
    pub url: Option<String>,
}

/// A database the integration can see
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotionDatabase {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
}

impl From<DatabaseObject> for NotionDatabase {
    fn from(db: DatabaseObject) -> Self {
        let title = db
            .title
            .first()
            .map(|t| t.plain_text.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED_DATABASE.to_string());
        Self {
            id: db.id,
            title,
            description: db.description.first().map(|d| d.plain_text.clone()),
            url: db.url,
        }
    }
}

/// `{"object": "error", "status": 404, "code": "object_not_found", "message": "..."}`
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Property readers
// ============================================================================

/// Plain text of the first fragment of the `Name` (or `Title`) title property.
pub fn extract_title(properties: &Map<String, Value>) -> String {
    ["Name", "Title"]
        .iter()
        .find_map(|key| properties.get(*key).and_then(|p| p.get("title")))
        .and_then(|title| title.get(0))
        .and_then(|fragment| fragment.get("plain_text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub fn extract_select(properties: &Map<String, Value>, name: &str) -> Option<String> {
    properties
        .get(name)?
        .get("select")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

/// `date.start` of a date property, date or date-time as stored.
pub fn extract_date(properties: &Map<String, Value>, name: &str) -> Option<String> {
    properties
        .get(name)?
        .get("date")?
        .get("start")?
        .as_str()
        .map(str::to_string)
}

/// First fragment of a rich text property; an empty property reads as `""`.
pub fn extract_rich_text(properties: &Map<String, Value>, name: &str) -> Option<String> {
    let rich_text = properties.get(name)?.get("rich_text")?;
    Some(
        rich_text
            .get(0)
            .and_then(|fragment| fragment.get("plain_text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    )
}

// ============================================================================
// Property writers
// ============================================================================

pub fn title_property(content: &str) -> Value {
    json!({ "title": [{ "text": { "content": content } }] })
}

pub fn select_property(name: &str) -> Value {
    json!({ "select": { "name": name } })
}

pub fn date_property(start: &str) -> Value {
    json!({ "date": { "start": start } })
}

pub fn rich_text_property(content: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": content } }] })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_extract_title_prefers_name() {
        let props = properties(json!({
            "Name": {"title": [{"plain_text": "Write report"}]},
            "Title": {"title": [{"plain_text": "ignored"}]}
        }));
        assert_eq!(extract_title(&props), "Write report");
    }

    #[test]
    fn test_extract_title_falls_back_to_title_then_empty() {
        let props = properties(json!({"Title": {"title": [{"plain_text": "Other"}]}}));
        assert_eq!(extract_title(&props), "Other");

        let props = properties(json!({"Name": {"title": []}}));
        assert_eq!(extract_title(&props), "");
    }

    #[test]
    fn test_extract_select_and_date() {
        let props = properties(json!({
            "Status": {"select": {"name": "Done"}},
            "Priority": {"select": null},
            "Due Date": {"date": {"start": "2024-06-07"}}
        }));

        assert_eq!(extract_select(&props, "Status").as_deref(), Some("Done"));
        assert_eq!(extract_select(&props, "Priority"), None);
        assert_eq!(extract_date(&props, "Due Date").as_deref(), Some("2024-06-07"));
    }

    #[test]
    fn test_extract_rich_text_empty_is_blank() {
        let props = properties(json!({"Description": {"rich_text": []}}));
        assert_eq!(extract_rich_text(&props, "Description").as_deref(), Some(""));
        assert_eq!(extract_rich_text(&props, "Missing"), None);
    }

    #[test]
    fn test_database_title_fallback() {
        let db: DatabaseObject = serde_json::from_value(json!({"id": "db1", "title": []})).unwrap();
        assert_eq!(NotionDatabase::from(db).title, "Untitled");
    }
}
