//! Scraped records and payload path helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One validated scraped item.
///
/// The payload is opaque, schema-typed JSON; identity is the id string
/// extracted from the payload. A record is yielded at most once per
/// engine run and is immutable once validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Identifier used for deduplication within one run.
    pub id: String,

    /// Shortcode of the item page, when the source provides one.
    pub shortcode: Option<String>,

    /// The raw payload as returned by the source.
    pub payload: Value,
}

impl Record {
    /// Create a record from an extracted id and its payload.
    pub fn new(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            shortcode: None,
            payload,
        }
    }

    /// Attach the item shortcode.
    pub fn with_shortcode(mut self, shortcode: impl Into<String>) -> Self {
        self.shortcode = Some(shortcode.into());
        self
    }
}

/// The pagination indicator extracted from an API payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

impl PageInfo {
    /// Read the page info at `path` within `payload`.
    ///
    /// Missing or malformed fields read as absent; a well-formed
    /// indicator needs both the flag and a non-empty cursor.
    pub fn from_payload(payload: &Value, path: &str) -> Self {
        let Some(info) = lookup_path(payload, path) else {
            return Self::default();
        };
        let has_next_page = info
            .get("has_next_page")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let end_cursor = info
            .get("end_cursor")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        Self {
            has_next_page,
            end_cursor,
        }
    }

    /// Whether the feed has a well-formed next page.
    pub fn continues(&self) -> bool {
        self.has_next_page && self.end_cursor.is_some()
    }
}

/// Look up a dotted path (`"data.hashtag.edges"`) inside a JSON value.
///
/// Returns `None` for an empty path or any missing segment.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_path() {
        let value = json!({"data": {"hashtag": {"edges": [1, 2]}}});
        assert_eq!(
            lookup_path(&value, "data.hashtag.edges"),
            Some(&json!([1, 2]))
        );
        assert_eq!(lookup_path(&value, "data.missing.edges"), None);
        assert_eq!(lookup_path(&value, ""), None);
    }

    #[test]
    fn test_page_info_continues() {
        let payload = json!({
            "data": {"page_info": {"has_next_page": true, "end_cursor": "abc"}}
        });
        let info = PageInfo::from_payload(&payload, "data.page_info");
        assert!(info.continues());
        assert_eq!(info.end_cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn test_page_info_absent_or_exhausted() {
        let exhausted = json!({
            "data": {"page_info": {"has_next_page": false, "end_cursor": null}}
        });
        assert!(!PageInfo::from_payload(&exhausted, "data.page_info").continues());

        // An empty cursor is not a usable indicator even with the flag set
        let empty_cursor = json!({
            "data": {"page_info": {"has_next_page": true, "end_cursor": ""}}
        });
        assert!(!PageInfo::from_payload(&empty_cursor, "data.page_info").continues());

        let missing = json!({"data": {}});
        assert!(!PageInfo::from_payload(&missing, "data.page_info").continues());
    }

    #[test]
    fn test_record_builder() {
        let record = Record::new("1", json!({"node": {"id": "1"}})).with_shortcode("Bx1");
        assert_eq!(record.id, "1");
        assert_eq!(record.shortcode.as_deref(), Some("Bx1"));
    }
}
