//! Payload validation.
//!
//! Scraped payloads are structurally checked before they are emitted.
//! The check is swappable so callers can supply their own schema; the
//! built-in [`Shape`] covers the structural subset the built-in
//! endpoints need.

use serde_json::Value;
use std::collections::HashMap;

use crate::error::ValidationError;

/// A structural check over a JSON payload.
///
/// Implementations report every path that fails, not just the first,
/// so that a schema drift shows up in one log line.
pub trait Validator: Send + Sync {
    fn validate(&self, payload: &Value) -> Result<(), ValidationError>;
}

/// A structural JSON schema.
///
/// Matches shape, not content: `Number` accepts any JSON number,
/// `Object` requires the named fields (extra fields are ignored),
/// `Array` requires every element to match.
#[derive(Debug, Clone)]
pub enum Shape {
    /// Accepts anything, including null.
    Any,
    String,
    Number,
    Bool,
    Object(HashMap<String, Shape>),
    Array(Box<Shape>),
    /// Accepts null or a missing field in addition to the inner shape.
    Optional(Box<Shape>),
}

impl Shape {
    /// An object shape from field pairs.
    pub fn object<const N: usize>(fields: [(&str, Shape); N]) -> Self {
        Shape::Object(
            fields
                .into_iter()
                .map(|(name, shape)| (name.to_string(), shape))
                .collect(),
        )
    }

    /// An array of this shape.
    pub fn array(inner: Shape) -> Self {
        Shape::Array(Box::new(inner))
    }

    /// This shape, or null/absent.
    pub fn optional(inner: Shape) -> Self {
        Shape::Optional(Box::new(inner))
    }

    fn check(&self, value: &Value, path: &str, report: &mut Vec<String>) {
        match self {
            Shape::Any => {}
            Shape::String => {
                if !value.is_string() {
                    report.push(format!("{path}: expected string, got {}", kind(value)));
                }
            }
            Shape::Number => {
                if !value.is_number() {
                    report.push(format!("{path}: expected number, got {}", kind(value)));
                }
            }
            Shape::Bool => {
                if !value.is_boolean() {
                    report.push(format!("{path}: expected bool, got {}", kind(value)));
                }
            }
            Shape::Object(fields) => {
                let Some(map) = value.as_object() else {
                    report.push(format!("{path}: expected object, got {}", kind(value)));
                    return;
                };
                for (name, shape) in fields {
                    let child_path = if path.is_empty() {
                        name.clone()
                    } else {
                        format!("{path}.{name}")
                    };
                    match map.get(name) {
                        Some(child) => shape.check(child, &child_path, report),
                        None => {
                            if !matches!(shape, Shape::Optional(_)) {
                                report.push(format!("{child_path}: missing"));
                            }
                        }
                    }
                }
            }
            Shape::Array(inner) => {
                let Some(items) = value.as_array() else {
                    report.push(format!("{path}: expected array, got {}", kind(value)));
                    return;
                };
                for (index, item) in items.iter().enumerate() {
                    inner.check(item, &format!("{path}[{index}]"), report);
                }
            }
            Shape::Optional(inner) => {
                if !value.is_null() {
                    inner.check(value, path, report);
                }
            }
        }
    }
}

impl Validator for Shape {
    fn validate(&self, payload: &Value) -> Result<(), ValidationError> {
        let mut report = Vec::new();
        self.check(payload, "", &mut report);
        if report.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Mismatch { report })
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The shape of a list-view feed item: the fields every edge node
/// carries regardless of endpoint.
pub fn feed_item_shape() -> Shape {
    Shape::object([(
        "node",
        Shape::object([
            ("id", Shape::String),
            ("shortcode", Shape::optional(Shape::String)),
            (
                "owner",
                Shape::optional(Shape::object([("id", Shape::String)])),
            ),
            ("is_video", Shape::optional(Shape::Bool)),
            ("taken_at_timestamp", Shape::optional(Shape::Number)),
        ]),
    )])
}

/// The shape of a full-detail item payload, as read off an item page.
/// Item pages root the media object rather than wrapping it in an edge.
pub fn full_item_shape() -> Shape {
    Shape::object([(
        "shortcode_media",
        Shape::object([
            ("id", Shape::String),
            ("shortcode", Shape::optional(Shape::String)),
            (
                "owner",
                Shape::optional(Shape::object([("id", Shape::String)])),
            ),
            ("is_video", Shape::optional(Shape::Bool)),
            ("taken_at_timestamp", Shape::optional(Shape::Number)),
        ]),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matching_payload() {
        let payload = json!({
            "node": {
                "id": "123",
                "shortcode": "Bx1",
                "is_video": false,
                "taken_at_timestamp": 1_700_000_000
            }
        });
        assert!(feed_item_shape().validate(&payload).is_ok());
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let payload = json!({"node": {"id": "123"}});
        assert!(feed_item_shape().validate(&payload).is_ok());
    }

    #[test]
    fn test_mismatch_reports_every_path() {
        let payload = json!({
            "node": {
                "id": 42,
                "is_video": "yes"
            }
        });
        let err = feed_item_shape().validate(&payload).unwrap_err();
        let ValidationError::Mismatch { report } = err;
        assert_eq!(report.len(), 2);
        assert!(report.iter().any(|line| line.starts_with("node.id:")));
        assert!(report.iter().any(|line| line.starts_with("node.is_video:")));
    }

    #[test]
    fn test_full_item_payload_matches_full_shape_only() {
        let payload = json!({"shortcode_media": {"id": "123", "shortcode": "Bx1"}});
        assert!(full_item_shape().validate(&payload).is_ok());
        assert!(feed_item_shape().validate(&payload).is_err());
    }

    #[test]
    fn test_any_accepts_everything() {
        assert!(Shape::Any.validate(&json!(null)).is_ok());
        assert!(Shape::Any.validate(&json!({"arbitrary": [1, 2]})).is_ok());
    }

    #[test]
    fn test_array_elements_checked() {
        let shape = Shape::array(Shape::Number);
        let err = shape.validate(&json!([1, "two", 3])).unwrap_err();
        let ValidationError::Mismatch { report } = err;
        assert_eq!(report, vec!["[1]: expected number, got string"]);
    }
}
