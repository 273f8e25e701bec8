//! Error taxonomy mapping for failed saves.
//!
//! A structured validation failure arrives as a per-field payload keyed by
//! the same paths the form uses, with one reserved bucket (`nonFieldErrors`)
//! for messages that belong to the entity as a whole. Everything else
//! degrades to a single non-field message.

use serde_json::{Map, Value};

use crate::transport::TransportError;

/// Reserved key for entity-wide validation messages.
pub const NON_FIELD_ERRORS: &str = "nonFieldErrors";

/// Generic notice raised when inline field errors are present.
pub const SUBMIT_ERROR_MESSAGE: &str = "The form could not be saved. Check the highlighted fields.";

#[derive(Debug, Clone)]
pub struct SaveErrorReport {
    /// Error tree keyed by field paths, `nonFieldErrors` already split out.
    pub field_errors: Value,
    pub non_field_errors: Vec<String>,
    /// Set only for unstructured failures.
    pub message: Option<String>,
}

impl SaveErrorReport {
    fn empty() -> Self {
        SaveErrorReport {
            field_errors: Value::Object(Map::new()),
            non_field_errors: Vec::new(),
            message: None,
        }
    }

    fn from_message(message: String) -> Self {
        SaveErrorReport {
            message: Some(message),
            ..SaveErrorReport::empty()
        }
    }

    pub fn has_field_errors(&self) -> bool {
        self.field_errors
            .as_object()
            .map(|map| !map.is_empty())
            .unwrap_or(false)
    }

    /// When true, the generic submission notice is suppressed and the
    /// specific messages are shown instead.
    pub fn only_non_field(&self) -> bool {
        !self.non_field_errors.is_empty() && !self.has_field_errors()
    }
}

pub fn map_save_error(error: &TransportError) -> SaveErrorReport {
    if error.is_validation() {
        if let TransportError::Status { body, .. } = error {
            return map_validation_body(body);
        }
    }
    SaveErrorReport::from_message(error.to_string())
}

fn map_validation_body(body: &Value) -> SaveErrorReport {
    match body {
        Value::Object(map) => {
            let mut fields = map.clone();
            let non_field_errors = fields
                .remove(NON_FIELD_ERRORS)
                .map(|v| collect_messages(&v))
                .unwrap_or_default();
            SaveErrorReport {
                field_errors: Value::Object(fields),
                non_field_errors,
                message: None,
            }
        }
        Value::Array(_) => SaveErrorReport {
            non_field_errors: collect_messages(body),
            ..SaveErrorReport::empty()
        },
        Value::String(message) => SaveErrorReport::from_message(message.clone()),
        _ => SaveErrorReport::from_message(SUBMIT_ERROR_MESSAGE.to_string()),
    }
}

fn collect_messages(value: &Value) -> Vec<String> {
    match value {
        Value::String(message) => vec![message.clone()],
        Value::Array(items) => items.iter().flat_map(collect_messages).collect(),
        Value::Object(map) => map
            .get("detail")
            .or_else(|| map.get("message"))
            .map(collect_messages)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_body_splits_buckets() {
        let error = TransportError::Status {
            status: 400,
            body: json!({
                "firstName": ["This field is required."],
                "nonFieldErrors": ["Candidate already archived."]
            }),
        };
        let report = map_save_error(&error);
        assert_eq!(
            report.field_errors,
            json!({"firstName": ["This field is required."]})
        );
        assert_eq!(
            report.non_field_errors,
            vec!["Candidate already archived."]
        );
        assert!(report.message.is_none());
        assert!(!report.only_non_field());
    }

    #[test]
    fn test_non_field_only_body() {
        let error = TransportError::Status {
            status: 400,
            body: json!({"nonFieldErrors": ["Duplicate submission."]}),
        };
        let report = map_save_error(&error);
        assert!(report.only_non_field());
        assert!(!report.has_field_errors());
    }

    #[test]
    fn test_nested_field_paths_survive() {
        let error = TransportError::Status {
            status: 400,
            body: json!({"sourceTimeslots": [{"startAt": ["Invalid time."]}]}),
        };
        let report = map_save_error(&error);
        assert_eq!(
            report.field_errors,
            json!({"sourceTimeslots": [{"startAt": ["Invalid time."]}]})
        );
    }

    #[test]
    fn test_string_body_degrades_to_message() {
        let error = TransportError::Status {
            status: 400,
            body: json!("malformed request"),
        };
        let report = map_save_error(&error);
        assert_eq!(report.message.as_deref(), Some("malformed request"));
        assert!(!report.has_field_errors());
    }

    #[test]
    fn test_server_error_degrades_to_message() {
        let error = TransportError::Status {
            status: 500,
            body: json!({"anything": "goes"}),
        };
        let report = map_save_error(&error);
        assert!(report.message.is_some());
        assert!(!report.has_field_errors());
    }

    #[test]
    fn test_collect_messages_shapes() {
        assert_eq!(collect_messages(&json!("a")), vec!["a"]);
        assert_eq!(collect_messages(&json!(["a", "b"])), vec!["a", "b"]);
        assert_eq!(collect_messages(&json!({"detail": "c"})), vec!["c"]);
        assert!(collect_messages(&json!(12)).is_empty());
    }
}
