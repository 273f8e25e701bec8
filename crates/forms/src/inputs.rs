//! Field input dispatch.
//!
//! Forms declare each field as a string tag ("select", "phone", "richText").
//! The registry resolves a tag to a widget kind plus a change normalizer that
//! folds the widget's native payload into the one `ChangeEvent` shape the
//! engine understands. Unknown tags fall back to the free-text widget, so
//! dispatch is total and never fails on a new or misspelled tag.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InputKind {
    Text,
    TextArea,
    Select,
    MultiSelect,
    RichText,
    Date,
    DateTime,
    Time,
    Rating,
    Phone,
    Percentage,
    Checkbox,
    Password,
    Number,
}

/// The uniform change signal every widget is normalized into.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub name: String,
    pub value: Value,
}

pub type Normalizer = Arc<dyn Fn(Value) -> Value + Send + Sync>;

pub struct InputEntry {
    pub kind: InputKind,
    normalize: Normalizer,
}

/// A fully configured widget descriptor handed to the view layer: which
/// widget to render, under which field name, with which current value and
/// inline errors.
#[derive(Debug, Clone, Serialize)]
pub struct InputSpec {
    pub kind: InputKind,
    pub name: String,
    pub value: Value,
    pub errors: Vec<String>,
    pub props: Map<String, Value>,
}

pub struct InputRegistry {
    entries: HashMap<String, InputEntry>,
    fallback: InputEntry,
}

impl InputRegistry {
    /// Registry with the standard tag set. New tags can be added with
    /// [`InputRegistry::register`]; editing this constructor is not required.
    pub fn standard() -> Self {
        let mut registry = InputRegistry {
            entries: HashMap::new(),
            fallback: InputEntry {
                kind: InputKind::Text,
                normalize: Arc::new(unwrap_value),
            },
        };
        registry.register("text", InputKind::Text, Arc::new(unwrap_value));
        registry.register("textarea", InputKind::TextArea, Arc::new(unwrap_value));
        registry.register("password", InputKind::Password, Arc::new(unwrap_value));
        registry.register("select", InputKind::Select, Arc::new(normalize_select));
        registry.register(
            "multiSelect",
            InputKind::MultiSelect,
            Arc::new(normalize_multi_select),
        );
        registry.register(
            "richText",
            InputKind::RichText,
            Arc::new(normalize_rich_text),
        );
        registry.register("date", InputKind::Date, Arc::new(normalize_date));
        registry.register(
            "datetime",
            InputKind::DateTime,
            Arc::new(normalize_datetime),
        );
        registry.register("time", InputKind::Time, Arc::new(unwrap_value));
        registry.register("rating", InputKind::Rating, Arc::new(normalize_rating));
        registry.register("phone", InputKind::Phone, Arc::new(normalize_phone));
        registry.register(
            "percentage",
            InputKind::Percentage,
            Arc::new(normalize_percentage),
        );
        registry.register(
            "checkbox",
            InputKind::Checkbox,
            Arc::new(normalize_checkbox),
        );
        registry.register("number", InputKind::Number, Arc::new(normalize_number));
        registry
    }

    pub fn register(&mut self, tag: &str, kind: InputKind, normalize: Normalizer) {
        self.entries
            .insert(tag.to_string(), InputEntry { kind, normalize });
    }

    /// Total dispatch: unknown tags resolve to the free-text entry.
    pub fn resolve(&self, tag: &str) -> &InputEntry {
        self.entries.get(tag).unwrap_or(&self.fallback)
    }

    pub fn kind_of(&self, tag: &str) -> InputKind {
        self.resolve(tag).kind
    }

    /// Builds the widget descriptor for one field. The engine fills in the
    /// current value and inline errors before handing it to the view.
    pub fn bind(&self, tag: &str, name: &str, value: Value, props: Map<String, Value>) -> InputSpec {
        InputSpec {
            kind: self.kind_of(tag),
            name: name.to_string(),
            value,
            errors: Vec::new(),
            props,
        }
    }

    /// Folds a widget-native change payload into `{name, value}`.
    pub fn normalize(&self, tag: &str, name: &str, raw: Value) -> ChangeEvent {
        let entry = self.resolve(tag);
        ChangeEvent {
            name: name.to_string(),
            value: (entry.normalize)(raw),
        }
    }
}

impl Default for InputRegistry {
    fn default() -> Self {
        InputRegistry::standard()
    }
}

/// Widgets that report `{value: ...}` objects collapse to the inner value;
/// everything else passes through.
fn unwrap_value(raw: Value) -> Value {
    match raw {
        Value::Object(mut map) => map.remove("value").unwrap_or(Value::Object(map)),
        other => other,
    }
}

fn normalize_select(raw: Value) -> Value {
    unwrap_value(raw)
}

fn normalize_multi_select(raw: Value) -> Value {
    match raw {
        Value::Array(items) => Value::Array(items.into_iter().map(unwrap_value).collect()),
        other => unwrap_value(other),
    }
}

fn normalize_checkbox(raw: Value) -> Value {
    match raw {
        Value::Bool(b) => Value::Bool(b),
        Value::Object(map) => Value::Bool(
            map.get("checked")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        ),
        _ => Value::Bool(false),
    }
}

fn normalize_rich_text(raw: Value) -> Value {
    match raw {
        Value::Object(mut map) => match map.remove("content") {
            Some(content) => content,
            None => Value::Object(map),
        },
        other => other,
    }
}

fn normalize_rating(raw: Value) -> Value {
    clamp_number(unwrap_value(raw), 0.0, 5.0)
}

fn normalize_percentage(raw: Value) -> Value {
    clamp_number(unwrap_value(raw), 0.0, 100.0)
}

fn clamp_number(raw: Value, min: f64, max: f64) -> Value {
    let parsed = match &raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed.and_then(|n| serde_json::Number::from_f64(n.clamp(min, max))) {
        Some(n) => Value::Number(n),
        None => raw,
    }
}

fn normalize_phone(raw: Value) -> Value {
    match unwrap_value(raw) {
        Value::String(s) => {
            let mut out = String::new();
            for (i, c) in s.chars().enumerate() {
                if c.is_ascii_digit() || (c == '+' && i == 0) {
                    out.push(c);
                }
            }
            Value::String(out)
        }
        other => other,
    }
}

fn normalize_number(raw: Value) -> Value {
    match unwrap_value(raw) {
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(n) = trimmed.parse::<i64>() {
                return Value::from(n);
            }
            match trimmed
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
            {
                Some(n) => Value::Number(n),
                None => Value::String(s),
            }
        }
        other => other,
    }
}

/// Date fields accept a plain `YYYY-MM-DD` string, or a full timestamp from
/// a datetime picker, which is truncated to its date part.
fn normalize_date(raw: Value) -> Value {
    match unwrap_value(raw) {
        Value::String(s) => {
            if NaiveDate::parse_from_str(&s, "%Y-%m-%d").is_ok() {
                return Value::String(s);
            }
            match DateTime::parse_from_rfc3339(&s) {
                Ok(dt) => Value::String(dt.date_naive().to_string()),
                Err(_) => Value::String(s),
            }
        }
        other => other,
    }
}

fn normalize_datetime(raw: Value) -> Value {
    match unwrap_value(raw) {
        Value::String(s) => match DateTime::parse_from_rfc3339(&s) {
            Ok(dt) => Value::String(dt.to_rfc3339()),
            Err(_) => Value::String(s),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_tag_falls_back_to_text() {
        let registry = InputRegistry::standard();
        assert_eq!(registry.kind_of("holographic"), InputKind::Text);
        let event = registry.normalize("holographic", "firstName", json!("Ada"));
        assert_eq!(event.value, json!("Ada"));
    }

    #[test]
    fn test_select_collapses_option_object() {
        let registry = InputRegistry::standard();
        let event = registry.normalize(
            "select",
            "status",
            json!({"value": "active", "label": "Active"}),
        );
        assert_eq!(event.name, "status");
        assert_eq!(event.value, json!("active"));
    }

    #[test]
    fn test_multi_select_collapses_each_option() {
        let registry = InputRegistry::standard();
        let event = registry.normalize(
            "multiSelect",
            "skills",
            json!([{"value": 1, "label": "Rust"}, {"value": 2, "label": "SQL"}]),
        );
        assert_eq!(event.value, json!([1, 2]));
    }

    #[test]
    fn test_checkbox_collapses_to_bool() {
        let registry = InputRegistry::standard();
        assert_eq!(
            registry
                .normalize("checkbox", "remote", json!({"checked": true}))
                .value,
            json!(true)
        );
        assert_eq!(
            registry.normalize("checkbox", "remote", json!("yes")).value,
            json!(false)
        );
    }

    #[test]
    fn test_rich_text_collapses_document() {
        let registry = InputRegistry::standard();
        let event = registry.normalize(
            "richText",
            "description",
            json!({"content": "<p>hello</p>", "selection": [0, 2]}),
        );
        assert_eq!(event.value, json!("<p>hello</p>"));
    }

    #[test]
    fn test_rating_and_percentage_clamp() {
        let registry = InputRegistry::standard();
        assert_eq!(
            registry.normalize("rating", "score", json!(9)).value,
            json!(5.0)
        );
        assert_eq!(
            registry
                .normalize("percentage", "match", json!("150"))
                .value,
            json!(100.0)
        );
    }

    #[test]
    fn test_phone_keeps_digits_and_leading_plus() {
        let registry = InputRegistry::standard();
        let event = registry.normalize("phone", "phone", json!("+49 (30) 555-01 23"));
        assert_eq!(event.value, json!("+49305550123"));
    }

    #[test]
    fn test_number_parses_strings() {
        let registry = InputRegistry::standard();
        assert_eq!(
            registry.normalize("number", "salary", json!("85000")).value,
            json!(85000)
        );
        assert_eq!(
            registry.normalize("number", "rate", json!("1.5")).value,
            json!(1.5)
        );
        assert_eq!(
            registry.normalize("number", "rate", json!("abc")).value,
            json!("abc")
        );
    }

    #[test]
    fn test_date_truncates_timestamps() {
        let registry = InputRegistry::standard();
        assert_eq!(
            registry
                .normalize("date", "startDate", json!("2024-03-01"))
                .value,
            json!("2024-03-01")
        );
        assert_eq!(
            registry
                .normalize("date", "startDate", json!("2024-03-01T09:30:00+01:00"))
                .value,
            json!("2024-03-01")
        );
    }

    #[test]
    fn test_registering_a_new_tag() {
        let mut registry = InputRegistry::standard();
        registry.register(
            "shouting",
            InputKind::Text,
            Arc::new(|raw| match raw {
                Value::String(s) => Value::String(s.to_uppercase()),
                other => other,
            }),
        );
        let event = registry.normalize("shouting", "title", json!("senior dev"));
        assert_eq!(event.value, json!("SENIOR DEV"));
    }

    #[test]
    fn test_bind_carries_props() {
        let registry = InputRegistry::standard();
        let mut props = Map::new();
        props.insert("placeholder".to_string(), json!("Jane"));
        let spec = registry.bind("text", "firstName", json!("Ada"), props);
        assert_eq!(spec.kind, InputKind::Text);
        assert_eq!(spec.value, json!("Ada"));
        assert_eq!(spec.props.get("placeholder"), Some(&json!("Jane")));
    }
}
