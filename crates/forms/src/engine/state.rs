use serde::Serialize;
use serde_json::{json, Value};

use crate::notify::ToastId;
use crate::path::{self, FieldPath};

/// The engine's single source of truth for one open form.
///
/// `form` is the live, user-editable snapshot; `clean_form` is the last
/// server-confirmed (or initial) snapshot. `clean_form` is used only for
/// change detection and is never mutated during editing.
#[derive(Debug, Clone, Serialize)]
pub struct FormState {
    pub form: Value,
    pub clean_form: Value,
    pub saving: bool,
    pub loading: bool,
    pub form_visible: bool,
    pub error_message: Option<String>,
    /// Partial mirror of the entity tree; a present key means the field
    /// failed validation.
    pub errors: Value,
    /// Ids of the notices this form raised, so it can dismiss exactly those.
    pub error_ids: Vec<ToastId>,
}

impl FormState {
    pub(crate) fn new(initial: Value, editing: bool) -> Self {
        FormState {
            form: initial.clone(),
            clean_form: initial,
            saving: false,
            loading: false,
            form_visible: !editing,
            error_message: None,
            errors: json!({}),
            error_ids: Vec::new(),
        }
    }

    /// Divergence between `form` and `clean_form`, the signal that gates
    /// navigation warnings.
    pub fn is_dirty(&self) -> bool {
        self.form != self.clean_form
    }

    /// Inline messages recorded for one field, if any.
    pub fn field_errors(&self, field: &FieldPath) -> Vec<String> {
        match path::get(&self.errors, field) {
            Some(Value::String(message)) => vec![message.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.errors
            .as_object()
            .map(|map| !map.is_empty())
            .unwrap_or(false)
    }
}
