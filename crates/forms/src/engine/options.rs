//! The caller contract. Every concrete form supplies a subset of these
//! options; the controller enforces one lifecycle over all of them.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::path::FieldPath;
use crate::transport::Transport;

pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub type ValidationTransform = Arc<dyn Fn(&str, Value) -> Value + Send + Sync>;
/// `(submitted, initial_state, response) -> next form`
pub type ResetReducer = Arc<dyn Fn(Value, &Value, &Value) -> Value + Send + Sync>;
pub type SavedCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// A before-save gate's refusal. A veto with an `error_state_key` writes its
/// message straight into form state under that key; a veto with only a
/// message surfaces as a notice; a silent veto just cancels the submit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", .message.as_deref().unwrap_or("save cancelled"))]
pub struct GateVeto {
    pub message: Option<String>,
    pub error_state_key: Option<String>,
}

impl GateVeto {
    pub fn silent() -> Self {
        GateVeto::default()
    }

    pub fn message(message: impl Into<String>) -> Self {
        GateVeto {
            message: Some(message.into()),
            error_state_key: None,
        }
    }

    pub fn field(error_state_key: impl Into<String>, message: impl Into<String>) -> Self {
        GateVeto {
            message: Some(message.into()),
            error_state_key: Some(error_state_key.into()),
        }
    }
}

/// Arbitrary sub-protocol run between the form transforms and the remote
/// save. May patch the outgoing data or veto the save entirely; the save
/// operation is not invoked until the gate resolves.
#[async_trait]
pub trait SaveGate: Send + Sync {
    async fn check(&self, form: Value) -> Result<Value, GateVeto>;
}

/// Result of a deferred post-save side effect. The patch is merged into form
/// state; `success` reports whether every deferred step went through.
#[derive(Debug, Clone, Default)]
pub struct PostSaveReport {
    pub success: bool,
    pub patch: Option<Value>,
}

impl PostSaveReport {
    pub fn clean() -> Self {
        PostSaveReport {
            success: true,
            patch: None,
        }
    }
}

/// Deferred side effects that must run strictly after the entity is
/// persisted. Receives the saved entity, so running before it exists is
/// unrepresentable.
#[async_trait]
pub trait PostSaveHook: Send + Sync {
    async fn after_save(
        &self,
        saved: &Value,
        form: &Value,
        transport: Arc<dyn Transport>,
    ) -> PostSaveReport;
}

#[derive(Clone, Default)]
pub enum ResetAfterSave {
    /// Keep the submitted state as the new form.
    #[default]
    Keep,
    /// Replace the form with the raw initial state.
    Initial,
    /// Replace the form via a caller-supplied reducer.
    Reducer(ResetReducer),
}

pub struct FormOptions {
    pub initial_state: Option<Value>,
    /// Id of the entity being edited. `None` means a create form.
    pub editing: Option<Value>,
    /// Field the entity id is read from on submit. Defaults to `id`.
    pub lookup_field: String,
    pub read_operation: Option<String>,
    pub save_operation: String,
    pub validate_operation: Option<String>,
    /// Declared required fields; the submit is a silent no-op while any is
    /// empty, mirroring a native form-level validity gate.
    pub required_fields: Vec<FieldPath>,
    pub process_read_object: Option<Transform>,
    pub process_form_state: Option<Transform>,
    pub process_validation_params: Option<ValidationTransform>,
    pub check_form_state_before_save: Option<Arc<dyn SaveGate>>,
    pub check_fields_id_before_save: Option<Transform>,
    pub on_saved: Option<SavedCallback>,
    pub after_save: Option<Arc<dyn PostSaveHook>>,
    pub reset_after_save: ResetAfterSave,
}

impl FormOptions {
    /// Options for a create form. The initial state is mandatory here; a
    /// create form without one is a programmer error.
    pub fn create(save_operation: impl Into<String>, initial_state: Value) -> Self {
        FormOptions {
            initial_state: Some(initial_state),
            editing: None,
            lookup_field: "id".to_string(),
            read_operation: None,
            save_operation: save_operation.into(),
            validate_operation: None,
            required_fields: Vec::new(),
            process_read_object: None,
            process_form_state: None,
            process_validation_params: None,
            check_form_state_before_save: None,
            check_fields_id_before_save: None,
            on_saved: None,
            after_save: None,
            reset_after_save: ResetAfterSave::Keep,
        }
    }

    /// Options for an edit form: the entity is read through
    /// `read_operation` before the form becomes visible.
    pub fn edit(
        save_operation: impl Into<String>,
        read_operation: impl Into<String>,
        id: Value,
    ) -> Self {
        let mut options = FormOptions::create(save_operation, json!({}));
        options.editing = Some(id);
        options.read_operation = Some(read_operation.into());
        options
    }

    pub fn with_initial_state(mut self, initial_state: Value) -> Self {
        self.initial_state = Some(initial_state);
        self
    }

    pub fn with_lookup_field(mut self, field: impl Into<String>) -> Self {
        self.lookup_field = field.into();
        self
    }

    pub fn with_validation(mut self, operation: impl Into<String>) -> Self {
        self.validate_operation = Some(operation.into());
        self
    }

    /// Declares a required field. Invalid path syntax here is a programmer
    /// error and fails loudly.
    pub fn require(mut self, path: &str) -> Self {
        let parsed = FieldPath::parse(path)
            .unwrap_or_else(|e| panic!("invalid required field path `{path}`: {e}"));
        self.required_fields.push(parsed);
        self
    }

    pub fn with_read_transform(mut self, transform: Transform) -> Self {
        self.process_read_object = Some(transform);
        self
    }

    pub fn with_form_transform(mut self, transform: Transform) -> Self {
        self.process_form_state = Some(transform);
        self
    }

    pub fn with_validation_params(mut self, transform: ValidationTransform) -> Self {
        self.process_validation_params = Some(transform);
        self
    }

    pub fn with_save_gate(mut self, gate: Arc<dyn SaveGate>) -> Self {
        self.check_form_state_before_save = Some(gate);
        self
    }

    pub fn with_id_collapse(mut self, transform: Transform) -> Self {
        self.check_fields_id_before_save = Some(transform);
        self
    }

    pub fn with_on_saved(mut self, callback: SavedCallback) -> Self {
        self.on_saved = Some(callback);
        self
    }

    pub fn with_after_save(mut self, hook: Arc<dyn PostSaveHook>) -> Self {
        self.after_save = Some(hook);
        self
    }

    pub fn with_reset(mut self, reset: ResetAfterSave) -> Self {
        self.reset_after_save = reset;
        self
    }
}
