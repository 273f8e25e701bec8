//! Form engine core.
//!
//! One `FormController` instance drives one open form through a single
//! lifecycle, whatever the entity looks like: read (edit mode), field edits
//! through paths, partial validation on blur, submit with caller hooks,
//! save-error taxonomy, post-save reset and deferred side effects. All state
//! mutation goes through the controller, so two forms open at once cannot
//! cross-contaminate, notice bookkeeping included.

pub mod options;
pub mod save_errors;
pub mod state;
mod validation;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::errors::FormError;
use crate::inputs::{ChangeEvent, InputRegistry, InputSpec};
use crate::notify::Notifier;
use crate::path::{self, FieldPath};
use crate::transport::{OperationParams, OperationRequest, Transport, TransportError};

use self::options::{FormOptions, GateVeto, ResetAfterSave};
use self::save_errors::{map_save_error, SUBMIT_ERROR_MESSAGE};
use self::state::FormState;

/// What a submit resolved to. Remote failures are folded into form state;
/// the outcome tells the caller which branch happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The entity was persisted. `files_clean` is false when a deferred
    /// file upload failed; the save itself still counts.
    Saved { object: Value, files_clean: bool },
    /// A before-save gate vetoed the submit; nothing was sent.
    Blocked,
    /// A declared required field is empty; the submit was a silent no-op.
    Invalid,
    /// The remote save failed; errors were recorded in state.
    Failed,
}

pub struct FormController {
    state: FormState,
    options: FormOptions,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    inputs: InputRegistry,
    /// Per-root sequence numbers; late partial-validation responses that a
    /// newer request superseded are discarded instead of applied.
    validation_seq: HashMap<String, u64>,
}

impl FormController {
    /// Panics on contradictory options: editing without a read operation, or
    /// a create form without an initial state. Both are programmer errors.
    pub fn new(
        options: FormOptions,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        assert!(
            options.editing.is_none() || options.read_operation.is_some(),
            "editing a form requires a read operation"
        );
        assert!(
            options.editing.is_some() || options.initial_state.is_some(),
            "a create form requires an initial state"
        );
        let initial = options.initial_state.clone().unwrap_or_else(|| json!({}));
        let editing = options.editing.is_some();
        FormController {
            state: FormState::new(initial, editing),
            options,
            transport,
            notifier,
            inputs: InputRegistry::standard(),
            validation_seq: HashMap::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: InputRegistry) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn form(&self) -> &Value {
        &self.state.form
    }

    pub fn is_dirty(&self) -> bool {
        self.state.is_dirty()
    }

    pub fn is_editing(&self) -> bool {
        self.options.editing.is_some()
    }

    /// Loads the edited entity. Initial-state defaults merge under the
    /// transformed server object; both `form` and `clean_form` take the
    /// merged result. No-op for create forms.
    pub async fn fetch_data(&mut self) {
        let (Some(operation), Some(id)) = (
            self.options.read_operation.clone(),
            self.options.editing.clone(),
        ) else {
            return;
        };

        self.state.loading = true;
        self.state.error_message = None;

        let request = OperationRequest::new(operation, OperationParams::with_id(id, Value::Null));
        match self.transport.execute(request).await {
            Ok(response) => {
                let mut object = response.obj;
                if let Some(transform) = &self.options.process_read_object {
                    object = transform(object);
                }
                let defaults = self.options.initial_state.clone().unwrap_or_else(|| json!({}));
                let merged = path::merge(&defaults, &object);
                self.state.form = merged.clone();
                self.state.clean_form = merged;
                self.state.form_visible = true;
                self.state.loading = false;
            }
            Err(error) => {
                self.state.loading = false;
                self.state.form_visible = false;
                let message = if error.is_not_found() {
                    "Entity not found".to_string()
                } else {
                    // Not-found is a page-level concern; everything else
                    // still surfaces as a notice.
                    let message = error.to_string();
                    let id = self.notifier.error(&message);
                    self.state.error_ids.push(id);
                    message
                };
                warn!("read failed: {error}");
                self.state.error_message = Some(message);
            }
        }
    }

    /// Path-accessor set on `form` only. `clean_form` and `errors` are
    /// untouched; errors persist until a fresh validate or submit clears
    /// them.
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<(), FormError> {
        let field = FieldPath::parse(name)?;
        path::set_in(&mut self.state.form, &field, value);
        Ok(())
    }

    pub fn change(&mut self, event: ChangeEvent) -> Result<(), FormError> {
        self.set_value(&event.name, event.value)
    }

    /// Normalizes a widget-native payload through the input registry and
    /// applies it in one step.
    pub fn input_change(&mut self, tag: &str, name: &str, raw: Value) -> Result<(), FormError> {
        let event = self.inputs.normalize(tag, name, raw);
        self.change(event)
    }

    /// Widget descriptor for one field with the current value and inline
    /// errors attached, ready for the view layer.
    pub fn bound_input(
        &self,
        tag: &str,
        name: &str,
        props: Map<String, Value>,
    ) -> Result<InputSpec, FormError> {
        let field = FieldPath::parse(name)?;
        let value = path::get(&self.state.form, &field)
            .cloned()
            .unwrap_or(Value::Null);
        let mut spec = self.inputs.bind(tag, name, value, props);
        spec.errors = self.state.field_errors(&field);
        Ok(spec)
    }

    /// Validates only the subtree under the blurred field's root key.
    /// Responses superseded by a newer request for the same root are
    /// discarded. Transport failures on this path are ignored; blur
    /// validation must never block editing.
    pub async fn validate_on_blur(&mut self, name: &str) {
        let Some(operation) = self.options.validate_operation.clone() else {
            return;
        };
        let Ok(field) = FieldPath::parse(name) else {
            return;
        };
        let Some(root) = field.root_key().map(str::to_string) else {
            return;
        };

        let mut data = validation::params_for_root(&self.state.form, &root);
        if let Some(transform) = &self.options.process_validation_params {
            data = transform(&root, data);
        }

        let seq = {
            let counter = self.validation_seq.entry(root.clone()).or_insert(0);
            *counter += 1;
            *counter
        };

        let request = OperationRequest::new(operation, OperationParams::data(data));
        let result = self.transport.execute(request).await;

        if self.validation_seq.get(&root) != Some(&seq) {
            debug!(root = %root, "discarding stale validation response");
            return;
        }

        match result {
            Ok(_) => validation::apply_success(&mut self.state.errors, &root),
            Err(error) if error.is_validation() => {
                if let TransportError::Status { body, .. } = &error {
                    validation::apply_failure(&mut self.state.errors, &root, body);
                }
            }
            Err(error) => debug!(root = %root, "partial validation skipped: {error}"),
        }
    }

    /// The submit pipeline: required gate, extra-data merge, caller
    /// transforms, before-save gate, remote save, then finalize or
    /// save-error handling. Stages run strictly in order; no stage begins
    /// before its predecessor resolves.
    pub async fn submit(&mut self, extra_data: Option<Value>) -> SubmitOutcome {
        self.dismiss_notices();
        self.state.error_message = None;

        for required in &self.options.required_fields {
            if !has_value(&self.state.form, required) {
                debug!(field = %required, "required field empty, submit is a no-op");
                return SubmitOutcome::Invalid;
            }
        }

        let mut data = self.state.form.clone();
        if let Some(extra) = extra_data {
            data = path::merge(&data, &extra);
        }
        if let Some(transform) = &self.options.process_form_state {
            data = transform(data);
        }

        if let Some(gate) = self.options.check_form_state_before_save.clone() {
            match gate.check(data).await {
                Ok(patched) => data = patched,
                Err(veto) => {
                    self.apply_veto(veto);
                    return SubmitOutcome::Blocked;
                }
            }
        }

        let new_state = data.clone();
        let mut payload = data;
        if let Some(transform) = &self.options.check_fields_id_before_save {
            payload = transform(payload);
        }

        self.state.saving = true;

        let id = payload
            .get(&self.options.lookup_field)
            .filter(|v| !v.is_null())
            .cloned()
            .or_else(|| self.options.editing.clone());
        let request = OperationRequest::new(
            self.options.save_operation.clone(),
            OperationParams { id, data: payload },
        );

        match self.transport.execute(request).await {
            Ok(response) => self.finish_save_process(new_state, response.obj).await,
            Err(error) => {
                self.handle_save_error(&error);
                SubmitOutcome::Failed
            }
        }
    }

    /// Post-save finalization. `clean_form` is snapshotted only here, which
    /// is what keeps the dirty check honest about what the server has.
    async fn finish_save_process(&mut self, new_state: Value, response: Value) -> SubmitOutcome {
        let initial = self.options.initial_state.clone().unwrap_or_else(|| json!({}));
        let reset_requested = !matches!(self.options.reset_after_save, ResetAfterSave::Keep);

        self.state.form = match &self.options.reset_after_save {
            ResetAfterSave::Keep => new_state,
            ResetAfterSave::Initial => initial.clone(),
            ResetAfterSave::Reducer(reduce) => reduce(new_state, &initial, &response),
        };
        self.state.errors = json!({});
        self.state.saving = false;

        if self.is_editing() && reset_requested {
            // The entity is conceptually closed and reopened.
            self.state.form_visible = false;
            self.fetch_data().await;
        }

        self.state.clean_form = self.state.form.clone();

        if let Some(on_saved) = &self.options.on_saved {
            on_saved(&response);
        }

        let mut files_clean = true;
        if let Some(hook) = self.options.after_save.clone() {
            let report = hook
                .after_save(&response, &self.state.form, self.transport.clone())
                .await;
            if let Some(patch) = report.patch {
                self.state.form = path::merge(&self.state.form, &patch);
            }
            files_clean = report.success;
        }

        SubmitOutcome::Saved {
            object: response,
            files_clean,
        }
    }

    fn apply_veto(&mut self, veto: GateVeto) {
        match (&veto.error_state_key, &veto.message) {
            (Some(key), Some(message)) => {
                // Caller-raised field error: written into form state itself,
                // not the error tree.
                if let Ok(field) = FieldPath::parse(key) {
                    path::set_in(
                        &mut self.state.form,
                        &field,
                        Value::String(message.clone()),
                    );
                }
            }
            (None, Some(message)) => {
                let id = self.notifier.error(message);
                self.state.error_ids.push(id);
            }
            _ => {}
        }
        self.state.saving = false;
        debug!("save vetoed by gate");
    }

    fn handle_save_error(&mut self, error: &TransportError) {
        let report = map_save_error(error);

        if let Some(message) = &report.message {
            self.state.error_message = Some(message.clone());
            let id = self.notifier.error(message);
            self.state.error_ids.push(id);
        } else {
            self.state.errors = report.field_errors.clone();
            for message in &report.non_field_errors {
                let id = self.notifier.error(message);
                self.state.error_ids.push(id);
            }
            if report.has_field_errors() {
                let id = self.notifier.error(SUBMIT_ERROR_MESSAGE);
                self.state.error_ids.push(id);
            }
        }

        self.state.saving = false;
        warn!("save failed: {error}");
    }

    /// Dismisses every notice this form raised, and only those. Called at
    /// the top of each submit and by the view layer on unmount.
    pub fn dismiss_notices(&mut self) {
        for id in self.state.error_ids.drain(..) {
            self.notifier.dismiss(id);
        }
    }
}

fn has_value(form: &Value, field: &FieldPath) -> bool {
    match path::get(form, field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}
