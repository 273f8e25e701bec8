//! Deferred file uploads.
//!
//! Files attached to a form before its entity exists cannot be uploaded
//! standalone; they wait for the parent save and then upload against the
//! persisted id. The orchestrator is built from two pure functions and runs
//! as a post-save hook, so the ordering invariant (no upload without a saved
//! parent) holds by construction: descriptor params are built *from* the
//! saved entity.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::engine::options::{GateVeto, PostSaveHook, PostSaveReport, SaveGate};
use crate::transport::{FilePayload, OperationParams, OperationRequest, Transport, TransportError};

/// Builds the upload request parameters once the parent entity is known.
pub type ParamsFn = Arc<dyn Fn(&Value) -> OperationParams + Send + Sync>;

/// One pending local file plus instructions for uploading it. Single-owner
/// and single-use: consumed exactly once, never retried automatically.
#[derive(Clone)]
pub struct FileDescriptor {
    pub file: FilePayload,
    pub operation_id: String,
    pub params: ParamsFn,
    pub is_photo: bool,
    pub is_resume: bool,
    /// Form key of the confirmed-files list this file joins on success.
    pub files_key: Option<String>,
    /// Form key of the pending list this file came from; failures are
    /// flagged there with `error: true` so the view can offer retry.
    pub new_files_key: Option<String>,
}

impl FileDescriptor {
    pub fn new(file: FilePayload, operation_id: impl Into<String>, params: ParamsFn) -> Self {
        FileDescriptor {
            file,
            operation_id: operation_id.into(),
            params,
            is_photo: false,
            is_resume: false,
            files_key: None,
            new_files_key: None,
        }
    }

    pub fn photo(mut self) -> Self {
        self.is_photo = true;
        self
    }

    pub fn resume(mut self) -> Self {
        self.is_resume = true;
        self
    }

    pub fn with_files_key(mut self, key: impl Into<String>) -> Self {
        self.files_key = Some(key.into());
        self
    }

    pub fn with_new_files_key(mut self, key: impl Into<String>) -> Self {
        self.new_files_key = Some(key.into());
        self
    }
}

pub struct UploadSuccess {
    pub descriptor: FileDescriptor,
    pub response: Value,
}

pub struct UploadFailure {
    pub descriptor: FileDescriptor,
    pub error: TransportError,
}

pub type DescribeFn = Arc<dyn Fn(&Value) -> Vec<FileDescriptor> + Send + Sync>;
pub type ReconcileFn = Arc<dyn Fn(&[UploadSuccess], &Value) -> Value + Send + Sync>;

/// Post-save upload pipeline: describe which files are pending, fan the
/// uploads out, reconcile the confirmed ones back into form state.
pub struct FileUploader {
    describe: DescribeFn,
    reconcile: ReconcileFn,
}

impl FileUploader {
    pub fn new(describe: DescribeFn, reconcile: ReconcileFn) -> Self {
        FileUploader { describe, reconcile }
    }
}

#[async_trait]
impl PostSaveHook for FileUploader {
    async fn after_save(
        &self,
        saved: &Value,
        form: &Value,
        transport: Arc<dyn Transport>,
    ) -> PostSaveReport {
        let descriptors = (self.describe)(form);
        if descriptors.is_empty() {
            return PostSaveReport::clean();
        }
        let total = descriptors.len();

        // Concurrent fan-out; per-file outcomes are independent and one
        // failure cancels nothing.
        let mut tasks = JoinSet::new();
        for (index, descriptor) in descriptors.into_iter().enumerate() {
            let transport = transport.clone();
            let saved = saved.clone();
            tasks.spawn(async move {
                let params = (descriptor.params)(&saved);
                let request = OperationRequest::new(descriptor.operation_id.clone(), params)
                    .with_file(descriptor.file.clone());
                let result = transport.execute(request).await;
                (index, descriptor, result)
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_error) => warn!("file upload task failed: {join_error}"),
            }
        }
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for (_, descriptor, result) in outcomes {
            match result {
                Ok(response) => {
                    debug!(file = %descriptor.file.name, "file upload confirmed");
                    successes.push(UploadSuccess {
                        descriptor,
                        response: response.obj,
                    });
                }
                Err(error) => {
                    warn!(file = %descriptor.file.name, "file upload failed: {error}");
                    failures.push(UploadFailure { descriptor, error });
                }
            }
        }

        let mut patch = (self.reconcile)(&successes, form);
        if !patch.is_object() {
            patch = json!({});
        }
        flag_failures(&mut patch, form, &failures);

        PostSaveReport {
            success: failures.is_empty() && successes.len() == total,
            patch: Some(patch),
        }
    }
}

/// Marks each failed file in its pending list with `error: true`, in the
/// patch, so retry state reaches the view without clobbering other fields.
fn flag_failures(patch: &mut Value, form: &Value, failures: &[UploadFailure]) {
    for failure in failures {
        let Some(key) = &failure.descriptor.new_files_key else {
            continue;
        };
        let list = patch
            .get(key.as_str())
            .or_else(|| form.get(key.as_str()))
            .cloned();
        let Some(Value::Array(mut items)) = list else {
            continue;
        };
        for item in items.iter_mut() {
            let matches = item.get("name").and_then(Value::as_str)
                == Some(failure.descriptor.file.name.as_str());
            if matches {
                if let Some(map) = item.as_object_mut() {
                    map.insert("error".to_string(), json!(true));
                }
            }
        }
        if let Some(map) = patch.as_object_mut() {
            map.insert(key.clone(), Value::Array(items));
        }
    }
}

/// Before-save gate requiring every file in a pending list to carry a type.
/// Raised as a caller-level field error, not a server validation.
pub struct RequireFileTypes {
    pub list_key: String,
    pub type_field: String,
    pub error_state_key: String,
    pub message: String,
}

impl RequireFileTypes {
    /// The candidate-resume variant used by create/edit candidate forms.
    pub fn resumes() -> Self {
        RequireFileTypes {
            list_key: "allResume".to_string(),
            type_field: "ftype".to_string(),
            error_state_key: "resumeError".to_string(),
            message: "Resume files must have a type".to_string(),
        }
    }
}

#[async_trait]
impl SaveGate for RequireFileTypes {
    async fn check(&self, form: Value) -> Result<Value, GateVeto> {
        let untyped = form
            .get(self.list_key.as_str())
            .and_then(Value::as_array)
            .map(|files| {
                files.iter().any(|file| {
                    file.get(self.type_field.as_str())
                        .and_then(Value::as_str)
                        .map(str::is_empty)
                        .unwrap_or(true)
                })
            })
            .unwrap_or(false);
        if untyped {
            return Err(GateVeto::field(&self.error_state_key, &self.message));
        }
        Ok(form)
    }
}
