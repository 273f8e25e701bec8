//! Generic entity-form engine for the recruiting admin client.
//!
//! One controller drives every CRUD form (candidates, jobs, interviews,
//! company settings) through a single lifecycle: read, nested-path editing,
//! partial validation on blur, two-phase save with deferred file uploads,
//! server error taxonomy mapping, and dirty-state tracking for navigation
//! guards. The view layer, routing, and the reactive store stay outside;
//! they consume the narrow contracts re-exported below.

pub mod config;
pub mod dedup;
pub mod engine;
pub mod errors;
pub mod guard;
pub mod inputs;
pub mod notify;
pub mod path;
pub mod transport;
pub mod uploads;

pub use config::TransportConfig;
pub use dedup::{
    DuplicateDecision, DuplicateGuard, DuplicateOutcome, DuplicatePrompt, DuplicatePrompter,
};
pub use engine::options::{
    FormOptions, GateVeto, PostSaveHook, PostSaveReport, ResetAfterSave, SaveGate,
};
pub use engine::state::FormState;
pub use engine::{FormController, SubmitOutcome};
pub use errors::FormError;
pub use inputs::{ChangeEvent, InputKind, InputRegistry, InputSpec};
pub use notify::{Notifier, RecordingNotifier, ToastId, TracingNotifier};
pub use path::{FieldPath, PathError, Segment};
pub use transport::{
    FilePayload, HttpTransport, OperationParams, OperationRequest, OperationResponse, Transport,
    TransportError,
};
pub use uploads::{FileDescriptor, FileUploader, RequireFileTypes};
