//! Duplicate-entity guard.
//!
//! Create/edit flows for natural-person-like entities probe for duplicates
//! before saving. The probe grades the match; the guard either lets the save
//! through, awaits a user decision, or blocks the save outright. It runs as
//! an ordinary before-save gate, so the engine needs no special cases.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::engine::options::{GateVeto, SaveGate};
use crate::transport::{OperationParams, OperationRequest, Transport};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "grade")]
pub enum DuplicateOutcome {
    /// No duplicate; the save proceeds untouched.
    None,
    /// An identical record already exists; the save is always blocked and
    /// the existing record is offered for restore.
    Absolute { existing: Value },
    /// Similar records among the organization's own entries.
    PossibleOwn { matches: Vec<Value> },
    /// Similar records submitted by another organization.
    PossibleForeign { matches: Vec<Value> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicateDecision {
    SaveAnyway,
    NotADuplicate,
    Cancel,
}

/// What the confirmation dialog shows: the probe outcome plus the decision
/// set derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicatePrompt {
    pub outcome: DuplicateOutcome,
    pub choices: Vec<DuplicateDecision>,
    pub offers_restore: bool,
}

/// The awaited user dialog. Suspends the submit pipeline on a user decision
/// with no timeout.
#[async_trait]
pub trait DuplicatePrompter: Send + Sync {
    async fn resolve(&self, prompt: &DuplicatePrompt) -> DuplicateDecision;
}

pub struct DuplicateGuard {
    transport: Arc<dyn Transport>,
    prompter: Arc<dyn DuplicatePrompter>,
    probe_operation: String,
    identity_fields: Vec<String>,
}

impl DuplicateGuard {
    pub fn new(
        transport: Arc<dyn Transport>,
        prompter: Arc<dyn DuplicatePrompter>,
        probe_operation: impl Into<String>,
        identity_fields: Vec<String>,
    ) -> Self {
        DuplicateGuard {
            transport,
            prompter,
            probe_operation: probe_operation.into(),
            identity_fields,
        }
    }

    fn probe_params(&self, form: &Value) -> Value {
        let mut params = Map::new();
        for field in &self.identity_fields {
            if let Some(value) = form.get(field.as_str()) {
                if !value.is_null() {
                    params.insert(field.clone(), value.clone());
                }
            }
        }
        Value::Object(params)
    }
}

fn parse_outcome(obj: &Value) -> DuplicateOutcome {
    let matches: Vec<Value> = obj
        .get("matches")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    match obj.get("grade").and_then(Value::as_str) {
        Some("absolute") => DuplicateOutcome::Absolute {
            existing: matches.first().cloned().unwrap_or(Value::Null),
        },
        Some("own") if !matches.is_empty() => DuplicateOutcome::PossibleOwn { matches },
        Some("foreign") if !matches.is_empty() => DuplicateOutcome::PossibleForeign { matches },
        _ => DuplicateOutcome::None,
    }
}

fn prompt_for(outcome: DuplicateOutcome) -> DuplicatePrompt {
    let offers_restore = matches!(outcome, DuplicateOutcome::Absolute { .. });
    DuplicatePrompt {
        outcome,
        choices: vec![
            DuplicateDecision::NotADuplicate,
            DuplicateDecision::SaveAnyway,
            DuplicateDecision::Cancel,
        ],
        offers_restore,
    }
}

#[async_trait]
impl SaveGate for DuplicateGuard {
    async fn check(&self, form: Value) -> Result<Value, GateVeto> {
        let data = self.probe_params(&form);
        let request = OperationRequest::new(
            self.probe_operation.clone(),
            OperationParams::data(data),
        );
        let outcome = match self.transport.execute(request).await {
            Ok(response) => parse_outcome(&response.obj),
            Err(error) => {
                // A broken probe must not lock users out of saving.
                warn!("duplication probe failed: {error}");
                DuplicateOutcome::None
            }
        };

        match outcome {
            DuplicateOutcome::None => Ok(form),
            DuplicateOutcome::Absolute { .. } => {
                // The dialog is shown, but no decision can cause the save to
                // run; the existing record must be restored instead.
                let prompt = prompt_for(outcome);
                let decision = self.prompter.resolve(&prompt).await;
                debug!(?decision, "absolute duplicate, save blocked");
                Err(GateVeto::message(
                    "An identical record already exists. Restore it from the archive instead.",
                ))
            }
            DuplicateOutcome::PossibleOwn { .. } | DuplicateOutcome::PossibleForeign { .. } => {
                let prompt = prompt_for(outcome);
                match self.prompter.resolve(&prompt).await {
                    DuplicateDecision::SaveAnyway => Ok(form),
                    DuplicateDecision::NotADuplicate => {
                        // Only the back-reference moves; no other field is
                        // touched.
                        let mut form = form;
                        if let Some(map) = form.as_object_mut() {
                            map.insert("original".to_string(), Value::Null);
                        }
                        Ok(form)
                    }
                    DuplicateDecision::Cancel => Err(GateVeto::silent()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{OperationResponse, TransportError};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct ProbeTransport {
        response: Result<Value, ()>,
        calls: Mutex<Vec<OperationRequest>>,
    }

    impl ProbeTransport {
        fn new(response: Result<Value, ()>) -> Arc<Self> {
            Arc::new(ProbeTransport {
                response,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for ProbeTransport {
        async fn execute(
            &self,
            request: OperationRequest,
        ) -> Result<OperationResponse, TransportError> {
            self.calls.lock().unwrap().push(request);
            match &self.response {
                Ok(obj) => Ok(OperationResponse {
                    obj: obj.clone(),
                    headers: HashMap::new(),
                }),
                Err(()) => Err(TransportError::Status {
                    status: 500,
                    body: Value::Null,
                }),
            }
        }
    }

    struct FixedPrompter {
        decision: DuplicateDecision,
        prompts: Mutex<Vec<DuplicatePrompt>>,
    }

    impl FixedPrompter {
        fn new(decision: DuplicateDecision) -> Arc<Self> {
            Arc::new(FixedPrompter {
                decision,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl DuplicatePrompter for FixedPrompter {
        async fn resolve(&self, prompt: &DuplicatePrompt) -> DuplicateDecision {
            self.prompts.lock().unwrap().push(prompt.clone());
            self.decision
        }
    }

    fn guard(
        response: Result<Value, ()>,
        decision: DuplicateDecision,
    ) -> (DuplicateGuard, Arc<ProbeTransport>, Arc<FixedPrompter>) {
        let transport = ProbeTransport::new(response);
        let prompter = FixedPrompter::new(decision);
        let guard = DuplicateGuard::new(
            transport.clone(),
            prompter.clone(),
            "candidateDuplicates",
            vec!["firstName".to_string(), "lastName".to_string(), "email".to_string()],
        );
        (guard, transport, prompter)
    }

    fn candidate() -> Value {
        json!({"firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.test", "phone": null})
    }

    #[tokio::test]
    async fn test_no_match_proceeds_without_prompt() {
        let (guard, transport, prompter) =
            guard(Ok(json!({"grade": null, "matches": []})), DuplicateDecision::Cancel);

        let result = guard.check(candidate()).await;

        assert_eq!(result.unwrap(), candidate());
        assert!(prompter.prompts.lock().unwrap().is_empty());
        let calls = transport.calls.lock().unwrap();
        assert_eq!(
            calls[0].parameters.data,
            json!({"firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.test"})
        );
    }

    #[tokio::test]
    async fn test_absolute_match_blocks_even_on_save_anyway() {
        let (guard, _, prompter) = guard(
            Ok(json!({"grade": "absolute", "matches": [{"id": 3}]})),
            DuplicateDecision::SaveAnyway,
        );

        let veto = guard.check(candidate()).await.unwrap_err();

        assert!(veto.message.unwrap().contains("archive"));
        let prompts = prompter.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].offers_restore);
        assert_eq!(
            prompts[0].choices,
            vec![
                DuplicateDecision::NotADuplicate,
                DuplicateDecision::SaveAnyway,
                DuplicateDecision::Cancel
            ]
        );
    }

    #[tokio::test]
    async fn test_possible_match_save_anyway_proceeds_untouched() {
        let (guard, _, _) = guard(
            Ok(json!({"grade": "own", "matches": [{"id": 8}]})),
            DuplicateDecision::SaveAnyway,
        );

        assert_eq!(guard.check(candidate()).await.unwrap(), candidate());
    }

    #[tokio::test]
    async fn test_not_a_duplicate_patches_only_the_back_reference() {
        let (guard, _, _) = guard(
            Ok(json!({"grade": "foreign", "matches": [{"id": 8}]})),
            DuplicateDecision::NotADuplicate,
        );

        let mut expected = candidate();
        expected
            .as_object_mut()
            .unwrap()
            .insert("original".to_string(), Value::Null);

        assert_eq!(guard.check(candidate()).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_cancel_vetoes_silently() {
        let (guard, _, _) = guard(
            Ok(json!({"grade": "own", "matches": [{"id": 8}]})),
            DuplicateDecision::Cancel,
        );

        let veto = guard.check(candidate()).await.unwrap_err();
        assert!(veto.message.is_none());
        assert!(veto.error_state_key.is_none());
    }

    #[tokio::test]
    async fn test_probe_failure_does_not_block_saving() {
        let (guard, _, prompter) = guard(Err(()), DuplicateDecision::Cancel);

        assert_eq!(guard.check(candidate()).await.unwrap(), candidate());
        assert!(prompter.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_parse_outcome_grades() {
        assert_eq!(parse_outcome(&json!({})), DuplicateOutcome::None);
        assert_eq!(
            parse_outcome(&json!({"grade": "own", "matches": []})),
            DuplicateOutcome::None
        );
        assert_eq!(
            parse_outcome(&json!({"grade": "absolute", "matches": [{"id": 1}]})),
            DuplicateOutcome::Absolute {
                existing: json!({"id": 1})
            }
        );
        assert_eq!(
            parse_outcome(&json!({"grade": "foreign", "matches": [{"id": 2}]})),
            DuplicateOutcome::PossibleForeign {
                matches: vec![json!({"id": 2})]
            }
        );
    }
}
