//! Root-scoped partial validation.
//!
//! On blur the engine validates only the subtree under the field's top-level
//! key. Whatever the remote answers, error entries under other roots must
//! not move; that is what keeps blur-validation cheap and field-local.

use serde_json::{json, Value};

/// Payload for validating one root subtree: `{root: <subtree>}`.
pub(crate) fn params_for_root(form: &Value, root: &str) -> Value {
    json!({ root: form.get(root).cloned().unwrap_or(Value::Null) })
}

/// The remote accepted the subtree: clear exactly the keys that were sent.
pub(crate) fn apply_success(errors: &mut Value, root: &str) {
    if let Value::Object(map) = errors {
        map.remove(root);
    }
}

/// The remote rejected the subtree: merge back only the failed keys among
/// those sent. A 400 that does not mention the sent root clears it.
pub(crate) fn apply_failure(errors: &mut Value, root: &str, body: &Value) {
    if !errors.is_object() {
        *errors = json!({});
    }
    if let Value::Object(map) = errors {
        match body.get(root) {
            Some(failed) => {
                map.insert(root.to_string(), failed.clone());
            }
            None => {
                map.remove(root);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_wrap_the_root_subtree() {
        let form = json!({"contact": {"email": "x"}, "name": "a"});
        assert_eq!(
            params_for_root(&form, "contact"),
            json!({"contact": {"email": "x"}})
        );
        assert_eq!(params_for_root(&form, "missing"), json!({"missing": null}));
    }

    #[test]
    fn test_success_clears_only_the_sent_root() {
        let mut errors = json!({"contact": ["bad"], "name": ["required"]});
        apply_success(&mut errors, "contact");
        assert_eq!(errors, json!({"name": ["required"]}));
    }

    #[test]
    fn test_failure_replaces_only_the_sent_root() {
        let mut errors = json!({"name": ["required"]});
        apply_failure(
            &mut errors,
            "contact",
            &json!({"contact": {"email": ["invalid"]}, "name": ["ignored"]}),
        );
        assert_eq!(
            errors,
            json!({"name": ["required"], "contact": {"email": ["invalid"]}})
        );
    }

    #[test]
    fn test_failure_without_the_root_clears_it() {
        let mut errors = json!({"contact": ["stale"], "name": ["required"]});
        apply_failure(&mut errors, "contact", &json!({"other": ["nope"]}));
        assert_eq!(errors, json!({"name": ["required"]}));
    }
}
