//! Navigation guarding.
//!
//! The routing layer asks one question before leaving a form: do the
//! current and last-confirmed snapshots still match? Structural comparison
//! only; the guard never inspects field semantics.

use serde_json::Value;

pub struct NavigationGuard;

impl NavigationGuard {
    /// True while the live form diverges from the last server-confirmed
    /// snapshot, which is when in-app navigation and unload warnings block.
    pub fn should_block(initial_form: &Value, form: &Value) -> bool {
        initial_form != form
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_forms_do_not_block() {
        let initial = json!({"name": "Ada", "tags": [1, 2]});
        assert!(!NavigationGuard::should_block(&initial, &initial.clone()));
    }

    #[test]
    fn test_any_divergence_blocks() {
        let initial = json!({"name": "Ada"});
        let edited = json!({"name": "Ada Lovelace"});
        assert!(NavigationGuard::should_block(&initial, &edited));
    }

    #[test]
    fn test_comparison_is_structural_not_positional() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert!(!NavigationGuard::should_block(&a, &b));
    }
}
