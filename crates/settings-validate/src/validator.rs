use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use settings_model::ValidationOutcome;

use crate::context::ValidationContext;

type ValidatorFn = dyn Fn(&Value, &ValidationContext<'_>) -> ValidationOutcome + Send + Sync;
type PredicateFn = dyn Fn(&ValidationContext<'_>) -> bool + Send + Sync;

/// Pure rule attached to one field path.
///
/// Cloning is cheap; the closure is shared. Validators must not rely on
/// anything besides the value and the context they receive.
#[derive(Clone)]
pub struct Validator {
    check: Arc<ValidatorFn>,
}

impl Validator {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&Value, &ValidationContext<'_>) -> ValidationOutcome + Send + Sync + 'static,
    {
        Validator {
            check: Arc::new(check),
        }
    }

    pub fn validate(&self, value: &Value, context: &ValidationContext<'_>) -> ValidationOutcome {
        (self.check)(value, context)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

/// Context-only condition used by [`crate::conditional`].
#[derive(Clone)]
pub struct Predicate {
    test: Arc<PredicateFn>,
}

impl Predicate {
    pub fn new<F>(test: F) -> Self
    where
        F: Fn(&ValidationContext<'_>) -> bool + Send + Sync + 'static,
    {
        Predicate {
            test: Arc::new(test),
        }
    }

    /// Holds when the value at `dotted` equals `expected`.
    pub fn path_equals(dotted: impl Into<String>, expected: Value) -> Self {
        let dotted = dotted.into();
        Predicate::new(move |context| context.lookup(&dotted) == Some(&expected))
    }

    /// Holds when a field in the same record equals `expected`.
    pub fn sibling_equals(name: impl Into<String>, expected: Value) -> Self {
        let name = name.into();
        Predicate::new(move |context| context.sibling(&name) == Some(&expected))
    }

    pub fn holds(&self, context: &ValidationContext<'_>) -> bool {
        (self.test)(context)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}
