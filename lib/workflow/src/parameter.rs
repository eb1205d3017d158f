//! Parameter resolution.
//!
//! A parameter is addressed by a dotted path into the node's parameter tree
//! (`options.headers.0.name`). Numeric segments index lists, other segments
//! look up object keys. A path that runs off the tree resolves to the
//! caller's fallback.

use crate::config::FailurePlaceholder;
use crate::error::ParameterError;
use crate::expression::{ExpressionContext, ExpressionEvaluator};
use rootcause::Report;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

/// Looks up `path` in `tree`.
///
/// The empty path addresses the whole tree. Returns `None` on any miss:
/// absent key, index out of bounds, or a segment that does not fit the
/// value it is applied to.
#[must_use]
pub fn resolve_path<'a>(tree: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    if path.is_empty() {
        return Some(tree);
    }
    path.split('.').try_fold(tree, |current, segment| {
        match segment.parse::<usize>() {
            Ok(index) => current.as_array()?.get(index),
            Err(_) => current.as_object()?.get(segment),
        }
    })
}

/// Options for a single parameter lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParameterOptions {
    /// Return the configured value without evaluating expressions.
    pub raw_expressions: bool,
}

impl ParameterOptions {
    /// Options that skip expression evaluation.
    #[must_use]
    pub fn raw() -> Self {
        Self {
            raw_expressions: true,
        }
    }
}

/// Resolves parameters of one node through an expression evaluator.
#[derive(Clone, Copy)]
pub struct ParameterResolver<'a> {
    evaluator: &'a dyn ExpressionEvaluator,
    continue_on_fail: bool,
    placeholder: FailurePlaceholder,
}

impl<'a> ParameterResolver<'a> {
    #[must_use]
    pub fn new(evaluator: &'a dyn ExpressionEvaluator) -> Self {
        Self {
            evaluator,
            continue_on_fail: false,
            placeholder: FailurePlaceholder::default(),
        }
    }

    /// Substitute `placeholder` for failed evaluations instead of
    /// returning an error.
    #[must_use]
    pub fn continue_on_fail(
        mut self,
        continue_on_fail: bool,
        placeholder: FailurePlaceholder,
    ) -> Self {
        self.continue_on_fail = continue_on_fail;
        self.placeholder = placeholder;
        self
    }

    /// Resolves `path` in `tree` and evaluates the value for the context's
    /// item.
    ///
    /// # Errors
    ///
    /// Returns an error if evaluation fails and the node does not continue
    /// on failure.
    pub fn get_parameter(
        &self,
        tree: &JsonValue,
        path: &str,
        context: &ExpressionContext<'_>,
        fallback: JsonValue,
        options: ParameterOptions,
    ) -> Result<JsonValue, Report<ParameterError>> {
        let item_index = context.item_index();
        let Some(value) = resolve_path(tree, path) else {
            debug!(parameter = path, item_index, "parameter not set, using fallback");
            return Ok(fallback);
        };

        if options.raw_expressions {
            return Ok(value.clone());
        }

        match self.evaluator.evaluate(value, context, item_index) {
            Ok(resolved) => Ok(resolved),
            Err(report) if self.continue_on_fail => {
                warn!(
                    parameter = path,
                    item_index,
                    error = %report,
                    "parameter evaluation failed, substituting placeholder"
                );
                Ok(self.placeholder.value(&fallback))
            }
            Err(report) => Err(ParameterError::ExpressionEvaluation {
                parameter: path.to_string(),
                item_index,
                reason: report.current_context().to_string(),
            }
            .into()),
        }
    }
}

impl std::fmt::Debug for ParameterResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterResolver")
            .field("continue_on_fail", &self.continue_on_fail)
            .field("placeholder", &self.placeholder)
            .finish_non_exhaustive()
    }
}
