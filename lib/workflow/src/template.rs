//! Template expression evaluator backed by minijinja.
//!
//! A string parameter starting with `=` is an expression; the rest of the
//! string is a minijinja template rendered against the expression context:
//!
//! ```text
//! "=https://api.example.com/users/{{ json.id }}"
//! "={{ nodes.Fetch.json.total * 2 }}"
//! ```
//!
//! A template that is exactly one `{{ ... }}` block keeps the type of the
//! expression (numbers stay numbers). Anything else renders to a string.
//! Arrays and objects are evaluated element by element.
//!
//! `nodes` is resolved on lookup: only the nodes a template names are
//! viewed and validated.

use crate::error::EvaluationError;
use crate::expression::{ExpressionContext, ExpressionEvaluator, NodeView};
use crate::run_data::RecordedOutputs;
use minijinja::value::{Enumerator, Object};
use minijinja::{Environment, ErrorKind, Value};
use rootcause::Report;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

const EXPRESSION_PREFIX: char = '=';

/// Expression evaluator rendering `=`-prefixed strings as minijinja templates.
#[derive(Debug)]
pub struct TemplateEvaluator {
    env: Environment<'static>,
}

impl TemplateEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    fn render_value(
        &self,
        value: &JsonValue,
        ctx: &Value,
    ) -> Result<JsonValue, Report<EvaluationError>> {
        match value {
            JsonValue::String(s) => match s.strip_prefix(EXPRESSION_PREFIX) {
                Some(template) => self.render(template, ctx),
                None => Ok(value.clone()),
            },
            JsonValue::Array(values) => values
                .iter()
                .map(|v| self.render_value(v, ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            JsonValue::Object(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.render_value(v, ctx)?)))
                .collect::<Result<serde_json::Map<_, _>, Report<EvaluationError>>>()
                .map(JsonValue::Object),
            _ => Ok(value.clone()),
        }
    }

    fn render(&self, template: &str, ctx: &Value) -> Result<JsonValue, Report<EvaluationError>> {
        if let Some(expr) = single_expression(template) {
            let compiled = self.env.compile_expression(expr).map_err(evaluation_error)?;
            let result = compiled.eval(ctx.clone()).map_err(evaluation_error)?;
            return serde_json::to_value(&result)
                .map_err(|e| EvaluationError::runtime(e.to_string()).into());
        }

        self.env
            .render_str(template, ctx.clone())
            .map(JsonValue::String)
            .map_err(evaluation_error)
    }
}

impl Default for TemplateEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionEvaluator for TemplateEvaluator {
    fn evaluate(
        &self,
        value: &JsonValue,
        context: &ExpressionContext<'_>,
        _item_index: usize,
    ) -> Result<JsonValue, Report<EvaluationError>> {
        if !contains_expression(value) {
            return Ok(value.clone());
        }
        let ctx = Value::from_object(Scope::new(context));
        self.render_value(value, &ctx)
    }
}

/// Top-level template variables.
#[derive(Debug)]
struct Scope {
    fields: BTreeMap<String, Value>,
    nodes: Value,
}

impl Scope {
    fn new(context: &ExpressionContext<'_>) -> Self {
        Self {
            fields: context
                .fields()
                .into_iter()
                .map(|(key, value)| (key, Value::from_serialize(value)))
                .collect(),
            nodes: Value::from_object(RecordedNodes(context.recorded_outputs())),
        }
    }
}

impl Object for Scope {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        match key.as_str()? {
            "nodes" => Some(self.nodes.clone()),
            name => self.fields.get(name).cloned(),
        }
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        let mut keys: Vec<Value> = self.fields.keys().map(|k| Value::from(k.as_str())).collect();
        keys.push(Value::from("nodes"));
        Enumerator::Values(keys)
    }
}

/// First-output views of recorded nodes, built when a template names one.
#[derive(Debug)]
struct RecordedNodes(Arc<RecordedOutputs>);

impl Object for RecordedNodes {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let name = key.as_str()?;
        let view = NodeView::new(name, Some(self.0.get(name)?), 0);
        Some(Value::from_serialize(view.to_value()))
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Values(self.0.keys().map(|k| Value::from(k.as_str())).collect())
    }
}

fn contains_expression(value: &JsonValue) -> bool {
    match value {
        JsonValue::String(s) => s.starts_with(EXPRESSION_PREFIX),
        JsonValue::Array(values) => values.iter().any(contains_expression),
        JsonValue::Object(map) => map.values().any(contains_expression),
        _ => false,
    }
}

/// Returns the inner expression if the template is a single `{{ ... }}`.
fn single_expression(template: &str) -> Option<&str> {
    let inner = template.trim().strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}

fn evaluation_error(err: minijinja::Error) -> Report<EvaluationError> {
    let message = err.to_string();
    match err.kind() {
        ErrorKind::SyntaxError => EvaluationError::Syntax { message }.into(),
        _ => EvaluationError::Runtime { message }.into(),
    }
}
