//! Expression context and the evaluator contract.
//!
//! Parameter values may contain expressions in whatever language the host
//! plugs in. This module only shapes what an evaluator gets to see:
//!
//! - the current item (`json`, `binary`) and the node's primary input list
//! - node, workflow and execution metadata
//! - the clock (`now`, `today`)
//! - the parameter name and item index being resolved
//! - read-only views of other nodes' recorded outputs
//!
//! Cross-node views follow the same rules as input wiring: an unknown node
//! or port is empty, and items that fail the shape check are dropped.

use crate::definition::Workflow;
use crate::error::{CrossNodeValidationError, EvaluationError};
use crate::execution::ExecutionMetadata;
use crate::item::{Attachments, Item, OutputSet, empty_attachments};
use crate::node::NodeDefinition;
use crate::output;
use crate::run_data::{ExecutionContext, RecordedOutputs};
use chrono::{DateTime, NaiveDate, Utc};
use rootcause::Report;
use serde_json::{Value as JsonValue, json};
use std::sync::{Arc, LazyLock};
use tracing::warn;

static EMPTY_OBJECT: LazyLock<JsonValue> =
    LazyLock::new(|| JsonValue::Object(serde_json::Map::new()));

/// Pluggable expression evaluator.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluates a raw parameter value for one item.
    ///
    /// # Errors
    ///
    /// Returns an error if the value contains an expression that fails to
    /// parse or evaluate.
    fn evaluate(
        &self,
        value: &JsonValue,
        context: &ExpressionContext<'_>,
        item_index: usize,
    ) -> Result<JsonValue, Report<EvaluationError>>;
}

/// Evaluator for hosts without an expression language.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughEvaluator;

impl ExpressionEvaluator for PassthroughEvaluator {
    fn evaluate(
        &self,
        value: &JsonValue,
        _context: &ExpressionContext<'_>,
        _item_index: usize,
    ) -> Result<JsonValue, Report<EvaluationError>> {
        Ok(value.clone())
    }
}

/// Everything an evaluator may read while resolving one parameter for one
/// item.
#[derive(Debug, Clone)]
pub struct ExpressionContext<'a> {
    node: &'a NodeDefinition,
    workflow: &'a Workflow,
    execution: &'a ExecutionMetadata,
    run_data: &'a ExecutionContext,
    input: &'a [Item],
    item_index: usize,
    parameter: Option<&'a str>,
    now: DateTime<Utc>,
}

impl<'a> ExpressionContext<'a> {
    /// Builds the context for item `item_index` of `input`, the node's
    /// primary input.
    #[must_use]
    pub fn build(
        node: &'a NodeDefinition,
        workflow: &'a Workflow,
        execution: &'a ExecutionMetadata,
        run_data: &'a ExecutionContext,
        input: &'a [Item],
        item_index: usize,
    ) -> Self {
        Self {
            node,
            workflow,
            execution,
            run_data,
            input,
            item_index,
            parameter: None,
            now: Utc::now(),
        }
    }

    /// Names the parameter being resolved.
    #[must_use]
    pub fn with_parameter(mut self, parameter: &'a str) -> Self {
        self.parameter = Some(parameter);
        self
    }

    /// Pins the clock.
    #[must_use]
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// The current item, if the input has one at this index.
    #[must_use]
    pub fn item(&self) -> Option<&'a Item> {
        self.input.get(self.item_index)
    }

    /// The current item's data, or an empty object.
    #[must_use]
    pub fn json(&self) -> &'a JsonValue {
        self.item().map_or(&*EMPTY_OBJECT, |item| &item.data)
    }

    /// The current item's attachments, or an empty map.
    #[must_use]
    pub fn binary(&self) -> &'a Attachments {
        self.item().map_or(empty_attachments(), Item::attachments)
    }

    #[must_use]
    pub fn input(&self) -> &'a [Item] {
        self.input
    }

    #[must_use]
    pub fn node(&self) -> &'a NodeDefinition {
        self.node
    }

    #[must_use]
    pub fn workflow(&self) -> &'a Workflow {
        self.workflow
    }

    #[must_use]
    pub fn execution(&self) -> &'a ExecutionMetadata {
        self.execution
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    #[must_use]
    pub fn parameter(&self) -> Option<&'a str> {
        self.parameter
    }

    #[must_use]
    pub fn item_index(&self) -> usize {
        self.item_index
    }

    /// Returns a view of another node's first output.
    ///
    /// Nodes without recorded output give an empty view.
    #[must_use]
    pub fn node_reference(&self, name: &str) -> NodeView<'a> {
        NodeView::new(name, self.run_data.output(name), 0)
    }

    /// Shared handle to the outputs recorded so far.
    pub(crate) fn recorded_outputs(&self) -> Arc<RecordedOutputs> {
        self.run_data.shared()
    }

    /// Top-level fields of the rendered context, except `nodes`.
    pub(crate) fn fields(&self) -> serde_json::Map<String, JsonValue> {
        let mut fields = serde_json::Map::new();
        fields.insert("json".into(), self.json().clone());
        fields.insert("binary".into(), json!(self.binary()));
        fields.insert("input".into(), self.input.iter().map(item_value).collect());
        fields.insert(
            "node".into(),
            json!({
                "name": self.node.name,
                "kind": self.node.kind,
                "parameters": self.node.parameters,
            }),
        );
        fields.insert(
            "workflow".into(),
            json!({
                "id": self.workflow.id.to_string(),
                "name": self.workflow.name,
                "active": self.workflow.active,
            }),
        );
        fields.insert(
            "execution".into(),
            json!({
                "id": self.execution.id.to_string(),
                "mode": self.execution.mode.as_str(),
            }),
        );
        fields.insert("now".into(), json!(self.now.to_rfc3339()));
        fields.insert("today".into(), json!(self.today().to_string()));
        fields.insert("item_index".into(), json!(self.item_index));
        fields.insert("parameter".into(), json!(self.parameter));
        fields
    }

    /// Renders the context as a JSON document.
    ///
    /// `nodes` holds the first-output view of every recorded node, so this
    /// walks the whole run data. Evaluators that only need some nodes should
    /// look them up through [`node_reference`](Self::node_reference).
    #[must_use]
    pub fn to_value(&self) -> JsonValue {
        let nodes: serde_json::Map<String, JsonValue> = self
            .run_data
            .node_names()
            .map(|name| (name.to_string(), self.node_reference(name).to_value()))
            .collect();

        let mut fields = self.fields();
        fields.insert("nodes".into(), JsonValue::Object(nodes));
        JsonValue::Object(fields)
    }
}

fn item_value(item: &Item) -> JsonValue {
    json!({ "json": item.data, "binary": item.attachments() })
}

/// Read-only view of one output port of another node.
#[derive(Debug, Clone)]
pub struct NodeView<'a> {
    node: String,
    output: Option<&'a OutputSet>,
    port: usize,
    /// Well-formed items with their index in the port.
    items: Vec<(usize, &'a Item)>,
}

impl<'a> NodeView<'a> {
    pub(crate) fn new(node: &str, output: Option<&'a OutputSet>, port: usize) -> Self {
        let items = output
            .map(|produced| output::extract_port(produced, port))
            .unwrap_or_default()
            .iter()
            .enumerate()
            .filter(|(index, item)| {
                if item.is_well_formed() {
                    return true;
                }
                let err = CrossNodeValidationError::InvalidItem {
                    node: node.to_string(),
                    port,
                    index: *index,
                };
                warn!(node, port, item_index = index, "dropping item: {err}");
                false
            })
            .collect();

        Self {
            node: node.to_string(),
            output,
            port,
            items,
        }
    }

    #[must_use]
    pub fn node(&self) -> &str {
        &self.node
    }

    #[must_use]
    pub fn port(&self) -> usize {
        self.port
    }

    /// Returns true if the node has a recorded output.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.output.is_some()
    }

    /// Number of well-formed items in view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The first item's data, or an empty object.
    #[must_use]
    pub fn json(&self) -> &'a JsonValue {
        self.first().map_or(&*EMPTY_OBJECT, |item| &item.data)
    }

    /// The first item's attachments, or an empty map.
    #[must_use]
    pub fn binary(&self) -> &'a Attachments {
        self.first().map_or(empty_attachments(), Item::attachments)
    }

    #[must_use]
    pub fn first(&self) -> Option<&'a Item> {
        self.items.first().map(|(_, item)| *item)
    }

    #[must_use]
    pub fn last(&self) -> Option<&'a Item> {
        self.items.last().map(|(_, item)| *item)
    }

    pub fn all(&self) -> impl Iterator<Item = &'a Item> + '_ {
        self.items.iter().map(|(_, item)| *item)
    }

    /// The item at `index` of the port, paired by position with the
    /// current item. Dropped or missing items give `None`.
    #[must_use]
    pub fn item_matching(&self, index: usize) -> Option<&'a Item> {
        self.items
            .iter()
            .find(|(position, _)| *position == index)
            .map(|(_, item)| *item)
    }

    /// A view of another port of the same node.
    #[must_use]
    pub fn output(&self, port: usize) -> NodeView<'a> {
        NodeView::new(&self.node, self.output, port)
    }

    /// Renders the view as a JSON document.
    #[must_use]
    pub fn to_value(&self) -> JsonValue {
        json!({
            "json": self.json(),
            "binary": self.binary(),
            "first": self.first().map(item_value),
            "last": self.last().map(item_value),
            "all": self.all().map(item_value).collect::<Vec<_>>(),
        })
    }
}
