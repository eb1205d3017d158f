//! Node runtime: what a node implementation sees while it executes.
//!
//! A [`NodeRuntime`] ties one node of one workflow to the run data recorded
//! so far. It wires the node's inputs on first use and resolves parameters
//! per item through the configured expression evaluator.

use crate::config::RuntimeConfig;
use crate::definition::Workflow;
use crate::error::{NodeError, ParameterError};
use crate::execution::ExecutionMetadata;
use crate::expression::{ExpressionContext, ExpressionEvaluator, PassthroughEvaluator};
use crate::item::{Item, OutputSet};
use crate::node::{Node, NodeDefinition};
use crate::parameter::{ParameterOptions, ParameterResolver};
use crate::run_data::ExecutionContext;
use crate::wiring::{self, InputTable};
use rootcause::prelude::*;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::{LazyLock, OnceLock};
use tracing::{debug, instrument};

static DEFAULT_CONFIG: LazyLock<RuntimeConfig> = LazyLock::new(RuntimeConfig::default);
static PASSTHROUGH: PassthroughEvaluator = PassthroughEvaluator;

/// Execution facade for one activation of one node.
pub struct NodeRuntime<'a> {
    workflow: &'a Workflow,
    node: &'a NodeDefinition,
    run_data: &'a ExecutionContext,
    execution: &'a ExecutionMetadata,
    evaluator: &'a dyn ExpressionEvaluator,
    config: &'a RuntimeConfig,
    inputs: OnceLock<InputTable>,
}

impl<'a> NodeRuntime<'a> {
    /// Creates a runtime with the default configuration and no expression
    /// language.
    #[must_use]
    pub fn new(
        workflow: &'a Workflow,
        node: &'a NodeDefinition,
        run_data: &'a ExecutionContext,
        execution: &'a ExecutionMetadata,
    ) -> Self {
        Self {
            workflow,
            node,
            run_data,
            execution,
            evaluator: &PASSTHROUGH,
            config: &DEFAULT_CONFIG,
            inputs: OnceLock::new(),
        }
    }

    /// Sets the expression evaluator.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: &'a dyn ExpressionEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Sets the runtime configuration.
    #[must_use]
    pub fn with_config(mut self, config: &'a RuntimeConfig) -> Self {
        self.config = config;
        self.inputs = OnceLock::new();
        self
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
    pub fn config(&self) -> &'a RuntimeConfig {
        self.config
    }

    /// The node's assembled input table.
    pub fn inputs(&self) -> &InputTable {
        self.inputs.get_or_init(|| {
            wiring::assemble(
                &self.workflow.connections,
                self.run_data,
                &self.node.name,
                &self.config.default_channel,
            )
        })
    }

    /// Items of one input slot; empty if the slot is not wired.
    pub fn get_input(&self, channel: &str, slot: usize) -> &[Item] {
        self.inputs().slot(channel, slot)
    }

    /// Items of the primary input: slot 0 of the default channel.
    pub fn input_items(&self) -> &[Item] {
        self.get_input(&self.config.default_channel, 0)
    }

    /// Builds the expression context for one item of the primary input.
    pub fn expression_context(&self, item_index: usize) -> ExpressionContext<'_> {
        ExpressionContext::build(
            self.node,
            self.workflow,
            self.execution,
            self.run_data,
            self.input_items(),
            item_index,
        )
    }

    /// Resolves and evaluates a parameter for one item.
    ///
    /// # Errors
    ///
    /// Returns an error if evaluation fails and the node does not continue on
    /// failure.
    pub fn get_parameter(
        &self,
        name: &str,
        item_index: usize,
        fallback: JsonValue,
    ) -> Result<JsonValue, Report<ParameterError>> {
        self.get_parameter_with(name, item_index, fallback, ParameterOptions::default())
    }

    /// [`get_parameter`](Self::get_parameter) with explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error if evaluation fails and the node does not continue on
    /// failure.
    pub fn get_parameter_with(
        &self,
        name: &str,
        item_index: usize,
        fallback: JsonValue,
        options: ParameterOptions,
    ) -> Result<JsonValue, Report<ParameterError>> {
        let context = self.expression_context(item_index).with_parameter(name);
        ParameterResolver::new(self.evaluator)
            .continue_on_fail(self.node.continue_on_fail, self.config.failure_placeholder)
            .get_parameter(&self.node.parameters, name, &context, fallback, options)
    }

    /// Resolves a parameter and deserializes it.
    ///
    /// # Errors
    ///
    /// Returns an error if resolution fails or the value does not have the
    /// expected shape.
    pub fn parameter_as<T: DeserializeOwned>(
        &self,
        name: &str,
        item_index: usize,
        fallback: JsonValue,
    ) -> Result<T, Report<NodeError>> {
        let value = self
            .get_parameter(name, item_index, fallback)
            .context(NodeError::Parameter {
                node: self.node.name.clone(),
            })?;
        serde_json::from_value(value).map_err(|e| {
            NodeError::InvalidParameter {
                node: self.node.name.clone(),
                parameter: name.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Executes `node` against this runtime.
    ///
    /// Disabled nodes pass their primary input through unchanged.
    ///
    /// # Errors
    ///
    /// Returns the node's error.
    #[instrument(skip_all, fields(node = %self.node.name, kind = node.kind()))]
    pub fn run(&self, node: &dyn Node) -> Result<OutputSet, Report<NodeError>> {
        if self.node.disabled {
            debug!("node disabled, passing input through");
            return Ok(OutputSet::single(self.input_items().to_vec()));
        }
        let output = node.execute(self)?;
        debug!(
            ports = output.port_count(),
            items = output.item_count(),
            "node produced output"
        );
        Ok(output)
    }
}

impl std::fmt::Debug for NodeRuntime<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRuntime")
            .field("node", &self.node.name)
            .field("workflow", &self.workflow.name)
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}
