//! Built-in control-flow node kinds.
//!
//! Parameters are resolved per item, so operands such as
//! `"leftValue": "={{ json.total }}"` see the item being routed.

use crate::condition::{Combinator, Condition, ConditionGroup};
use crate::error::NodeError;
use crate::item::OutputSet;
use crate::node::Node;
use crate::parameter::ParameterOptions;
use crate::routing::{self, SwitchOptions};
use crate::runtime::NodeRuntime;
use rootcause::prelude::*;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::warn;

/// Resolves a list of conditions for one item.
///
/// A literal list is resolved one operand at a time, so under
/// continue-on-fail a failing operand becomes the placeholder and its
/// siblings still evaluate. A list produced by a single expression is
/// evaluated whole, and a placeholder in its place reads as no conditions.
fn resolve_conditions(
    runtime: &NodeRuntime<'_>,
    name: &str,
    item_index: usize,
) -> Result<Vec<Condition>, Report<NodeError>> {
    let declared = runtime
        .get_parameter_with(name, item_index, json!([]), ParameterOptions::raw())
        .context(NodeError::Parameter {
            node: runtime.node().name.clone(),
        })?;
    let Some(entries) = declared.as_array() else {
        let conditions: Option<Vec<Condition>> =
            runtime.parameter_as(name, item_index, json!([]))?;
        return Ok(conditions.unwrap_or_default());
    };

    (0..entries.len())
        .map(|index| -> Result<Condition, Report<NodeError>> {
            let operand = |field: &str| format!("{name}.{index}.{field}");
            Ok(Condition::new(
                runtime.parameter_as(&operand("leftValue"), item_index, JsonValue::Null)?,
                runtime.parameter_as(&operand("operation"), item_index, JsonValue::Null)?,
                runtime.parameter_as(&operand("rightValue"), item_index, JsonValue::Null)?,
            ))
        })
        .collect()
}

/// Resolves the `combinator` and `conditions` parameters for one item.
fn condition_group(
    runtime: &NodeRuntime<'_>,
    item_index: usize,
) -> Result<ConditionGroup, Report<NodeError>> {
    let combinator: Combinator = runtime.parameter_as("combinator", item_index, json!("all"))?;
    let conditions = resolve_conditions(runtime, "conditions", item_index)?;
    Ok(ConditionGroup::new(combinator, conditions))
}

/// Two-way branch: port 0 for items whose conditions hold, port 1 for the
/// rest. Without conditions every item takes port 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct IfNode;

impl Node for IfNode {
    fn kind(&self) -> &str {
        "if"
    }

    fn execute(&self, runtime: &NodeRuntime<'_>) -> Result<OutputSet, Report<NodeError>> {
        routing::binary_split(runtime.input_items(), |index, _| {
            Ok(condition_group(runtime, index)?.holds())
        })
    }
}

/// N-way branch with one port per rule and an optional fallback port.
///
/// The port count is the length of a literal `rules` list. When `rules` is
/// an expression, it is the length of the list it yields for item 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchNode;

impl Node for SwitchNode {
    fn kind(&self) -> &str {
        "switch"
    }

    fn execute(&self, runtime: &NodeRuntime<'_>) -> Result<OutputSet, Report<NodeError>> {
        let rule_count = resolve_conditions(runtime, "rules", 0)?.len();
        let options: SwitchOptions = runtime.parameter_as("options", 0, json!({}))?;

        let mut resolved: Option<(usize, Vec<Condition>)> = None;
        routing::switch_split(
            runtime.input_items(),
            rule_count,
            options,
            |item_index, rule, _| {
                if resolved.as_ref().is_none_or(|(index, _)| *index != item_index) {
                    let rules = resolve_conditions(runtime, "rules", item_index)?;
                    resolved = Some((item_index, rules));
                }
                Ok(resolved
                    .as_ref()
                    .and_then(|(_, rules)| rules.get(rule))
                    .is_some_and(Condition::matches))
            },
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LoopMode {
    #[default]
    Count,
    Condition,
}

/// Loop unroll: iteration items on port 0, one completion item per input
/// item on port 1.
///
/// Iterations per item never exceed the configured ceiling.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopNode;

impl Node for LoopNode {
    fn kind(&self) -> &str {
        "loop"
    }

    fn execute(&self, runtime: &NodeRuntime<'_>) -> Result<OutputSet, Report<NodeError>> {
        let config = runtime.config();
        let ceiling = config.loop_iteration_ceiling;
        let items = runtime.input_items();
        let mode: LoopMode = runtime.parameter_as("mode", 0, json!("count"))?;

        match mode {
            LoopMode::Count => routing::loop_count(items, &config.iteration_field, |index, _| {
                let count: u32 = runtime.parameter_as("count", index, json!(1))?;
                if count > ceiling {
                    warn!(
                        node = %runtime.node().name,
                        item_index = index,
                        count,
                        ceiling,
                        "loop count exceeds iteration ceiling, clamping"
                    );
                }
                Ok(count.min(ceiling))
            }),
            LoopMode::Condition => {
                let requested: u32 =
                    runtime.parameter_as("maxIterations", 0, json!(ceiling))?;
                routing::loop_while(
                    items,
                    &config.iteration_field,
                    requested.min(ceiling),
                    |_, index, _| Ok(condition_group(runtime, index)?.holds()),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::connection::{Connection, ConnectionGraph};
    use crate::definition::Workflow;
    use crate::execution::ExecutionMetadata;
    use crate::item::{Item, PortOutput};
    use crate::node::NodeDefinition;
    use crate::run_data::ExecutionContext;
    use crate::template::TemplateEvaluator;
    use serde_json::Value as JsonValue;

    struct Harness {
        workflow: Workflow,
        run_data: ExecutionContext,
        execution: ExecutionMetadata,
        evaluator: TemplateEvaluator,
        config: RuntimeConfig,
    }

    impl Harness {
        fn new(kind: &str, parameters: JsonValue, input: Vec<JsonValue>) -> Self {
            let mut connections = ConnectionGraph::new();
            connections.connect(Connection::new("Source", 0, "Control", 0));
            let workflow = Workflow::new("Control flow")
                .with_node(NodeDefinition::new("Source", "manual"))
                .with_node(NodeDefinition::new("Control", kind).with_parameters(parameters))
                .with_connections(connections);

            let mut run_data = ExecutionContext::new();
            run_data
                .record(
                    "Source",
                    OutputSet::single(input.into_iter().map(Item::new).collect()),
                )
                .expect("record");

            Self {
                workflow,
                run_data,
                execution: ExecutionMetadata::default(),
                evaluator: TemplateEvaluator::new(),
                config: RuntimeConfig::default(),
            }
        }

        fn continue_on_fail(&mut self) {
            for node in &mut self.workflow.nodes {
                node.continue_on_fail = true;
            }
        }

        fn run(&self, node: &dyn Node) -> Result<OutputSet, Report<NodeError>> {
            let definition = self.workflow.node("Control").expect("node");
            NodeRuntime::new(&self.workflow, definition, &self.run_data, &self.execution)
                .with_evaluator(&self.evaluator)
                .with_config(&self.config)
                .run(node)
        }
    }

    fn port(output: &OutputSet, index: usize) -> Vec<JsonValue> {
        output
            .port(index)
            .and_then(PortOutput::as_items)
            .unwrap_or_default()
            .iter()
            .map(|item| item.data.clone())
            .collect()
    }

    #[test]
    fn if_routes_by_conditions() {
        let harness = Harness::new(
            "if",
            json!({
                "conditions": [
                    { "leftValue": "={{ json.total }}", "operation": "larger", "rightValue": 100 }
                ]
            }),
            vec![json!({ "total": 150 }), json!({ "total": 20 })],
        );
        let output = harness.run(&IfNode).expect("run");
        assert_eq!(port(&output, 0), vec![json!({ "total": 150 })]);
        assert_eq!(port(&output, 1), vec![json!({ "total": 20 })]);
    }

    #[test]
    fn if_without_conditions_sends_everything_to_false() {
        let harness = Harness::new("if", json!({}), vec![json!({ "a": 1 }), json!({ "a": 2 })]);
        let output = harness.run(&IfNode).expect("run");
        assert!(port(&output, 0).is_empty());
        assert_eq!(port(&output, 1).len(), 2);
    }

    #[test]
    fn if_any_combinator() {
        let harness = Harness::new(
            "if",
            json!({
                "combinator": "any",
                "conditions": [
                    { "leftValue": "={{ json.tag }}", "operation": "equal", "rightValue": "x" },
                    { "leftValue": "={{ json.tag }}", "operation": "equal", "rightValue": "y" }
                ]
            }),
            vec![json!({ "tag": "y" }), json!({ "tag": "z" })],
        );
        let output = harness.run(&IfNode).expect("run");
        assert_eq!(port(&output, 0), vec![json!({ "tag": "y" })]);
    }

    #[test]
    fn switch_first_match_with_fallback() {
        let harness = Harness::new(
            "switch",
            json!({
                "rules": [
                    { "leftValue": "={{ json.kind }}", "operation": "equal", "rightValue": "a" },
                    { "leftValue": "={{ json.kind }}", "operation": "equal", "rightValue": "b" },
                    { "leftValue": "={{ json.kind }}", "operation": "equal", "rightValue": "c" }
                ],
                "options": { "fallbackOutput": true }
            }),
            vec![json!({ "kind": "b" }), json!({ "kind": "q" })],
        );
        let output = harness.run(&SwitchNode).expect("run");
        assert_eq!(output.port_count(), 4);
        assert!(port(&output, 0).is_empty());
        assert_eq!(port(&output, 1), vec![json!({ "kind": "b" })]);
        assert!(port(&output, 2).is_empty());
        assert_eq!(port(&output, 3), vec![json!({ "kind": "q" })]);
    }

    #[test]
    fn switch_without_rules_routes_nothing() {
        let harness = Harness::new("switch", json!({}), vec![json!({ "a": 1 })]);
        let output = harness.run(&SwitchNode).expect("run");
        assert_eq!(output.port_count(), 0);
        assert_eq!(output.item_count(), 0);
    }

    #[test]
    fn loop_count_mode() {
        let harness = Harness::new(
            "loop",
            json!({ "mode": "count", "count": "={{ json.times }}" }),
            vec![json!({ "times": 2 })],
        );
        let output = harness.run(&LoopNode).expect("run");
        assert_eq!(
            port(&output, 0),
            vec![
                json!({ "times": 2, "iteration": 0 }),
                json!({ "times": 2, "iteration": 1 })
            ]
        );
        assert_eq!(
            port(&output, 1),
            vec![json!({ "iterations": 2, "data": { "times": 2 } })]
        );
    }

    #[test]
    fn loop_condition_mode_is_clamped_to_ceiling() {
        let mut harness = Harness::new(
            "loop",
            json!({
                "mode": "condition",
                "maxIterations": 50,
                "conditions": [{ "leftValue": true, "operation": "isTrue" }]
            }),
            vec![json!({ "a": 1 })],
        );
        harness.config.loop_iteration_ceiling = 5;
        let output = harness.run(&LoopNode).expect("run");
        assert_eq!(port(&output, 0).len(), 5);
        assert_eq!(port(&output, 1).len(), 1);
    }

    #[test]
    fn invalid_condition_shape_fails_the_node() {
        let harness = Harness::new(
            "if",
            json!({ "conditions": [{ "operation": "sortOf" }] }),
            vec![json!({})],
        );
        let err = harness.run(&IfNode).expect_err("invalid operation");
        assert!(matches!(
            err.current_context(),
            NodeError::InvalidParameter { parameter, .. } if parameter == "conditions.0.operation"
        ));
    }

    fn broken_operand(combinator: &str) -> Harness {
        let mut harness = Harness::new(
            "if",
            json!({
                "combinator": combinator,
                "conditions": [
                    { "leftValue": "={{ json.total ", "operation": "larger", "rightValue": 100 },
                    { "leftValue": "={{ json.total }}", "operation": "larger", "rightValue": 1 }
                ]
            }),
            vec![json!({ "total": 150 })],
        );
        harness.continue_on_fail();
        harness
    }

    #[test]
    fn failing_operand_becomes_placeholder_under_continue_on_fail() {
        // The broken operand reads as null, so only the first condition fails.
        let output = broken_operand("all").run(&IfNode).expect("continue on fail");
        assert!(port(&output, 0).is_empty());
        assert_eq!(port(&output, 1), vec![json!({ "total": 150 })]);

        let output = broken_operand("any").run(&IfNode).expect("continue on fail");
        assert_eq!(port(&output, 0), vec![json!({ "total": 150 })]);
    }

    #[test]
    fn failing_operand_fails_the_node_by_default() {
        let harness = Harness::new(
            "if",
            json!({
                "conditions": [
                    { "leftValue": "={{ json.total ", "operation": "larger", "rightValue": 100 }
                ]
            }),
            vec![json!({ "total": 150 })],
        );
        let err = harness.run(&IfNode).expect_err("evaluation failure");
        assert!(matches!(err.current_context(), NodeError::Parameter { .. }));
    }

    #[test]
    fn switch_counts_rules_from_an_expression() {
        let harness = Harness::new(
            "switch",
            json!({
                "rules": "={{ [\
                    {'leftValue': json.kind, 'operation': 'equal', 'rightValue': 'a'}, \
                    {'leftValue': json.kind, 'operation': 'equal', 'rightValue': 'b'}] }}"
            }),
            vec![json!({ "kind": "b" })],
        );
        let output = harness.run(&SwitchNode).expect("run");
        assert_eq!(output.port_count(), 2);
        assert_eq!(port(&output, 1), vec![json!({ "kind": "b" })]);
    }

    #[test]
    fn loop_count_is_clamped_to_ceiling() {
        let mut harness = Harness::new(
            "loop",
            json!({ "mode": "count", "count": 4_294_967_295_u32 }),
            vec![json!({ "a": 1 })],
        );
        harness.config.loop_iteration_ceiling = 3;
        let output = harness.run(&LoopNode).expect("run");
        assert_eq!(port(&output, 0).len(), 3);
        assert_eq!(
            port(&output, 1),
            vec![json!({ "iterations": 3, "data": { "a": 1 } })]
        );
    }
}
