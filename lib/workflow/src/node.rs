//! Workflow nodes: their definitions and the execution contract.
//!
//! Every node kind implements [`Node`]. The wiring subsystem only ever talks
//! to that trait; concrete kinds are looked up by name in a [`NodeRegistry`].

use crate::error::NodeError;
use crate::item::OutputSet;
use crate::runtime::NodeRuntime;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// A node as declared in a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDefinition {
    /// Unique name within the workflow. Connections and cross-node
    /// references address nodes by name.
    pub name: String,
    /// Node kind, used to look up the implementation.
    #[serde(alias = "type")]
    pub kind: String,
    /// Raw parameter tree.
    #[serde(default = "empty_parameters")]
    pub parameters: JsonValue,
    /// Substitute a placeholder for failed parameter evaluations instead of
    /// failing the node.
    #[serde(default)]
    pub continue_on_fail: bool,
    #[serde(default)]
    pub disabled: bool,
}

fn empty_parameters() -> JsonValue {
    JsonValue::Object(serde_json::Map::new())
}

impl NodeDefinition {
    /// Creates a node definition with no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            parameters: empty_parameters(),
            continue_on_fail: false,
            disabled: false,
        }
    }

    /// Sets the parameter tree.
    #[must_use]
    pub fn with_parameters(mut self, parameters: JsonValue) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the continue-on-fail flag.
    #[must_use]
    pub fn continue_on_fail(mut self, continue_on_fail: bool) -> Self {
        self.continue_on_fail = continue_on_fail;
        self
    }
}

/// Execution contract shared by every node kind.
pub trait Node: Send + Sync {
    /// The kind string this implementation handles.
    fn kind(&self) -> &str;

    /// Executes one activation of the node.
    ///
    /// Inputs and parameters are read through `runtime`; the returned output
    /// set is recorded by the host.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot produce an output.
    fn execute(&self, runtime: &NodeRuntime<'_>) -> Result<OutputSet, Report<NodeError>>;
}

/// Node implementations keyed by kind.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, Arc<dyn Node>>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in control-flow kinds.
    #[must_use]
    pub fn with_control_flow() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::control::IfNode));
        registry.register(Arc::new(crate::control::SwitchNode));
        registry.register(Arc::new(crate::control::LoopNode));
        registry
    }

    /// Registers an implementation under its kind, replacing any previous
    /// one.
    pub fn register(&mut self, node: Arc<dyn Node>) {
        self.nodes.insert(node.kind().to_string(), node);
    }

    /// Looks up the implementation for a kind.
    ///
    /// # Errors
    ///
    /// Returns an error if no implementation is registered.
    pub fn get(&self, kind: &str) -> Result<Arc<dyn Node>, Report<NodeError>> {
        self.nodes.get(kind).cloned().ok_or_else(|| {
            NodeError::UnknownKind {
                kind: kind.to_string(),
            }
            .into()
        })
    }

    /// Returns the registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    impl Node for Echo {
        fn kind(&self) -> &str {
            "echo"
        }

        fn execute(&self, runtime: &NodeRuntime<'_>) -> Result<OutputSet, Report<NodeError>> {
            Ok(OutputSet::single(runtime.input_items().to_vec()))
        }
    }

    #[test]
    fn node_definition_defaults() {
        let node: NodeDefinition =
            serde_json::from_value(json!({ "name": "Check", "type": "if" })).expect("deserialize");
        assert_eq!(node.kind, "if");
        assert_eq!(node.parameters, json!({}));
        assert!(!node.continue_on_fail);
        assert!(!node.disabled);
    }

    #[test]
    fn node_definition_camel_case() {
        let node: NodeDefinition = serde_json::from_value(json!({
            "name": "Fetch",
            "kind": "http",
            "parameters": { "url": "https://example.com" },
            "continueOnFail": true
        }))
        .expect("deserialize");
        assert!(node.continue_on_fail);
        assert_eq!(node.parameters["url"], json!("https://example.com"));
    }

    #[test]
    fn registry_dispatches_by_kind() {
        let mut registry = NodeRegistry::new();
        registry.register(Arc::new(Echo));
        assert_eq!(registry.get("echo").expect("registered").kind(), "echo");

        let Err(err) = registry.get("sms") else {
            panic!("unregistered kind should not resolve");
        };
        assert!(matches!(
            err.current_context(),
            NodeError::UnknownKind { kind } if kind == "sms"
        ));
    }

    #[test]
    fn control_flow_registry_has_builtin_kinds() {
        let registry = NodeRegistry::with_control_flow();
        assert_eq!(registry.kinds(), vec!["if", "loop", "switch"]);
    }
}
