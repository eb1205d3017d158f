//! Workflow definition types.
//!
//! A workflow is a named set of nodes plus the connection graph wiring them
//! together. Definitions are read-only while a run is in progress.

use crate::connection::{ConnectionGraph, DependencyGraph};
use crate::node::NodeDefinition;
use serde::{Deserialize, Serialize};
use switchyard_core::WorkflowId;

/// A complete workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier for this workflow.
    #[serde(default)]
    pub id: WorkflowId,
    /// Human-readable name.
    pub name: String,
    /// Whether the workflow's triggers are live.
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub connections: ConnectionGraph,
}

impl Workflow {
    /// Creates an empty, inactive workflow with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(WorkflowId::new(), name)
    }

    /// Creates a workflow with a specific ID.
    #[must_use]
    pub fn with_id(id: WorkflowId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active: false,
            nodes: Vec::new(),
            connections: ConnectionGraph::new(),
        }
    }

    /// Adds a node.
    #[must_use]
    pub fn with_node(mut self, node: NodeDefinition) -> Self {
        self.nodes.push(node);
        self
    }

    /// Sets the connection graph.
    #[must_use]
    pub fn with_connections(mut self, connections: ConnectionGraph) -> Self {
        self.connections = connections;
        self
    }

    /// Looks up a node by name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// Returns the node-level dependency view of the wiring.
    #[must_use]
    pub fn dependencies(&self) -> DependencyGraph {
        self.connections.dependencies()
    }

    /// Returns the names of the nodes wired directly into `name`.
    #[must_use]
    pub fn parent_nodes(&self, name: &str) -> Vec<String> {
        self.dependencies()
            .parents(name)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Returns the names of the nodes `name` feeds directly.
    #[must_use]
    pub fn child_nodes(&self, name: &str) -> Vec<String> {
        self.dependencies()
            .children(name)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Returns true if the wiring contains a cycle (loops wired back into
    /// themselves do).
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        self.dependencies().has_cycles()
    }
}
