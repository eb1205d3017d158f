//! Connection graph: the workflow's wiring declarations.
//!
//! Connections are declared per source node, partitioned by channel, and
//! indexed by the source output port:
//!
//! ```json
//! { "Fetch": { "main": [ [ { "node": "Merge", "index": 0 } ], null ] } }
//! ```
//!
//! The graph is read-only for the lifetime of a run. Records are kept as
//! declared, including malformed ones; they are rejected when resolved into
//! a [`Connection`] so that a single bad record never poisons the graph.

use crate::error::WiringError;
use indexmap::IndexMap;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The channel used when a graph declares none.
pub const DEFAULT_CHANNEL: &str = "main";

/// One declared target of a source output port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Target node name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Target input slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
}

impl ConnectionRecord {
    /// Creates a well-formed record.
    #[must_use]
    pub fn new(node: impl Into<String>, index: usize) -> Self {
        Self {
            node: Some(node.into()),
            index: Some(i64::try_from(index).unwrap_or(i64::MAX)),
        }
    }

    /// Resolves this record into a connection from the given source port.
    ///
    /// # Errors
    ///
    /// Returns an error if the record lacks a target node or a usable index.
    pub fn resolve(
        &self,
        source_node: &str,
        channel: &str,
        output_index: usize,
    ) -> Result<Connection, WiringError> {
        let target_node = match self.node.as_deref() {
            Some(node) if !node.is_empty() => node,
            _ => {
                return Err(WiringError::MissingTargetNode {
                    source_node: source_node.to_string(),
                    channel: channel.to_string(),
                    output_index,
                });
            }
        };

        let index = self.index.ok_or_else(|| WiringError::MissingTargetIndex {
            source_node: source_node.to_string(),
            channel: channel.to_string(),
            output_index,
            target_node: target_node.to_string(),
        })?;

        let target_input_index =
            usize::try_from(index).map_err(|_| WiringError::NegativeTargetIndex {
                source_node: source_node.to_string(),
                channel: channel.to_string(),
                output_index,
                target_node: target_node.to_string(),
                index,
            })?;

        Ok(Connection {
            source_node: source_node.to_string(),
            source_output_index: output_index,
            channel: channel.to_string(),
            target_node: target_node.to_string(),
            target_input_index,
        })
    }
}

/// A resolved wiring record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connection {
    pub source_node: String,
    pub source_output_index: usize,
    pub channel: String,
    pub target_node: String,
    pub target_input_index: usize,
}

impl Connection {
    /// Creates a connection on the default channel.
    #[must_use]
    pub fn new(
        source_node: impl Into<String>,
        source_output_index: usize,
        target_node: impl Into<String>,
        target_input_index: usize,
    ) -> Self {
        Self {
            source_node: source_node.into(),
            source_output_index,
            channel: DEFAULT_CHANNEL.to_string(),
            target_node: target_node.into(),
            target_input_index,
        }
    }

    /// Moves the connection onto another channel.
    #[must_use]
    pub fn on_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }
}

/// Targets of each output port, indexed by source output index.
///
/// A `null` entry is a port with no outgoing connections.
type PortTargets = Vec<Option<Vec<ConnectionRecord>>>;

/// A declared connection record together with its position in the graph.
#[derive(Debug, Clone, Copy)]
pub struct DeclaredRecord<'a> {
    pub source_node: &'a str,
    pub channel: &'a str,
    pub output_index: usize,
    pub record: &'a ConnectionRecord,
}

impl DeclaredRecord<'_> {
    /// Resolves the record into a connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is malformed.
    pub fn resolve(&self) -> Result<Connection, WiringError> {
        self.record
            .resolve(self.source_node, self.channel, self.output_index)
    }
}

/// Static view of a workflow's wiring: source node -> channel -> output
/// port -> targets, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionGraph {
    sources: IndexMap<String, IndexMap<String, PortTargets>>,
}

impl ConnectionGraph {
    /// Creates an empty connection graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a connection, after all previously declared ones.
    pub fn connect(&mut self, connection: Connection) {
        self.declare(
            connection.source_node,
            connection.channel,
            connection.source_output_index,
            ConnectionRecord {
                node: Some(connection.target_node),
                index: Some(i64::try_from(connection.target_input_index).unwrap_or(i64::MAX)),
            },
        );
    }

    /// Declares a raw record on a source port, well-formed or not.
    pub fn declare(
        &mut self,
        source_node: impl Into<String>,
        channel: impl Into<String>,
        output_index: usize,
        record: ConnectionRecord,
    ) {
        let ports = self
            .sources
            .entry(source_node.into())
            .or_default()
            .entry(channel.into())
            .or_default();
        if ports.len() <= output_index {
            ports.resize(output_index + 1, None);
        }
        ports[output_index].get_or_insert_with(Vec::new).push(record);
    }

    /// Returns true if no connections are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records().next().is_none()
    }

    /// Returns every channel named anywhere in the graph, in first-seen order.
    #[must_use]
    pub fn channels(&self) -> Vec<&str> {
        let mut channels: Vec<&str> = Vec::new();
        for channel in self.sources.values().flat_map(IndexMap::keys) {
            if !channels.contains(&channel.as_str()) {
                channels.push(channel);
            }
        }
        channels
    }

    /// Returns the source node names, in declaration order.
    pub fn source_nodes(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Iterates every declared record in declaration order.
    pub fn records(&self) -> impl Iterator<Item = DeclaredRecord<'_>> {
        self.sources.iter().flat_map(|(source_node, channels)| {
            channels.iter().flat_map(move |(channel, ports)| {
                ports
                    .iter()
                    .enumerate()
                    .filter_map(|(output_index, targets)| {
                        targets.as_ref().map(|targets| (output_index, targets))
                    })
                    .flat_map(move |(output_index, targets)| {
                        targets.iter().map(move |record| DeclaredRecord {
                            source_node,
                            channel,
                            output_index,
                            record,
                        })
                    })
            })
        })
    }

    /// Iterates every well-formed connection in declaration order.
    pub fn connections(&self) -> impl Iterator<Item = Connection> + '_ {
        self.records().filter_map(|declared| declared.resolve().ok())
    }

    /// Builds the node-level dependency view of this graph.
    #[must_use]
    pub fn dependencies(&self) -> DependencyGraph {
        DependencyGraph::from_connections(self)
    }
}

/// Node-level dependency view: one edge per (source, target) pair.
///
/// Used for upstream/downstream lookups. Channels and port indices are not
/// represented.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_index_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Builds the view from the well-formed connections of a graph.
    #[must_use]
    pub fn from_connections(connections: &ConnectionGraph) -> Self {
        let mut view = Self::default();
        for connection in connections.connections() {
            let source = view.index_of(&connection.source_node);
            let target = view.index_of(&connection.target_node);
            view.graph.update_edge(source, target, ());
        }
        view
    }

    fn index_of(&mut self, name: &str) -> NodeIndex {
        if let Some(&index) = self.node_index_map.get(name) {
            return index;
        }
        let index = self.graph.add_node(name.to_string());
        self.node_index_map.insert(name.to_string(), index);
        index
    }

    /// Returns the nodes wired directly into `node`, in declaration order.
    #[must_use]
    pub fn parents(&self, node: &str) -> Vec<&str> {
        self.neighbors(node, Direction::Incoming)
    }

    /// Returns the nodes `node` feeds directly, in declaration order.
    #[must_use]
    pub fn children(&self, node: &str) -> Vec<&str> {
        self.neighbors(node, Direction::Outgoing)
    }

    fn neighbors(&self, node: &str, direction: Direction) -> Vec<&str> {
        let Some(&index) = self.node_index_map.get(node) else {
            return Vec::new();
        };
        // petgraph yields the most recently added edge first.
        let mut neighbors: Vec<&str> = self
            .graph
            .neighbors_directed(index, direction)
            .filter_map(|neighbor| self.graph.node_weight(neighbor))
            .map(String::as_str)
            .collect();
        neighbors.reverse();
        neighbors
    }

    /// Returns true if the wiring contains a cycle.
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_declaration_shape_in_order() {
        let graph: ConnectionGraph = serde_json::from_value(json!({
            "Trigger": { "main": [[{ "node": "Fetch", "type": "main", "index": 0 }]] },
            "Fetch": {
                "main": [
                    [{ "node": "Merge", "index": 0 }],
                    null,
                    [{ "node": "Merge", "index": 1 }]
                ]
            }
        }))
        .expect("deserialize");

        let connections: Vec<Connection> = graph.connections().collect();
        assert_eq!(
            connections,
            vec![
                Connection::new("Trigger", 0, "Fetch", 0),
                Connection::new("Fetch", 0, "Merge", 0),
                Connection::new("Fetch", 2, "Merge", 1),
            ]
        );
    }

    #[test]
    fn channels_are_collected_across_sources() {
        let mut graph = ConnectionGraph::new();
        graph.connect(Connection::new("Model", 0, "Agent", 0).on_channel("ai_model"));
        graph.connect(Connection::new("Trigger", 0, "Agent", 0));
        graph.connect(Connection::new("Memory", 0, "Agent", 0).on_channel("ai_model"));
        assert_eq!(graph.channels(), vec!["ai_model", "main"]);
    }

    #[test]
    fn empty_graph_has_no_channels() {
        let graph = ConnectionGraph::new();
        assert!(graph.is_empty());
        assert!(graph.channels().is_empty());
    }

    #[test]
    fn malformed_records_fail_to_resolve() {
        let mut graph = ConnectionGraph::new();
        graph.declare(
            "A",
            "main",
            0,
            ConnectionRecord {
                node: None,
                index: Some(0),
            },
        );
        graph.declare(
            "A",
            "main",
            0,
            ConnectionRecord {
                node: Some("B".to_string()),
                index: None,
            },
        );
        graph.declare(
            "A",
            "main",
            0,
            ConnectionRecord {
                node: Some("B".to_string()),
                index: Some(-1),
            },
        );

        let errors: Vec<WiringError> = graph
            .records()
            .filter_map(|declared| declared.resolve().err())
            .collect();
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], WiringError::MissingTargetNode { .. }));
        assert!(matches!(errors[1], WiringError::MissingTargetIndex { .. }));
        assert!(matches!(
            errors[2],
            WiringError::NegativeTargetIndex { index: -1, .. }
        ));
        assert_eq!(graph.connections().count(), 0);
    }

    #[test]
    fn declare_pads_missing_ports() {
        let mut graph = ConnectionGraph::new();
        graph.connect(Connection::new("Switch", 2, "Sink", 0));
        let json = serde_json::to_value(&graph).expect("serialize");
        assert_eq!(
            json,
            json!({ "Switch": { "main": [null, null, [{ "node": "Sink", "index": 0 }]] } })
        );
    }

    #[test]
    fn dependency_view_lists_parents_in_declaration_order() {
        let mut graph = ConnectionGraph::new();
        graph.connect(Connection::new("A", 0, "Merge", 0));
        graph.connect(Connection::new("B", 0, "Merge", 1));
        graph.connect(Connection::new("A", 0, "Merge", 1));
        graph.connect(Connection::new("Merge", 0, "Sink", 0));

        let deps = graph.dependencies();
        assert_eq!(deps.parents("Merge"), vec!["A", "B"]);
        assert_eq!(deps.children("Merge"), vec!["Sink"]);
        assert!(deps.parents("Unknown").is_empty());
        assert!(!deps.has_cycles());
    }

    #[test]
    fn dependency_view_detects_cycles() {
        let mut graph = ConnectionGraph::new();
        graph.connect(Connection::new("Loop", 0, "Body", 0));
        graph.connect(Connection::new("Body", 0, "Loop", 0));
        assert!(graph.dependencies().has_cycles());
    }
}
