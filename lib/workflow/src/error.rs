//! Error types for the workflow crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `WiringError`, `BoundsError`, `CrossNodeValidationError`: recovered
//!   in place (logged, the offending record or item is skipped)
//! - `EvaluationError`: raised by an expression evaluator
//! - `ParameterError`: evaluation failures surfaced to the node with the
//!   parameter name and item index attached
//! - `ContextError`: host-facing run data bookkeeping
//! - `NodeError`: node execution (wraps lower errors via context)

use std::fmt;

/// A connection record that cannot be turned into a usable connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WiringError {
    /// The record does not name a target node.
    MissingTargetNode {
        source_node: String,
        channel: String,
        output_index: usize,
    },
    /// The record does not carry a target input index.
    MissingTargetIndex {
        source_node: String,
        channel: String,
        output_index: usize,
        target_node: String,
    },
    /// The record's target input index is negative.
    NegativeTargetIndex {
        source_node: String,
        channel: String,
        output_index: usize,
        target_node: String,
        index: i64,
    },
}

impl fmt::Display for WiringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTargetNode {
                source_node,
                channel,
                output_index,
            } => write!(
                f,
                "connection from {source_node}[{channel}:{output_index}] has no target node"
            ),
            Self::MissingTargetIndex {
                source_node,
                channel,
                output_index,
                target_node,
            } => write!(
                f,
                "connection {source_node}[{channel}:{output_index}] -> {target_node} has no target index"
            ),
            Self::NegativeTargetIndex {
                source_node,
                channel,
                output_index,
                target_node,
                index,
            } => write!(
                f,
                "connection {source_node}[{channel}:{output_index}] -> {target_node} has negative target index {index}"
            ),
        }
    }
}

impl std::error::Error for WiringError {}

/// An output port lookup that fell outside what the producer emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundsError {
    /// The requested port does not exist on the output set.
    PortOutOfRange { port: i64, port_count: usize },
    /// The port exists but its payload is not a list of items.
    MalformedPort { port: usize },
}

impl fmt::Display for BoundsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PortOutOfRange { port, port_count } => {
                write!(f, "output port {port} out of range ({port_count} ports)")
            }
            Self::MalformedPort { port } => {
                write!(f, "output port {port} does not hold a list of items")
            }
        }
    }
}

impl std::error::Error for BoundsError {}

/// An item reached through a cross-node reference failed its shape check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossNodeValidationError {
    /// The item's `data` is not a JSON object.
    InvalidItem {
        node: String,
        port: usize,
        index: usize,
    },
}

impl fmt::Display for CrossNodeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidItem { node, port, index } => write!(
                f,
                "item {index} on output {port} of node '{node}' has non-object data"
            ),
        }
    }
}

impl std::error::Error for CrossNodeValidationError {}

/// Errors raised by an expression evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// The expression could not be parsed.
    Syntax { message: String },
    /// The expression parsed but failed while evaluating.
    Runtime { message: String },
}

impl EvaluationError {
    /// Creates a runtime evaluation error.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { message } => write!(f, "expression syntax error: {message}"),
            Self::Runtime { message } => write!(f, "expression evaluation failed: {message}"),
        }
    }
}

impl std::error::Error for EvaluationError {}

/// Errors from resolving a node parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    /// The evaluator rejected the parameter's value.
    ExpressionEvaluation {
        parameter: String,
        item_index: usize,
        reason: String,
    },
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExpressionEvaluation {
                parameter,
                item_index,
                reason,
            } => write!(
                f,
                "parameter '{parameter}' failed to evaluate for item {item_index}: {reason}"
            ),
        }
    }
}

impl std::error::Error for ParameterError {}

/// Errors from recording node results into the execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// The node already has a recorded output for this run.
    AlreadyRecorded { node: String },
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRecorded { node } => {
                write!(f, "output for node '{node}' was already recorded")
            }
        }
    }
}

impl std::error::Error for ContextError {}

/// Errors from executing a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// No implementation is registered for the node's kind.
    UnknownKind { kind: String },
    /// Resolving a parameter failed (use as context wrapper).
    Parameter { node: String },
    /// A parameter resolved to a value the node cannot use.
    InvalidParameter {
        node: String,
        parameter: String,
        reason: String,
    },
    /// The node failed for another reason.
    Execution { node: String, reason: String },
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKind { kind } => write!(f, "no node registered for kind '{kind}'"),
            Self::Parameter { node } => {
                write!(f, "parameter resolution failed for node '{node}'")
            }
            Self::InvalidParameter {
                node,
                parameter,
                reason,
            } => write!(f, "invalid parameter '{parameter}' on node '{node}': {reason}"),
            Self::Execution { node, reason } => write!(f, "node '{node}' failed: {reason}"),
        }
    }
}

impl std::error::Error for NodeError {}
