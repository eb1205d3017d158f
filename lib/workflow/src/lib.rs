//! Node wiring and parameter resolution for the switchyard workflow runtime.
//!
//! This crate sits between the host's scheduler and individual node kinds:
//!
//! - **Connections**: the workflow's wiring declarations, per source node,
//!   channel and output port
//! - **Wiring**: assembling a node's per-channel input slots from the outputs
//!   of nodes that already ran
//! - **Parameters**: dotted-path lookup into a node's parameter tree, with
//!   per-item expression evaluation
//! - **Routing**: the binary split, N-way switch and loop unroll policies
//!   behind the built-in control-flow kinds
//! - **Runtime**: the facade a node implementation executes against
//!
//! Scheduling, persistence and transport are the host's concern. The host
//! records each node's [`OutputSet`] into the [`ExecutionContext`] once the
//! node finishes; producers must run before their consumers are wired.

pub mod condition;
pub mod config;
pub mod connection;
pub mod control;
pub mod definition;
pub mod error;
pub mod execution;
pub mod expression;
pub mod item;
pub mod node;
pub mod output;
pub mod parameter;
pub mod routing;
pub mod run_data;
pub mod runtime;
pub mod template;
pub mod wiring;

pub use condition::{Combinator, Condition, ConditionGroup, Operation};
pub use config::{FailurePlaceholder, RuntimeConfig};
pub use connection::{Connection, ConnectionGraph, ConnectionRecord, DEFAULT_CHANNEL};
pub use control::{IfNode, LoopNode, SwitchNode};
pub use definition::Workflow;
pub use error::{
    BoundsError, ContextError, CrossNodeValidationError, EvaluationError, NodeError,
    ParameterError, WiringError,
};
pub use execution::{ExecutionMetadata, ExecutionMode};
pub use expression::{ExpressionContext, ExpressionEvaluator, NodeView, PassthroughEvaluator};
pub use item::{Attachments, BinaryData, Item, OutputSet, PortOutput};
pub use node::{Node, NodeDefinition, NodeRegistry};
pub use parameter::{ParameterOptions, ParameterResolver};
pub use run_data::ExecutionContext;
pub use runtime::NodeRuntime;
pub use template::TemplateEvaluator;
pub use wiring::InputTable;
