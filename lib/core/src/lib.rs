//! Core types shared across the switchyard workspace.
//!
//! Identifiers used to address workflows and executions.

pub mod id;

pub use id::{ExecutionId, ParseIdError, WorkflowId};
