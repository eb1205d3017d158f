//! Execution metadata exposed to nodes and expressions.

use serde::{Deserialize, Serialize};
use std::fmt;
use switchyard_core::ExecutionId;

/// How a run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Started by a user from the editor.
    #[default]
    Manual,
    /// Started by a trigger node (schedule, poll, event).
    Trigger,
    /// Started by an inbound webhook call.
    Webhook,
    /// Re-run of a failed execution.
    Retry,
    /// Started by another workflow or the host itself.
    Internal,
}

impl ExecutionMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Trigger => "trigger",
            Self::Webhook => "webhook",
            Self::Retry => "retry",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the run a node is executing in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Unique identifier for this run.
    pub id: ExecutionId,
    pub mode: ExecutionMode,
}

impl ExecutionMetadata {
    /// Creates metadata for a new run.
    #[must_use]
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            id: ExecutionId::new(),
            mode,
        }
    }
}

impl Default for ExecutionMetadata {
    fn default() -> Self {
        Self::new(ExecutionMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_mode_serde() {
        let json = serde_json::to_string(&ExecutionMode::Webhook).expect("serialize");
        assert_eq!(json, "\"webhook\"");
        let mode: ExecutionMode = serde_json::from_str("\"retry\"").expect("deserialize");
        assert_eq!(mode, ExecutionMode::Retry);
    }

    #[test]
    fn new_runs_get_distinct_ids() {
        let a = ExecutionMetadata::new(ExecutionMode::Trigger);
        let b = ExecutionMetadata::new(ExecutionMode::Trigger);
        assert_ne!(a.id, b.id);
        assert_eq!(a.mode.to_string(), "trigger");
    }
}
