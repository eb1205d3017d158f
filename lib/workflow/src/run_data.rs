//! Run data: the outputs of nodes that have already finished.

use crate::error::ContextError;
use crate::item::OutputSet;
use indexmap::IndexMap;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Recorded outputs keyed by node name.
pub(crate) type RecordedOutputs = IndexMap<String, OutputSet>;

/// Node name to output set, in the order nodes finished.
///
/// Entries are write-once. The host records a node's output immediately
/// after it finishes; wiring only ever reads. Clones share storage until
/// one of them records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionContext {
    outputs: Arc<RecordedOutputs>,
}

impl ExecutionContext {
    /// Creates an empty execution context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finished node's output.
    ///
    /// # Errors
    ///
    /// Returns an error if the node already has a recorded output.
    pub fn record(
        &mut self,
        node: impl Into<String>,
        output: OutputSet,
    ) -> Result<(), Report<ContextError>> {
        let node = node.into();
        if self.outputs.contains_key(&node) {
            return Err(ContextError::AlreadyRecorded { node }.into());
        }
        debug!(
            node = %node,
            ports = output.port_count(),
            items = output.item_count(),
            "recorded node output"
        );
        Arc::make_mut(&mut self.outputs).insert(node, output);
        Ok(())
    }

    /// Shared handle to the recorded outputs.
    pub(crate) fn shared(&self) -> Arc<RecordedOutputs> {
        Arc::clone(&self.outputs)
    }

    /// Returns a node's recorded output.
    #[must_use]
    pub fn output(&self, node: &str) -> Option<&OutputSet> {
        self.outputs.get(node)
    }

    /// Returns true if the node has a recorded output.
    #[must_use]
    pub fn contains(&self, node: &str) -> bool {
        self.outputs.contains_key(node)
    }

    /// Returns the recorded node names in recording order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;
    use serde_json::json;

    #[test]
    fn record_is_write_once() {
        let mut ctx = ExecutionContext::new();
        ctx.record("A", OutputSet::single(vec![Item::new(json!({ "v": 1 }))]))
            .expect("first record");

        let err = ctx
            .record("A", OutputSet::single(vec![]))
            .expect_err("second record should fail");
        assert!(matches!(
            err.current_context(),
            ContextError::AlreadyRecorded { node } if node == "A"
        ));
        assert_eq!(ctx.output("A").map(OutputSet::item_count), Some(1));
    }

    #[test]
    fn node_names_follow_recording_order() {
        let mut ctx = ExecutionContext::new();
        ctx.record("B", OutputSet::new()).expect("record");
        ctx.record("A", OutputSet::new()).expect("record");
        assert_eq!(ctx.node_names().collect::<Vec<_>>(), vec!["B", "A"]);
        assert_eq!(ctx.len(), 2);
        assert!(ctx.contains("A"));
        assert!(!ctx.contains("C"));
    }

    #[test]
    fn clones_are_independent_after_recording() {
        let mut ctx = ExecutionContext::new();
        ctx.record("A", OutputSet::new()).expect("record");
        let snapshot = ctx.clone();
        ctx.record("B", OutputSet::new()).expect("record");

        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.contains("B"));
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn deserializes_host_run_data() {
        let ctx: ExecutionContext = serde_json::from_value(json!({
            "Trigger": [[{ "data": { "id": 1 } }]],
            "Split": [[], [{ "data": { "id": 2 } }]]
        }))
        .expect("deserialize");
        assert_eq!(ctx.output("Split").map(OutputSet::port_count), Some(2));
    }
}
