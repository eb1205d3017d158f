//! Input wiring: assembling a node's input table from upstream outputs.
//!
//! The table is derived fresh before every activation. A slot fed by several
//! connections holds the concatenation of each source's items in declaration
//! order. Missing producers and malformed records only ever cost the items
//! they would have contributed.

use crate::connection::{ConnectionGraph, DEFAULT_CHANNEL};
use crate::item::Item;
use crate::output;
use crate::run_data::ExecutionContext;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, instrument, warn};

/// A node's inputs: channel -> slot -> items.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InputTable {
    channels: IndexMap<String, Vec<Vec<Item>>>,
}

impl InputTable {
    /// Creates an empty input table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the items of one slot, or an empty slice if the channel or
    /// slot does not exist.
    #[must_use]
    pub fn slot(&self, channel: &str, index: usize) -> &[Item] {
        self.channels
            .get(channel)
            .and_then(|slots| slots.get(index))
            .map_or(&[], Vec::as_slice)
    }

    /// Returns all slots of a channel.
    #[must_use]
    pub fn slots(&self, channel: &str) -> &[Vec<Item>] {
        self.channels.get(channel).map_or(&[], Vec::as_slice)
    }

    /// Returns the number of slots on a channel.
    #[must_use]
    pub fn slot_count(&self, channel: &str) -> usize {
        self.slots(channel).len()
    }

    /// Returns the channel names in table order.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    fn push_items(&mut self, channel: &str, index: usize, items: &[Item]) {
        if let Some(slot) = self
            .channels
            .get_mut(channel)
            .and_then(|slots| slots.get_mut(index))
        {
            slot.extend_from_slice(items);
        }
    }
}

/// Builds the input table for `target` from the producers recorded in `ctx`.
///
/// Every channel named in the graph gets an entry, sized to one past the
/// highest input index any well-formed connection of that channel targets
/// on this node. A graph with no connections yields the single
/// `default_channel` with no slots.
#[instrument(skip(graph, ctx), fields(node = %target))]
pub fn assemble(
    graph: &ConnectionGraph,
    ctx: &ExecutionContext,
    target: &str,
    default_channel: &str,
) -> InputTable {
    let mut table = InputTable::new();

    let channels = graph.channels();
    if channels.is_empty() {
        table.channels.insert(default_channel.to_string(), Vec::new());
    } else {
        for channel in channels {
            table.channels.insert(channel.to_string(), Vec::new());
        }
    }

    let mut incoming = Vec::new();
    for declared in graph.records() {
        if let Some(node) = declared.record.node.as_deref()
            && node != target
        {
            continue;
        }
        match declared.resolve() {
            Ok(connection) => incoming.push(connection),
            Err(err) => {
                warn!(
                    source = declared.source_node,
                    channel = declared.channel,
                    port = declared.output_index,
                    "skipping connection record: {err}"
                );
            }
        }
    }

    for connection in &incoming {
        if let Some(slots) = table.channels.get_mut(&connection.channel)
            && slots.len() <= connection.target_input_index
        {
            slots.resize(connection.target_input_index + 1, Vec::new());
        }
    }

    for connection in &incoming {
        let Some(produced) = ctx.output(&connection.source_node) else {
            warn!(
                source = %connection.source_node,
                channel = %connection.channel,
                slot = connection.target_input_index,
                "producer has no recorded output, skipping connection"
            );
            continue;
        };
        let items = output::extract_port(produced, connection.source_output_index);
        debug!(
            source = %connection.source_node,
            channel = %connection.channel,
            port = connection.source_output_index,
            slot = connection.target_input_index,
            items = items.len(),
            "wired input"
        );
        table.push_items(&connection.channel, connection.target_input_index, items);
    }

    table
}

/// [`assemble`] using the built-in default channel.
pub fn assemble_default(
    graph: &ConnectionGraph,
    ctx: &ExecutionContext,
    target: &str,
) -> InputTable {
    assemble(graph, ctx, target, DEFAULT_CHANNEL)
}
