//! Multi-output routing policies.
//!
//! Each policy turns a node's wired input items into an [`OutputSet`].
//! Predicates are supplied by the caller per item, so the policies stay
//! independent of how conditions are configured. Items placed on a port are
//! always copies: downstream branches never share an item.

use crate::item::{Item, OutputSet};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::debug;

/// Port receiving items whose predicate holds.
pub const TRUE_PORT: usize = 0;
/// Port receiving items whose predicate does not hold.
pub const FALSE_PORT: usize = 1;
/// Port receiving loop iteration items.
pub const ITERATION_PORT: usize = 0;
/// Port receiving loop completion items.
pub const COMPLETION_PORT: usize = 1;

/// Routes each item to port 0 if `predicate` holds for it, else to port 1.
///
/// # Errors
///
/// Returns the first error raised by `predicate`.
pub fn binary_split<E>(
    items: &[Item],
    mut predicate: impl FnMut(usize, &Item) -> Result<bool, E>,
) -> Result<OutputSet, E> {
    let mut output = OutputSet::with_ports(2);
    for (index, item) in items.iter().enumerate() {
        let port = if predicate(index, item)? {
            TRUE_PORT
        } else {
            FALSE_PORT
        };
        output.push(port, item.clone());
    }
    Ok(output)
}

/// Options of an N-way split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchOptions {
    /// Stop at the first matching rule.
    #[serde(default = "default_send_to_first_match")]
    pub send_to_first_match: bool,
    /// Add a port, after the rule ports, for items no rule matched.
    #[serde(default)]
    pub fallback_output: bool,
}

fn default_send_to_first_match() -> bool {
    true
}

impl Default for SwitchOptions {
    fn default() -> Self {
        Self {
            send_to_first_match: default_send_to_first_match(),
            fallback_output: false,
        }
    }
}

/// Routes items across one port per rule, plus an optional fallback port.
///
/// `matches(item_index, rule_index, item)` is called in rule order. Items
/// matching no rule go to the fallback port if enabled and are dropped
/// otherwise.
///
/// # Errors
///
/// Returns the first error raised by `matches`.
pub fn switch_split<E>(
    items: &[Item],
    rule_count: usize,
    options: SwitchOptions,
    mut matches: impl FnMut(usize, usize, &Item) -> Result<bool, E>,
) -> Result<OutputSet, E> {
    let port_count = rule_count + usize::from(options.fallback_output);
    let mut output = OutputSet::with_ports(port_count);

    for (index, item) in items.iter().enumerate() {
        let mut matched = false;
        for rule in 0..rule_count {
            if !matches(index, rule, item)? {
                continue;
            }
            matched = true;
            output.push(rule, item.clone());
            if options.send_to_first_match {
                break;
            }
        }

        if !matched {
            if options.fallback_output {
                output.push(rule_count, item.clone());
            } else {
                debug!(item_index = index, "no rule matched, dropping item");
            }
        }
    }
    Ok(output)
}

/// Emits `count` iteration copies of each item, then one completion item.
///
/// Each copy carries its iteration number in `iteration_field`.
///
/// # Errors
///
/// Returns the first error raised by `count`.
pub fn loop_count<E>(
    items: &[Item],
    iteration_field: &str,
    mut count: impl FnMut(usize, &Item) -> Result<u32, E>,
) -> Result<OutputSet, E> {
    let mut output = OutputSet::with_ports(2);
    for (index, item) in items.iter().enumerate() {
        let iterations = count(index, item)?;
        for iteration in 0..iterations {
            output.push(ITERATION_PORT, stamp(item, iteration_field, iteration));
        }
        output.push(COMPLETION_PORT, completion(item, iterations));
    }
    Ok(output)
}

/// Per-item state of a condition-bounded loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// About to check the predicate for iteration `k`.
    Iterating(u32),
    /// The loop ended; the completion item is pending.
    Stopping,
    Done,
}

/// Emits iteration items while `predicate` holds, at most `max_iterations`
/// per item, then one completion item per item.
///
/// `predicate(iteration, item_index, item)` is re-evaluated against the
/// original item on every iteration.
///
/// # Errors
///
/// Returns the first error raised by `predicate`.
pub fn loop_while<E>(
    items: &[Item],
    iteration_field: &str,
    max_iterations: u32,
    mut predicate: impl FnMut(u32, usize, &Item) -> Result<bool, E>,
) -> Result<OutputSet, E> {
    let mut output = OutputSet::with_ports(2);

    for (index, item) in items.iter().enumerate() {
        let mut iterations = 0;
        let mut state = if max_iterations == 0 {
            LoopState::Stopping
        } else {
            LoopState::Iterating(0)
        };

        while state != LoopState::Done {
            state = match state {
                LoopState::Iterating(k) => {
                    if predicate(k, index, item)? {
                        output.push(ITERATION_PORT, stamp(item, iteration_field, k));
                        iterations = k + 1;
                        if k + 1 < max_iterations {
                            LoopState::Iterating(k + 1)
                        } else {
                            debug!(
                                item_index = index,
                                max_iterations,
                                "loop hit iteration ceiling"
                            );
                            LoopState::Stopping
                        }
                    } else {
                        LoopState::Stopping
                    }
                }
                LoopState::Stopping => {
                    output.push(COMPLETION_PORT, completion(item, iterations));
                    LoopState::Done
                }
                LoopState::Done => LoopState::Done,
            };
        }
    }
    Ok(output)
}

/// Copies an item, writing the iteration number into its data.
///
/// Items whose data is not an object are copied unchanged.
fn stamp(item: &Item, field: &str, iteration: u32) -> Item {
    let mut copy = item.clone();
    if let JsonValue::Object(map) = &mut copy.data {
        map.insert(field.to_string(), json!(iteration));
    }
    copy
}

fn completion(item: &Item, iterations: u32) -> Item {
    Item {
        data: json!({ "iterations": iterations, "data": item.data }),
        attachments: item.attachments.clone(),
    }
}
