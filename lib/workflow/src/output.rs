//! Safe extraction of a single output port.

use crate::error::BoundsError;
use crate::item::{Item, OutputSet, PortOutput};
use tracing::{error, warn};

/// Returns the items of one port of a producer's output.
///
/// Never fails: a port index outside the output set, or a port whose
/// payload is not a list of items, yields an empty slice.
pub fn extract(output: &OutputSet, port: i64) -> &[Item] {
    let Some(slot) = usize::try_from(port).ok().and_then(|index| output.port(index)) else {
        let err = BoundsError::PortOutOfRange {
            port,
            port_count: output.port_count(),
        };
        warn!(port, port_count = output.port_count(), "{err}");
        return &[];
    };

    match slot {
        PortOutput::Items(items) => items,
        PortOutput::Malformed(_) => {
            let err = BoundsError::MalformedPort {
                port: usize::try_from(port).unwrap_or_default(),
            };
            error!(port, "{err}");
            &[]
        }
    }
}

/// [`extract`] for an unsigned port index.
pub fn extract_port(output: &OutputSet, port: usize) -> &[Item] {
    extract(output, i64::try_from(port).unwrap_or(i64::MAX))
}
