//! Items and output sets.
//!
//! An [`Item`] is the unit of data flowing between nodes: a JSON tree plus
//! optional attachment metadata. A node activation produces one
//! [`OutputSet`], an ordered list of ports each holding an ordered list of
//! items.
//!
//! Output sets may be ingested from untyped host storage, so a port can hold
//! a payload that is not a list of items. Such ports are kept as
//! [`PortOutput::Malformed`] and read as empty by the extractor.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::LazyLock;

/// Attachments keyed by property name.
pub type Attachments = IndexMap<String, BinaryData>;

static EMPTY_ATTACHMENTS: LazyLock<Attachments> = LazyLock::new(Attachments::new);

/// Shared empty attachment map.
pub(crate) fn empty_attachments() -> &'static Attachments {
    &EMPTY_ATTACHMENTS
}

/// Metadata describing one attachment.
///
/// The payload handle in `data` is opaque here; storage and download are the
/// host's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryData {
    /// Payload handle (inline base64 or a storage reference).
    pub data: String,
    /// MIME type of the payload.
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    /// Payload size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Any further metadata the producer attached.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

impl BinaryData {
    /// Creates attachment metadata for a payload handle.
    #[must_use]
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
            file_name: None,
            file_extension: None,
            size: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Sets the file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

/// A unit of data flowing between nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Structured fields. Expected to be a JSON object; see
    /// [`Item::is_well_formed`].
    #[serde(default)]
    pub data: JsonValue,
    /// Attachment metadata, if the item carries any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Attachments>,
}

impl Item {
    /// Creates an item without attachments.
    #[must_use]
    pub fn new(data: JsonValue) -> Self {
        Self {
            data,
            attachments: None,
        }
    }

    /// Adds an attachment under the given property name.
    #[must_use]
    pub fn with_attachment(mut self, name: impl Into<String>, binary: BinaryData) -> Self {
        self.attachments
            .get_or_insert_with(Attachments::new)
            .insert(name.into(), binary);
        self
    }

    /// Returns the item's attachments, or an empty map when it has none.
    #[must_use]
    pub fn attachments(&self) -> &Attachments {
        self.attachments.as_ref().unwrap_or(empty_attachments())
    }

    /// Returns true if the item passes the boundary shape check.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.data.is_object()
    }
}

/// The payload of one output port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortOutput {
    /// An ordered list of items.
    Items(Vec<Item>),
    /// A payload that is not a list of items.
    Malformed(JsonValue),
}

impl PortOutput {
    /// Returns the port's items, or `None` if the payload is malformed.
    #[must_use]
    pub fn as_items(&self) -> Option<&[Item]> {
        match self {
            Self::Items(items) => Some(items),
            Self::Malformed(_) => None,
        }
    }
}

impl Default for PortOutput {
    fn default() -> Self {
        Self::Items(Vec::new())
    }
}

/// The complete result of one node activation: one item list per port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSet {
    ports: Vec<PortOutput>,
}

impl OutputSet {
    /// Creates an output set with no ports.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an output set with `count` empty ports.
    #[must_use]
    pub fn with_ports(count: usize) -> Self {
        Self {
            ports: vec![PortOutput::default(); count],
        }
    }

    /// Creates a single-port output set.
    #[must_use]
    pub fn single(items: Vec<Item>) -> Self {
        Self::from_ports(vec![items])
    }

    /// Creates an output set from per-port item lists.
    #[must_use]
    pub fn from_ports(ports: Vec<Vec<Item>>) -> Self {
        Self {
            ports: ports.into_iter().map(PortOutput::Items).collect(),
        }
    }

    /// Returns the number of ports.
    #[must_use]
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Returns all ports in order.
    #[must_use]
    pub fn ports(&self) -> &[PortOutput] {
        &self.ports
    }

    /// Returns the port at `index`, if it exists.
    #[must_use]
    pub fn port(&self, index: usize) -> Option<&PortOutput> {
        self.ports.get(index)
    }

    /// Consumes the set and returns its ports.
    #[must_use]
    pub fn into_ports(self) -> Vec<PortOutput> {
        self.ports
    }

    /// Appends an item to a port.
    ///
    /// Items pushed onto a port that does not exist, or that holds a
    /// malformed payload, are discarded.
    pub fn push(&mut self, port: usize, item: Item) {
        if let Some(PortOutput::Items(items)) = self.ports.get_mut(port) {
            items.push(item);
        }
    }

    /// Returns the total number of items across all well-formed ports.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.ports
            .iter()
            .filter_map(PortOutput::as_items)
            .map(<[Item]>::len)
            .sum()
    }
}
