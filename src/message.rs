// src/message.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Opaque message handle assigned by the mail store.
pub type MessageId = String;

/// A single `name: value` header as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Top-level MIME part of a metadata-format message.
/// Fields we don't model are kept in `extra` so the snapshot stays faithful.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Header>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Raw message as fetched with `format=metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: MessageId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_estimate: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<MessagePart>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawMessage {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.label_ids = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.payload
            .get_or_insert_with(MessagePart::default)
            .headers
            .push(Header::new(name, value));
        self
    }

    /// Header list in received order; empty when there is no payload.
    pub fn headers(&self) -> &[Header] {
        self.payload.as_ref().map(|p| p.headers.as_slice()).unwrap_or(&[])
    }
}

/// Header name -> every value seen for it, in received order.
pub type HeaderMap = BTreeMap<String, Vec<String>>;

/// The exported record: metadata without the header list, plus the header map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageExcerpt {
    pub metadata: RawMessage,
    pub header: HeaderMap,
}

impl MessageExcerpt {
    /// Build an excerpt, moving the header list out of the message.
    pub fn extract(mut msg: RawMessage) -> Self {
        let mut header = HeaderMap::new();
        if let Some(payload) = msg.payload.as_mut() {
            for h in payload.headers.drain(..) {
                header.entry(h.name).or_default().push(h.value);
            }
        }
        Self { metadata: msg, header }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// First value of a header, if present.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.header.get(name).and_then(|v| v.first()).map(String::as_str)
    }
}
