//! Merkle nodes: an opaque payload plus labelled links to other blocks.
//!
//! Encoded as a canonical CBOR map with a reserved `"Data"` field holding the
//! payload and one entry per link, each link's target a content-hash link.
//! Links are kept sorted by label bytes, so construction order never leaks
//! into the encoding.

use ciborium::value::Value;

use crate::canonical::{decode_value, encode_canonical, hash_from_cbor, hash_to_cbor};
use crate::error::{CoreError, Result};
use crate::hash::ContentHash;

/// Reserved map key for the node payload.
pub const DATA_LABEL: &str = "Data";

/// A labelled reference to another block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    pub label: String,
    pub target: ContentHash,
}

impl Link {
    pub fn new(label: impl Into<String>, target: ContentHash) -> Self {
        Self {
            label: label.into(),
            target,
        }
    }
}

/// An immutable payload-plus-links node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleNode {
    pub data: Vec<u8>,
    links: Vec<Link>,
}

impl MerkleNode {
    /// Create a node; links are sorted by label bytes.
    ///
    /// Fails if a label is reserved or repeated.
    pub fn new(data: Vec<u8>, mut links: Vec<Link>) -> Result<Self> {
        links.sort_by(|a, b| a.label.as_bytes().cmp(b.label.as_bytes()));
        if links.iter().any(|l| l.label == DATA_LABEL) {
            return Err(CoreError::MalformedNode(format!(
                "link label {:?} is reserved",
                DATA_LABEL
            )));
        }
        if links.windows(2).any(|w| w[0].label == w[1].label) {
            return Err(CoreError::MalformedNode("duplicate link label".into()));
        }
        Ok(Self { data, links })
    }

    /// A node with a payload and no links.
    pub fn leaf(data: Vec<u8>) -> Self {
        Self {
            data,
            links: Vec::new(),
        }
    }

    /// Links in label order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// A copy of this node with one more link.
    pub fn add_link(&self, label: impl Into<String>, target: ContentHash) -> Result<Self> {
        let mut links = self.links.clone();
        links.push(Link::new(label, target));
        Self::new(self.data.clone(), links)
    }

    /// A copy of this node with a different payload.
    pub fn with_data(&self, data: Vec<u8>) -> Self {
        Self {
            data,
            links: self.links.clone(),
        }
    }

    pub fn to_cbor(&self) -> Value {
        let mut entries = Vec::with_capacity(self.links.len() + 1);
        entries.push((
            Value::Text(DATA_LABEL.to_string()),
            Value::Bytes(self.data.clone()),
        ));
        for link in &self.links {
            entries.push((Value::Text(link.label.clone()), hash_to_cbor(&link.target)));
        }
        Value::Map(entries)
    }

    pub fn from_cbor(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Map(m) => m,
            _ => return Err(CoreError::MalformedNode("expected map".into())),
        };

        let mut data = None;
        let mut links = Vec::with_capacity(map.len().saturating_sub(1));
        for (k, v) in map {
            let label = match k {
                Value::Text(s) => s,
                _ => return Err(CoreError::MalformedNode("non-text label".into())),
            };
            if label == DATA_LABEL {
                match v {
                    Value::Bytes(b) => data = Some(b.clone()),
                    _ => return Err(CoreError::MalformedNode("Data is not bytes".into())),
                }
            } else {
                let target = hash_from_cbor(v)
                    .map_err(|e| CoreError::MalformedNode(format!("link {:?}: {}", label, e)))?;
                links.push(Link::new(label.clone(), target));
            }
        }

        let data = data.ok_or_else(|| CoreError::MalformedNode("missing Data".into()))?;
        Self::new(data, links)
    }

    /// Canonical bytes.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        encode_canonical(&self.to_cbor())
    }

    /// Inverse of [`serialize`](Self::serialize).
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let value = decode_value(bytes).map_err(|e| CoreError::MalformedNode(e.to_string()))?;
        Self::from_cbor(&value)
    }
}
