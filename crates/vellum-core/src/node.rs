//! B-tree nodes.
//!
//! A [`TreeNode`] holds sorted `(key, value)` entries and, when internal,
//! one more child hash than it has entries. Separator entries in internal
//! nodes carry values too: a key lives in exactly one node at any level.
//!
//! On the wire a node is a [`MerkleNode`]: the entries encoded as the
//! payload, the children as links labelled by zero-padded position.

use ciborium::value::Value;

use crate::canonical::{decode_value, encode_canonical, optional_hash_from_cbor, optional_hash_to_cbor};
use crate::error::{CoreError, Result};
use crate::hash::{ContentHash, OptionalHash};
use crate::merkle::{Link, MerkleNode};

/// A key with its (possibly absent) value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: OptionalHash,
}

impl Entry {
    pub fn new(key: impl Into<Vec<u8>>, value: OptionalHash) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    fn to_cbor(&self) -> Value {
        Value::Array(vec![
            Value::Bytes(self.key.clone()),
            optional_hash_to_cbor(&self.value),
        ])
    }

    fn from_cbor(value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) if items.len() == 2 => {
                let key = match &items[0] {
                    Value::Bytes(b) => b.clone(),
                    _ => return Err(CoreError::MalformedNode("entry key is not bytes".into())),
                };
                let value = optional_hash_from_cbor(&items[1])
                    .map_err(|e| CoreError::MalformedNode(format!("entry value: {}", e)))?;
                Ok(Self { key, value })
            }
            _ => Err(CoreError::MalformedNode("entry is not a pair".into())),
        }
    }
}

/// Where a key sits relative to a node's entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The key is the entry at this index.
    Found(usize),
    /// The key is absent here; it belongs before the entry at this index,
    /// which for an internal node is also the child to descend into.
    Child(usize),
}

/// An immutable B-tree node.
///
/// `hash` is the node's own content hash once it has been written; equality
/// ignores it.
#[derive(Debug, Clone)]
pub struct TreeNode {
    entries: Vec<Entry>,
    children: Vec<ContentHash>,
    hash: OptionalHash,
}

impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries && self.children == other.children
    }
}

impl Eq for TreeNode {}

impl TreeNode {
    /// The empty leaf every new tree starts from.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            children: Vec::new(),
            hash: None,
        }
    }

    /// Build a leaf. Entries must be strictly ascending by key.
    pub fn leaf(entries: Vec<Entry>) -> Result<Self> {
        Self::from_parts(entries, Vec::new())
    }

    /// Build an internal node with `entries.len() + 1` children.
    pub fn internal(entries: Vec<Entry>, children: Vec<ContentHash>) -> Result<Self> {
        if children.is_empty() {
            return Err(CoreError::MalformedNode("internal node without children".into()));
        }
        Self::from_parts(entries, children)
    }

    /// Build a leaf (no children) or an internal node, validating shape.
    pub fn from_parts(entries: Vec<Entry>, children: Vec<ContentHash>) -> Result<Self> {
        if entries.windows(2).any(|w| w[0].key >= w[1].key) {
            return Err(CoreError::MalformedNode(
                "entries not strictly ascending".into(),
            ));
        }
        if !children.is_empty() {
            if entries.is_empty() {
                return Err(CoreError::MalformedNode("internal node without entries".into()));
            }
            if children.len() != entries.len() + 1 {
                return Err(CoreError::MalformedNode(format!(
                    "{} entries but {} children",
                    entries.len(),
                    children.len()
                )));
            }
        }
        Ok(Self {
            entries,
            children,
            hash: None,
        })
    }

    /// Consume into `(entries, children)`.
    pub fn into_parts(self) -> (Vec<Entry>, Vec<ContentHash>) {
        (self.entries, self.children)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn children(&self) -> &[ContentHash] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The node's own content hash, if it has been written.
    pub fn hash(&self) -> OptionalHash {
        self.hash
    }

    /// Attach the content hash this node was stored under.
    pub fn with_hash(mut self, hash: ContentHash) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Locate `key` among this node's entries.
    pub fn search(&self, key: &[u8]) -> Slot {
        match self
            .entries
            .binary_search_by(|e| e.key.as_slice().cmp(key))
        {
            Ok(i) => Slot::Found(i),
            Err(i) => Slot::Child(i),
        }
    }

    /// Split around the median entry: `(left, median, right)`.
    ///
    /// Internal children divide so each half keeps one more child than
    /// entries. Needs at least three entries.
    pub fn split(self) -> Result<(TreeNode, Entry, TreeNode)> {
        if self.entries.len() < 3 {
            return Err(CoreError::MalformedNode(format!(
                "cannot split a node of {} entries",
                self.entries.len()
            )));
        }
        let mid = self.entries.len() / 2;
        let mut left_entries = self.entries;
        let mut right_entries = left_entries.split_off(mid);
        let median = right_entries.remove(0);

        let (left_children, right_children) = if self.children.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            let mut left_children = self.children;
            let right_children = left_children.split_off(mid + 1);
            (left_children, right_children)
        };

        Ok((
            Self::from_parts(left_entries, left_children)?,
            median,
            Self::from_parts(right_entries, right_children)?,
        ))
    }

    /// The Merkle form of this node.
    pub fn to_merkle(&self) -> Result<MerkleNode> {
        let data = encode_canonical(&Value::Array(
            self.entries.iter().map(Entry::to_cbor).collect(),
        ))?;
        let links = self
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| Link::new(child_label(i), *child))
            .collect();
        MerkleNode::new(data, links)
    }

    /// Canonical bytes; these are what the node's content hash covers.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.to_merkle()?.serialize()
    }

    /// Decode a node. The result carries no self-hash; callers that
    /// fetched it by hash attach one with [`with_hash`](Self::with_hash).
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Self::from_merkle(&MerkleNode::deserialize(bytes)?)
    }

    pub fn from_merkle(merkle: &MerkleNode) -> Result<Self> {
        let entries = match decode_value(&merkle.data)
            .map_err(|e| CoreError::MalformedNode(e.to_string()))?
        {
            Value::Array(items) => items
                .iter()
                .map(Entry::from_cbor)
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(CoreError::MalformedNode("entries are not a list".into())),
        };

        let mut children = Vec::with_capacity(merkle.links().len());
        for (i, link) in merkle.links().iter().enumerate() {
            if link.label != child_label(i) {
                return Err(CoreError::MalformedNode(format!(
                    "unexpected child label {:?} at position {}",
                    link.label, i
                )));
            }
            children.push(link.target);
        }

        Self::from_parts(entries, children)
    }
}

/// Link label for the child at `index`.
///
/// Fixed width, so byte order of labels equals child order.
pub fn child_label(index: usize) -> String {
    format!("{:04}", index)
}
