//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use vellum_core::{ContentHash, Entry, HashAlgorithm, TreeNode};

/// Generate a content hash under either supported algorithm.
pub fn content_hash() -> impl Strategy<Value = ContentHash> {
    (any::<bool>(), any::<[u8; 32]>()).prop_map(|(blake, seed)| {
        let alg = if blake {
            HashAlgorithm::Blake3
        } else {
            HashAlgorithm::Sha2_256
        };
        ContentHash::compute(alg, &seed)
    })
}

/// Generate a short key from a small alphabet, so scripts revisit keys.
pub fn key() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(vec![b'a', b'b', b'c', 0x00, 0xff]), 0..4)
}

/// Generate a valid leaf: strictly ascending keys, some values absent.
pub fn leaf_node(max_entries: usize) -> impl Strategy<Value = TreeNode> {
    prop::collection::btree_map(
        prop::collection::vec(any::<u8>(), 0..12),
        prop::option::of(content_hash()),
        0..=max_entries,
    )
    .prop_map(|map| {
        let entries = map.into_iter().map(|(k, v)| Entry::new(k, v)).collect();
        TreeNode::leaf(entries).expect("sorted keys")
    })
}

/// One step of an edit script.
#[derive(Debug, Clone)]
pub enum Op {
    Put(Vec<u8>, u32),
    Remove(Vec<u8>),
}

/// Generate an edit script of up to `max_len` steps.
pub fn ops(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        3 => (key(), any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        1 => key().prop_map(Op::Remove),
    ];
    prop::collection::vec(op, 0..=max_len)
}

/// Apply `op` to a reference map, returning the previous value.
pub fn apply_to_model(
    model: &mut BTreeMap<Vec<u8>, ContentHash>,
    op: &Op,
    value: impl Fn(u32) -> ContentHash,
) -> Option<ContentHash> {
    match op {
        Op::Put(k, v) => model.insert(k.clone(), value(*v)),
        Op::Remove(k) => model.remove(k),
    }
}
