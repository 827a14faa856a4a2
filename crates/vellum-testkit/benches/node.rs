use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vellum_core::{ContentHash, Entry, TreeNode};

fn full_leaf() -> TreeNode {
    let entries = (0..15u32)
        .map(|i| Entry::new(format!("key-{:04}", i), Some(ContentHash::sha256(&i.to_be_bytes()))))
        .collect();
    TreeNode::leaf(entries).unwrap()
}

fn full_internal() -> TreeNode {
    let (entries, _) = full_leaf().into_parts();
    let children = (0..16u32)
        .map(|i| ContentHash::sha256(format!("child-{}", i).as_bytes()))
        .collect();
    TreeNode::internal(entries, children).unwrap()
}

fn bench_nodes(c: &mut Criterion) {
    let leaf = full_leaf();
    let internal = full_internal();
    let leaf_bytes = leaf.serialize().unwrap();
    let internal_bytes = internal.serialize().unwrap();

    c.bench_function("serialize leaf", |b| b.iter(|| black_box(&leaf).serialize().unwrap()));
    c.bench_function("serialize internal", |b| {
        b.iter(|| black_box(&internal).serialize().unwrap())
    });
    c.bench_function("deserialize leaf", |b| {
        b.iter(|| TreeNode::deserialize(black_box(&leaf_bytes)).unwrap())
    });
    c.bench_function("deserialize internal", |b| {
        b.iter(|| TreeNode::deserialize(black_box(&internal_bytes)).unwrap())
    });
    c.bench_function("hash internal", |b| {
        b.iter(|| ContentHash::sha256(black_box(&internal_bytes)))
    });
}

criterion_group!(benches, bench_nodes);
criterion_main!(benches);
