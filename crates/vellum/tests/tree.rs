//! Integration tests for the Merkle B-tree.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use proptest::prelude::*;

use vellum::core::{ContentHash, CryptoContext, HashAlgorithm, Keypair, SigningIdentity, TreeNode};
use vellum::store::{ContentAddressedStorage, HashVerifyingStorage, MemoryStore, SqliteStore, StorageExt};
use vellum::{Error, MerkleBTree, TreeConfig};
use vellum_testkit::fixtures::{SharedStore, TestFixture};
use vellum_testkit::generators::{apply_to_model, ops, Op};
use vellum_testkit::value;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn keys_in_order(tree: &MerkleBTree<SharedStore>) -> Vec<Vec<u8>> {
    tree.apply_to_all_mappings(Vec::new(), |mut acc, k, _| {
        acc.push(k.to_vec());
        acc
    })
    .await
    .unwrap()
}

/// Walk every node; check occupancy, child counts and leaf depth.
async fn check_shape<S: ContentAddressedStorage>(tree: &MerkleBTree<S>) {
    let config = tree.config();
    let mut leaf_depth = None;
    let mut stack = vec![(tree.root().clone(), 0usize)];
    while let Some((node, depth)) = stack.pop() {
        if depth > 0 {
            assert!(node.len() >= config.min_entries(), "underfull node at depth {}", depth);
        }
        assert!(node.len() < config.max_children, "overfull node at depth {}", depth);
        assert!(node.entries().iter().all(|e| e.value.is_some()));

        if node.is_leaf() {
            match leaf_depth {
                None => leaf_depth = Some(depth),
                Some(d) => assert_eq!(d, depth, "leaves at different depths"),
            }
            continue;
        }
        assert_eq!(node.children().len(), node.len() + 1);
        for child in node.children() {
            let bytes = tree.storage().get(child).await.unwrap().unwrap();
            stack.push((TreeNode::deserialize(&bytes).unwrap(), depth + 1));
        }
    }
}

#[tokio::test]
async fn test_conditional_put_and_remove() {
    init_tracing();
    let f = TestFixture::new().await;
    let mut tree = f.tree(16).await;
    let o = f.writer.public_hash;

    tree.put(&o, &f.writer, b"a", None, value(1)).await.unwrap();
    tree.put(&o, &f.writer, b"a", Some(value(1)), value(2)).await.unwrap();
    assert_eq!(tree.get(b"a").await.unwrap(), Some(value(2)));

    // Stale expectations fail and change nothing
    let root = tree.root_hash();
    let err = tree
        .put(&o, &f.writer, b"a", Some(value(1)), value(3))
        .await
        .unwrap_err();
    match err {
        Error::CasMismatch {
            key,
            expected,
            actual,
        } => {
            assert_eq!(key, b"a".to_vec());
            assert_eq!(expected, Some(value(1)));
            assert_eq!(actual, Some(value(2)));
        }
        other => panic!("expected CAS mismatch, got {:?}", other),
    }
    assert!(matches!(
        tree.remove(&o, &f.writer, b"a", None).await,
        Err(Error::CasMismatch { .. })
    ));
    assert_eq!(tree.root_hash(), root);

    tree.remove(&o, &f.writer, b"a", Some(value(2))).await.unwrap();
    assert_eq!(tree.get(b"a").await.unwrap(), None);
}

#[tokio::test]
async fn test_remove_then_reinsert_restores_size() {
    init_tracing();
    let f = TestFixture::new().await;
    let mut tree = f.tree(4).await;
    let o = f.writer.public_hash;

    for i in 0..30u32 {
        tree.put(&o, &f.writer, &i.to_be_bytes(), None, value(i)).await.unwrap();
    }
    let size = tree.size().await.unwrap();
    assert_eq!(size, 30);

    // Keys from the root and from a leaf
    let internal = tree.root().entries()[0].key.clone();
    for key in [internal, 29u32.to_be_bytes().to_vec()] {
        let stored = tree.get(&key).await.unwrap();
        assert!(stored.is_some());

        tree.remove(&o, &f.writer, &key, stored).await.unwrap();
        assert_eq!(tree.get(&key).await.unwrap(), None);
        assert_eq!(tree.size().await.unwrap(), size - 1);
        check_shape(&tree).await;

        tree.put(&o, &f.writer, &key, None, stored.unwrap()).await.unwrap();
        assert_eq!(tree.get(&key).await.unwrap(), stored);
        assert_eq!(tree.size().await.unwrap(), size);
        check_shape(&tree).await;
    }
}

#[tokio::test]
async fn test_sixteen_inserts_split_the_root() {
    init_tracing();
    let f = TestFixture::new().await;
    let mut tree = f.tree(16).await;
    let o = f.writer.public_hash;

    for i in 0..15u32 {
        let key = format!("key-{:02}", i);
        tree.put(&o, &f.writer, key.as_bytes(), None, value(i)).await.unwrap();
    }
    assert!(tree.root().is_leaf());
    assert_eq!(tree.root().len(), 15);

    tree.put(&o, &f.writer, b"key-15", None, value(15)).await.unwrap();
    assert_eq!(tree.root().len(), 1);
    assert_eq!(tree.root().children().len(), 2);
    assert_eq!(tree.root().entries()[0].key, b"key-08".to_vec());

    assert_eq!(tree.size().await.unwrap(), 16);
    for i in 0..16u32 {
        let key = format!("key-{:02}", i);
        assert_eq!(tree.get(key.as_bytes()).await.unwrap(), Some(value(i)));
    }
    check_shape(&tree).await;
}

#[tokio::test]
async fn test_deep_tree_shrinks_back() {
    init_tracing();
    let f = TestFixture::new().await;
    let mut tree = f.tree(3).await;
    let o = f.writer.public_hash;

    for i in 0..100u32 {
        tree.put(&o, &f.writer, &i.to_be_bytes(), None, value(i)).await.unwrap();
    }
    check_shape(&tree).await;
    assert_eq!(tree.size().await.unwrap(), 100);

    // Remove from the middle outwards to exercise both siblings
    for i in (0..100u32).filter(|i| i % 2 == 0).chain((0..100u32).filter(|i| i % 2 == 1)) {
        tree.remove(&o, &f.writer, &i.to_be_bytes(), Some(value(i))).await.unwrap();
        check_shape(&tree).await;
    }
    assert!(tree.root().is_leaf());
    assert!(tree.root().is_empty());
}

#[tokio::test]
async fn test_old_roots_stay_readable() {
    let f = TestFixture::new().await;
    let mut tree = f.tree(4).await;
    let o = f.writer.public_hash;

    for i in 0..10u32 {
        tree.put(&o, &f.writer, &i.to_be_bytes(), None, value(i)).await.unwrap();
    }
    let before = tree.root_hash();
    tree.remove(&o, &f.writer, &3u32.to_be_bytes(), Some(value(3))).await.unwrap();
    tree.put(&o, &f.writer, &3u32.to_be_bytes(), None, value(33)).await.unwrap();

    let old = MerkleBTree::load(&before, f.storage.clone(), TreeConfig { max_children: 4 })
        .await
        .unwrap();
    assert_eq!(old.get(&3u32.to_be_bytes()).await.unwrap(), Some(value(3)));
    assert_eq!(tree.get(&3u32.to_be_bytes()).await.unwrap(), Some(value(33)));
}

#[tokio::test]
async fn test_mappings_visit_in_key_order() {
    let f = TestFixture::new().await;
    let mut tree = f.tree(4).await;
    let o = f.writer.public_hash;

    let keys: [&[u8]; 6] = [b"pear", b"apple", b"", b"\xff", b"fig", b"banana"];
    for (i, k) in keys.iter().enumerate() {
        tree.put(&o, &f.writer, k, None, value(i as u32)).await.unwrap();
    }
    let mut expected: Vec<Vec<u8>> = keys.iter().map(|k| k.to_vec()).collect();
    expected.sort();
    assert_eq!(keys_in_order(&tree).await, expected);
}

#[tokio::test]
async fn test_corrupted_block_is_integrity_violation() {
    init_tracing();
    let f = TestFixture::new().await;
    let mut tree = f.tree(4).await;
    let o = f.writer.public_hash;

    for i in 0..4u32 {
        tree.put(&o, &f.writer, &i.to_be_bytes(), None, value(i)).await.unwrap();
    }
    let left = tree.root().children()[0];
    assert!(f.store.replace_raw(&left, Bytes::from_static(b"tampered")).unwrap());

    let err = tree.get(&0u32.to_be_bytes()).await.unwrap_err();
    assert!(matches!(err, Error::IntegrityViolation { expected, .. } if expected == left));
    assert!(!err.is_retryable());

    // Writes through the corrupted node fail before touching the root
    let root = tree.root_hash();
    assert!(tree
        .put(&o, &f.writer, &1u32.to_be_bytes(), Some(value(1)), value(9))
        .await
        .is_err());
    assert_eq!(tree.root_hash(), root);

    // Other subtrees are unaffected
    assert_eq!(tree.get(&3u32.to_be_bytes()).await.unwrap(), Some(value(3)));
}

#[tokio::test]
async fn test_load_errors() {
    let f = TestFixture::new().await;
    let config = TreeConfig::default();

    let missing = ContentHash::sha256(b"never stored");
    assert!(matches!(
        MerkleBTree::load(&missing, f.storage.clone(), config.clone()).await,
        Err(Error::NotFound(_))
    ));

    let junk = f
        .storage
        .put_signed(&f.writer.public_hash, &f.writer, Bytes::from_static(b"\x82\x01\x02"))
        .await
        .unwrap();
    assert!(matches!(
        MerkleBTree::load(&junk, f.storage.clone(), config).await,
        Err(Error::MalformedNode(_))
    ));

    assert!(matches!(
        MerkleBTree::create(
            &f.writer.public_hash,
            &f.writer,
            f.storage.clone(),
            TreeConfig { max_children: 2 }
        )
        .await,
        Err(Error::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_roots_use_preferred_algorithm() {
    let keypair = Keypair::from_seed(&[5; 32]);
    let blake3 = CryptoContext::new().with_preferred(HashAlgorithm::Blake3);

    // A verifier that never opted in rejects what a blake3 backend returns
    let strict = HashVerifyingStorage::new(MemoryStore::with_crypto(blake3.clone()), CryptoContext::new());
    let err: Error = strict.register_signing_key(&keypair).await.unwrap_err().into();
    assert!(matches!(err, Error::UnsupportedAlgorithm(_)));

    let storage = Arc::new(HashVerifyingStorage::new(MemoryStore::with_crypto(blake3.clone()), blake3));
    let id = storage.register_signing_key(&keypair).await.unwrap();
    let writer = SigningIdentity::new(id, keypair);
    let mut tree = MerkleBTree::create(&id, &writer, storage, TreeConfig::default())
        .await
        .unwrap();
    assert_eq!(tree.root_hash().algorithm(), HashAlgorithm::Blake3);

    let root = tree.put(&id, &writer, b"k", None, value(1)).await.unwrap();
    assert_eq!(root.algorithm(), HashAlgorithm::Blake3);
    assert_eq!(tree.get(b"k").await.unwrap(), Some(value(1)));

    // And the sqlite backend follows the same context
    let keypair = Keypair::from_seed(&[6; 32]);
    let crypto = CryptoContext::new().with_preferred(HashAlgorithm::Blake3);
    let sqlite = SqliteStore::open_memory().unwrap().with_crypto(crypto.clone());
    let storage = Arc::new(HashVerifyingStorage::new(sqlite, crypto));
    let id = storage.register_signing_key(&keypair).await.unwrap();
    let writer = SigningIdentity::new(id, keypair);
    let tree = MerkleBTree::create(&id, &writer, storage, TreeConfig::default())
        .await
        .unwrap();
    assert_eq!(tree.root_hash().algorithm(), HashAlgorithm::Blake3);
}

#[tokio::test]
async fn test_sqlite_backed_tree_survives_reopen() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tree.db");
    let keypair = Keypair::from_seed(&[8; 32]);

    let root = {
        let storage = Arc::new(HashVerifyingStorage::new(SqliteStore::open(&path).unwrap(), CryptoContext::new()));
        let id = storage.register_signing_key(&keypair).await.unwrap();
        let writer = SigningIdentity::new(id, Keypair::from_seed(&[8; 32]));
        let mut tree = MerkleBTree::create(&id, &writer, storage, TreeConfig { max_children: 4 })
            .await
            .unwrap();
        for i in 0..20u32 {
            tree.put(&id, &writer, &i.to_be_bytes(), None, value(i)).await.unwrap();
        }
        tree.root_hash()
    };

    let storage = Arc::new(HashVerifyingStorage::new(SqliteStore::open(&path).unwrap(), CryptoContext::new()));
    let tree = MerkleBTree::load(&root, storage, TreeConfig { max_children: 4 })
        .await
        .unwrap();
    assert_eq!(tree.size().await.unwrap(), 20);
    assert_eq!(tree.get(&7u32.to_be_bytes()).await.unwrap(), Some(value(7)));
    check_shape(&tree).await;
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

/// Replay `script` against a tree and a `BTreeMap`, then compare.
async fn replay(max_children: usize, script: Vec<Op>) {
    let f = TestFixture::new().await;
    let mut tree = f.tree(max_children).await;
    let o = f.writer.public_hash;
    let mut model = BTreeMap::new();

    for op in &script {
        let key = match op {
            Op::Put(k, _) | Op::Remove(k) => k.clone(),
        };
        let existing = model.get(&key).copied();
        match op {
            Op::Put(_, v) => tree.put(&o, &f.writer, &key, existing, value(*v)).await.unwrap(),
            Op::Remove(_) => tree.remove(&o, &f.writer, &key, existing).await.unwrap(),
        };
        apply_to_model(&mut model, op, value);
    }

    let pairs = tree
        .apply_to_all_mappings(Vec::new(), |mut acc, k, v| {
            acc.push((k.to_vec(), *v));
            acc
        })
        .await
        .unwrap();
    let expected: Vec<_> = model.iter().map(|(k, v)| (k.clone(), *v)).collect();
    assert_eq!(pairs, expected);
    assert_eq!(tree.size().await.unwrap(), model.len());
    for (k, v) in &model {
        assert_eq!(tree.get(k).await.unwrap(), Some(*v));
    }
    check_shape(&tree).await;
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn tree_matches_model_m3(script in ops(80)) {
        block_on(replay(3, script));
    }

    #[test]
    fn tree_matches_model_m4(script in ops(80)) {
        block_on(replay(4, script));
    }

    #[test]
    fn tree_matches_model_m16(script in ops(120)) {
        block_on(replay(16, script));
    }
}
