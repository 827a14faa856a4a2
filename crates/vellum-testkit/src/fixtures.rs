//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use vellum::{MerkleBTree, PublishedTree, TreeConfig};
use vellum_core::{ContentHash, CryptoContext, Keypair, SigningIdentity};
use vellum_pointers::PointerService;
use vellum_store::{HashVerifyingStorage, MemoryStore, StorageExt};

/// Store handle shared by the fixture's trees and pointer service.
pub type SharedStore = Arc<MemoryStore>;

/// A memory store, its verifying wrapper and one registered writer.
pub struct TestFixture {
    pub store: SharedStore,
    pub storage: Arc<HashVerifyingStorage<SharedStore>>,
    pub writer: SigningIdentity,
}

impl TestFixture {
    /// Fixture with the default writer seed.
    pub async fn new() -> Self {
        Self::with_seed([0x42; 32]).await
    }

    /// Fixture with a writer derived from `seed`.
    pub async fn with_seed(seed: [u8; 32]) -> Self {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(HashVerifyingStorage::new(store.clone(), CryptoContext::new()));
        let writer = register(&storage, seed).await;
        Self {
            store,
            storage,
            writer,
        }
    }

    /// Register another writer against the same store.
    pub async fn add_writer(&self, seed: [u8; 32]) -> SigningIdentity {
        register(&self.storage, seed).await
    }

    /// An empty tree owned and written by the fixture's writer.
    pub async fn tree(&self, max_children: usize) -> MerkleBTree<SharedStore> {
        MerkleBTree::create(
            &self.writer.public_hash,
            &self.writer,
            self.storage.clone(),
            TreeConfig { max_children },
        )
        .await
        .expect("create tree")
    }

    /// A pointer service over the fixture's store.
    pub fn pointer_service(&self) -> Arc<PointerService<SharedStore>> {
        Arc::new(PointerService::new(self.store.clone()))
    }

    /// Open the writer's published tree through `pointers`.
    pub async fn published(
        &self,
        writer: SigningIdentity,
        pointers: Arc<PointerService<SharedStore>>,
    ) -> PublishedTree<SharedStore, Arc<PointerService<SharedStore>>> {
        PublishedTree::open(
            self.writer.public_hash,
            writer,
            self.storage.clone(),
            pointers,
            TreeConfig::default(),
        )
        .await
        .expect("open published tree")
    }
}

async fn register(storage: &HashVerifyingStorage<SharedStore>, seed: [u8; 32]) -> SigningIdentity {
    let keypair = Keypair::from_seed(&seed);
    let id = storage
        .register_signing_key(&keypair)
        .await
        .expect("register key");
    SigningIdentity::new(id, keypair)
}

/// A distinct value hash for `n`.
pub fn value(n: u32) -> ContentHash {
    ContentHash::sha256(&n.to_be_bytes())
}
