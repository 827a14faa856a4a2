//! In-memory implementation of the storage traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use vellum_core::{
    ContentHash, CryptoContext, Ed25519PublicKey, Ed25519Signature, OptionalHash, PublicKeyHash,
};

use crate::error::{Result, StoreError};
use crate::traits::{ContentAddressedStorage, PointerTable};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    crypto: CryptoContext,
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Blocks indexed by hash.
    blocks: HashMap<ContentHash, Bytes>,

    /// Registered signing keys.
    keys: HashMap<PublicKeyHash, Ed25519PublicKey>,

    /// Pointer rows: (owner, writer) -> (target, signed payload).
    pointers: HashMap<(PublicKeyHash, PublicKeyHash), (OptionalHash, Bytes)>,
}

impl MemoryStore {
    /// Create a new empty store under the default context.
    pub fn new() -> Self {
        Self::with_crypto(CryptoContext::new())
    }

    /// Create a new empty store hashing blocks with `crypto`'s preferred
    /// algorithm.
    pub fn with_crypto(crypto: CryptoContext) -> Self {
        Self {
            crypto,
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Overwrite the bytes stored under `hash` without rehashing.
    ///
    /// Returns false if no block is stored under `hash`. Used to simulate a
    /// faulty or malicious backend.
    pub fn replace_raw(&self, hash: &ContentHash, bytes: Bytes) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.blocks.get_mut(hash) {
            Some(slot) => {
                *slot = bytes;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Number of stored blocks, including key blocks.
    pub fn block_count(&self) -> Result<usize> {
        Ok(self.read()?.blocks.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentAddressedStorage for MemoryStore {
    async fn put(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
        signature: &Ed25519Signature,
        block: Bytes,
    ) -> Result<ContentHash> {
        let mut inner = self.write()?;

        let key = inner
            .keys
            .get(writer)
            .ok_or_else(|| StoreError::Unauthorized(format!("unknown writer {}", writer)))?;
        key.verify(&block, signature)
            .map_err(|e| StoreError::Unauthorized(format!("writer {}: {}", writer, e)))?;

        let hash = self.crypto.hash(&block);
        debug!(%owner, %hash, len = block.len(), "put block");
        inner.blocks.entry(hash).or_insert(block);
        Ok(hash)
    }

    async fn get(&self, hash: &ContentHash) -> Result<Option<Bytes>> {
        Ok(self.read()?.blocks.get(hash).cloned())
    }

    async fn put_signing_key(
        &self,
        signature: &Ed25519Signature,
        key: &Ed25519PublicKey,
    ) -> Result<PublicKeyHash> {
        let block = key.to_block()?;
        key.verify(&block, signature)
            .map_err(|e| StoreError::Unauthorized(format!("key self-signature: {}", e)))?;

        let hash = PublicKeyHash(self.crypto.hash(&block));
        let mut inner = self.write()?;
        inner.blocks.entry(hash.0).or_insert_with(|| Bytes::from(block));
        inner.keys.insert(hash, *key);
        debug!(key = %hash, "registered signing key");
        Ok(hash)
    }
}

#[async_trait]
impl PointerTable for MemoryStore {
    async fn get_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
    ) -> Result<Option<Bytes>> {
        Ok(self
            .read()?
            .pointers
            .get(&(*owner, *writer))
            .map(|(_, payload)| payload.clone()))
    }

    async fn compare_and_swap_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
        expected: OptionalHash,
        updated: OptionalHash,
        payload: Bytes,
    ) -> Result<bool> {
        let mut inner = self.write()?;
        let row = (*owner, *writer);
        let current = inner.pointers.get(&row).and_then(|(target, _)| *target);
        if current != expected {
            return Ok(false);
        }
        inner.pointers.insert(row, (updated, payload));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StorageExt;
    use vellum_core::{CryptoContext, HashAlgorithm, Keypair, SigningIdentity};

    async fn writer(store: &MemoryStore, seed: u8) -> SigningIdentity {
        let keypair = Keypair::from_seed(&[seed; 32]);
        let hash = store.register_signing_key(&keypair).await.unwrap();
        SigningIdentity::new(hash, keypair)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryStore::new();
        let w = writer(&store, 1).await;

        let hash = store
            .put_signed(&w.public_hash, &w, Bytes::from_static(b"block"))
            .await
            .unwrap();
        assert_eq!(hash, ContentHash::sha256(b"block"));
        assert_eq!(store.get(&hash).await.unwrap().unwrap(), &b"block"[..]);
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let store = MemoryStore::new();
        let w = writer(&store, 1).await;
        let h1 = store.put_signed(&w.public_hash, &w, Bytes::from_static(b"x")).await.unwrap();
        let h2 = store.put_signed(&w.public_hash, &w, Bytes::from_static(b"x")).await.unwrap();
        assert_eq!(h1, h2);
        // key block + one data block
        assert_eq!(store.block_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = MemoryStore::new();
        assert!(store.get(&ContentHash::sha256(b"nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_writer_unauthorized() {
        let store = MemoryStore::new();
        let keypair = CryptoContext::new().generate_keypair();
        let hash = keypair.public_key_hash(HashAlgorithm::Sha2_256).unwrap();
        let sig = keypair.sign(b"block");

        let result = store.put(&hash, &hash, &sig, Bytes::from_static(b"block")).await;
        assert!(matches!(result, Err(StoreError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_bad_signature_unauthorized() {
        let store = MemoryStore::new();
        let w = writer(&store, 1).await;
        let sig = w.sign(b"something else");

        let result = store
            .put(&w.public_hash, &w.public_hash, &sig, Bytes::from_static(b"block"))
            .await;
        assert!(matches!(result, Err(StoreError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_key_registration_roundtrip() {
        let store = MemoryStore::new();
        let keypair = Keypair::from_seed(&[5; 32]);
        let hash = store.register_signing_key(&keypair).await.unwrap();
        assert_eq!(hash, keypair.public_key_hash(HashAlgorithm::Sha2_256).unwrap());
        assert_eq!(
            store.get_signing_key(&hash).await.unwrap(),
            Some(keypair.public_key())
        );
    }

    #[tokio::test]
    async fn test_forged_key_registration_rejected() {
        let store = MemoryStore::new();
        let keypair = Keypair::from_seed(&[5; 32]);
        let other = Keypair::from_seed(&[6; 32]);
        let sig = other.sign(&keypair.public_key().to_block().unwrap());

        let result = store.put_signing_key(&sig, &keypair.public_key()).await;
        assert!(matches!(result, Err(StoreError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_blake3_store() {
        let store =
            MemoryStore::with_crypto(CryptoContext::new().with_preferred(HashAlgorithm::Blake3));
        let w = writer(&store, 1).await;
        let hash = store.put_signed(&w.public_hash, &w, Bytes::from_static(b"b3")).await.unwrap();
        assert_eq!(hash.algorithm(), HashAlgorithm::Blake3);
        assert!(hash.matches(b"b3"));
    }

    #[tokio::test]
    async fn test_replace_raw() {
        let store = MemoryStore::new();
        let w = writer(&store, 1).await;
        let hash = store.put_signed(&w.public_hash, &w, Bytes::from_static(b"good")).await.unwrap();

        assert!(store.replace_raw(&hash, Bytes::from_static(b"evil")).unwrap());
        assert_eq!(store.get(&hash).await.unwrap().unwrap(), &b"evil"[..]);
        assert!(!store
            .replace_raw(&ContentHash::sha256(b"absent"), Bytes::new())
            .unwrap());
    }

    #[tokio::test]
    async fn test_pointer_cas() {
        let store = MemoryStore::new();
        let owner = PublicKeyHash(ContentHash::sha256(b"owner"));
        let w = PublicKeyHash(ContentHash::sha256(b"writer"));
        let h1 = ContentHash::sha256(b"root1");
        let h2 = ContentHash::sha256(b"root2");

        assert!(store.get_pointer(&owner, &w).await.unwrap().is_none());

        assert!(store
            .compare_and_swap_pointer(&owner, &w, None, Some(h1), Bytes::from_static(b"p1"))
            .await
            .unwrap());
        // Stale expectation
        assert!(!store
            .compare_and_swap_pointer(&owner, &w, None, Some(h2), Bytes::from_static(b"p2"))
            .await
            .unwrap());
        assert_eq!(store.get_pointer(&owner, &w).await.unwrap().unwrap(), &b"p1"[..]);

        assert!(store
            .compare_and_swap_pointer(&owner, &w, Some(h1), Some(h2), Bytes::from_static(b"p2"))
            .await
            .unwrap());
        assert_eq!(store.get_pointer(&owner, &w).await.unwrap().unwrap(), &b"p2"[..]);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn put_is_content_deterministic(data in proptest::collection::vec(any::<u8>(), 0..256)) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                rt.block_on(async {
                    let store = MemoryStore::new();
                    let w = writer(&store, 9).await;
                    let a = store.put_signed(&w.public_hash, &w, Bytes::from(data.clone())).await.unwrap();
                    let b = store.put_signed(&w.public_hash, &w, Bytes::from(data.clone())).await.unwrap();
                    assert_eq!(a, b);
                    assert!(a.matches(&data));
                });
            }
        }
    }
}
