//! SQLite implementation of the storage traits.
//!
//! This is the primary storage backend for Vellum. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use vellum_core::{
    ContentHash, CryptoContext, Ed25519PublicKey, Ed25519Signature, OptionalHash, PublicKeyHash,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{ContentAddressedStorage, PointerTable};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// New blocks are hashed with this context's preferred algorithm.
    crypto: CryptoContext,
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            crypto: CryptoContext::new(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            crypto: CryptoContext::new(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Hash new blocks with `crypto`'s preferred algorithm.
    pub fn with_crypto(mut self, crypto: CryptoContext) -> Self {
        self.crypto = crypto;
        self
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|e| {
        StoreError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            Some(format!("mutex poisoned: {}", e)),
        ))
    })
}

fn decode_hash(bytes: &[u8]) -> Result<ContentHash> {
    ContentHash::from_bytes(bytes).map_err(|e| StoreError::InvalidData(e.to_string()))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Look up a registered key by its identity.
fn load_key(conn: &Connection, writer: &PublicKeyHash) -> Result<Option<Ed25519PublicKey>> {
    let raw: Option<Vec<u8>> = conn
        .query_row(
            "SELECT public_key FROM signing_keys WHERE key_hash = ?1",
            params![writer.hash().to_bytes()],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|bytes| {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| StoreError::InvalidData(format!("key {} has wrong length", writer)))?;
        Ok(Ed25519PublicKey(arr))
    })
    .transpose()
}

#[async_trait]
impl ContentAddressedStorage for SqliteStore {
    async fn put(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
        signature: &Ed25519Signature,
        block: Bytes,
    ) -> Result<ContentHash> {
        let owner = *owner;
        let writer = *writer;
        let signature = *signature;
        let crypto = self.crypto.clone();

        self.run(move |conn| {
            let key = load_key(conn, &writer)?
                .ok_or_else(|| StoreError::Unauthorized(format!("unknown writer {}", writer)))?;
            key.verify(&block, &signature)
                .map_err(|e| StoreError::Unauthorized(format!("writer {}: {}", writer, e)))?;

            let hash = crypto.hash(&block);
            conn.execute(
                "INSERT OR IGNORE INTO blocks (hash, data, owner, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    hash.to_bytes(),
                    &block[..],
                    owner.hash().to_bytes(),
                    now_millis()
                ],
            )?;
            debug!(%owner, %hash, len = block.len(), "put block");
            Ok(hash)
        })
        .await
    }

    async fn get(&self, hash: &ContentHash) -> Result<Option<Bytes>> {
        let key = hash.to_bytes();
        self.run(move |conn| {
            let data: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT data FROM blocks WHERE hash = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(data.map(Bytes::from))
        })
        .await
    }

    async fn put_signing_key(
        &self,
        signature: &Ed25519Signature,
        key: &Ed25519PublicKey,
    ) -> Result<PublicKeyHash> {
        let block = key.to_block()?;
        key.verify(&block, signature)
            .map_err(|e| StoreError::Unauthorized(format!("key self-signature: {}", e)))?;

        let key = *key;
        let hash = PublicKeyHash(self.crypto.hash(&block));
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO blocks (hash, data, owner, created_at)
                 VALUES (?1, ?2, ?1, ?3)",
                params![hash.hash().to_bytes(), block, now_millis()],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO signing_keys (key_hash, public_key) VALUES (?1, ?2)",
                params![hash.hash().to_bytes(), key.as_bytes().as_slice()],
            )?;
            tx.commit()?;
            debug!(key = %hash, "registered signing key");
            Ok(hash)
        })
        .await
    }
}

#[async_trait]
impl PointerTable for SqliteStore {
    async fn get_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
    ) -> Result<Option<Bytes>> {
        let owner = owner.hash().to_bytes();
        let writer = writer.hash().to_bytes();
        self.run(move |conn| {
            let payload: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT payload FROM pointers WHERE owner = ?1 AND writer = ?2",
                    params![owner, writer],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(payload.map(Bytes::from))
        })
        .await
    }

    async fn compare_and_swap_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
        expected: OptionalHash,
        updated: OptionalHash,
        payload: Bytes,
    ) -> Result<bool> {
        let owner = owner.hash().to_bytes();
        let writer = writer.hash().to_bytes();
        self.run(move |conn| {
            let tx = conn.transaction()?;

            let target: Option<Option<Vec<u8>>> = tx
                .query_row(
                    "SELECT target FROM pointers WHERE owner = ?1 AND writer = ?2",
                    params![owner, writer],
                    |row| row.get(0),
                )
                .optional()?;
            let current = target
                .flatten()
                .map(|bytes| decode_hash(&bytes))
                .transpose()?;

            if current != expected {
                return Ok(false);
            }

            tx.execute(
                "INSERT OR REPLACE INTO pointers (owner, writer, target, payload, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    owner,
                    writer,
                    updated.map(|h| h.to_bytes()),
                    &payload[..],
                    now_millis()
                ],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StorageExt;
    use vellum_core::{HashAlgorithm, Keypair, SigningIdentity};

    async fn writer(store: &SqliteStore, seed: u8) -> SigningIdentity {
        let keypair = Keypair::from_seed(&[seed; 32]);
        let hash = store.register_signing_key(&keypair).await.unwrap();
        SigningIdentity::new(hash, keypair)
    }

    #[tokio::test]
    async fn test_put_and_get_block() {
        let store = SqliteStore::open_memory().unwrap();
        let w = writer(&store, 1).await;

        let hash = store
            .put_signed(&w.public_hash, &w, Bytes::from_static(b"node bytes"))
            .await
            .unwrap();
        assert_eq!(hash, ContentHash::sha256(b"node bytes"));
        assert_eq!(store.get(&hash).await.unwrap().unwrap(), &b"node bytes"[..]);

        // Idempotent
        let again = store
            .put_signed(&w.public_hash, &w, Bytes::from_static(b"node bytes"))
            .await
            .unwrap();
        assert_eq!(hash, again);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.get(&ContentHash::sha256(b"x")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unregistered_writer_rejected() {
        let store = SqliteStore::open_memory().unwrap();
        let keypair = Keypair::from_seed(&[2; 32]);
        let id = keypair.public_key_hash(HashAlgorithm::Sha2_256).unwrap();
        let sig = keypair.sign(b"data");

        let result = store.put(&id, &id, &sig, Bytes::from_static(b"data")).await;
        assert!(matches!(result, Err(StoreError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_signing_key_lookup() {
        let store = SqliteStore::open_memory().unwrap();
        let w = writer(&store, 3).await;
        assert_eq!(
            store.get_signing_key(&w.public_hash).await.unwrap(),
            Some(w.keypair.public_key())
        );
    }

    #[tokio::test]
    async fn test_pointer_cas() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = PublicKeyHash(ContentHash::sha256(b"owner"));
        let w = PublicKeyHash(ContentHash::sha256(b"writer"));
        let h1 = ContentHash::sha256(b"r1");
        let h2 = ContentHash::sha256(b"r2");

        assert!(store.get_pointer(&owner, &w).await.unwrap().is_none());
        assert!(store
            .compare_and_swap_pointer(&owner, &w, None, Some(h1), Bytes::from_static(b"a"))
            .await
            .unwrap());
        assert!(!store
            .compare_and_swap_pointer(&owner, &w, Some(h2), Some(h1), Bytes::from_static(b"b"))
            .await
            .unwrap());
        assert!(store
            .compare_and_swap_pointer(&owner, &w, Some(h1), Some(h2), Bytes::from_static(b"c"))
            .await
            .unwrap());
        assert_eq!(store.get_pointer(&owner, &w).await.unwrap().unwrap(), &b"c"[..]);

        // Clearing the pointer keeps the payload that cleared it
        assert!(store
            .compare_and_swap_pointer(&owner, &w, Some(h2), None, Bytes::from_static(b"d"))
            .await
            .unwrap());
        assert_eq!(store.get_pointer(&owner, &w).await.unwrap().unwrap(), &b"d"[..]);
        assert!(store
            .compare_and_swap_pointer(&owner, &w, None, Some(h1), Bytes::from_static(b"e"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vellum.db");

        let hash = {
            let store = SqliteStore::open(&path).unwrap();
            let w = writer(&store, 4).await;
            store
                .put_signed(&w.public_hash, &w, Bytes::from_static(b"durable"))
                .await
                .unwrap()
        };

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get(&hash).await.unwrap().unwrap(), &b"durable"[..]);
        // Registered keys survive too
        let w = writer(&store, 4).await;
        store
            .put_signed(&w.public_hash, &w, Bytes::from_static(b"more"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_blake3_blocks() {
        let store = SqliteStore::open_memory()
            .unwrap()
            .with_crypto(CryptoContext::new().with_preferred(HashAlgorithm::Blake3));
        let w = writer(&store, 5).await;
        assert_eq!(w.public_hash.hash().algorithm(), HashAlgorithm::Blake3);
        let hash = store
            .put_signed(&w.public_hash, &w, Bytes::from_static(b"b3"))
            .await
            .unwrap();
        assert_eq!(hash, ContentHash::compute(HashAlgorithm::Blake3, b"b3"));
    }
}
