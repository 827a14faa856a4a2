//! Storage traits: the abstract interface for blocks and pointers.
//!
//! The tree and the pointer service are written against these traits so
//! they stay storage-agnostic. Implementations include SQLite (primary),
//! in-memory (for tests), and the hash-verifying decorator.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use vellum_core::{
    ContentHash, Ed25519PublicKey, Ed25519Signature, Keypair, OptionalHash, PublicKeyHash,
    SigningIdentity,
};

use crate::error::{Result, StoreError};

/// A content-addressed block store.
///
/// The key of every block is the hash of its bytes, so re-putting existing
/// bytes is a no-op that returns the same hash.
#[async_trait]
pub trait ContentAddressedStorage: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Block Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Store `block`, signed by `writer`, under `owner`.
    ///
    /// Fails with `Unauthorized` if `writer` is not a registered key or the
    /// signature does not verify over `block`.
    async fn put(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
        signature: &Ed25519Signature,
        block: Bytes,
    ) -> Result<ContentHash>;

    /// Fetch a block. Absent blocks are `Ok(None)`.
    async fn get(&self, hash: &ContentHash) -> Result<Option<Bytes>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Key Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a public key block self-signed by its own secret key.
    ///
    /// Returns the key's identity: the hash of its block.
    async fn put_signing_key(
        &self,
        signature: &Ed25519Signature,
        key: &Ed25519PublicKey,
    ) -> Result<PublicKeyHash>;
}

/// Persistent `(owner, writer) -> pointer` state.
///
/// Each row holds the current target hash and the signed payload that set
/// it. The swap is atomic with respect to all other calls on the table.
#[async_trait]
pub trait PointerTable: Send + Sync {
    /// The latest accepted signed payload, if any.
    async fn get_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
    ) -> Result<Option<Bytes>>;

    /// Store `updated` and `payload` iff the current target equals `expected`.
    ///
    /// A pointer that was never set has target `None`.
    async fn compare_and_swap_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
        expected: OptionalHash,
        updated: OptionalHash,
        payload: Bytes,
    ) -> Result<bool>;
}

/// Extension trait for common storage patterns.
pub trait StorageExt: ContentAddressedStorage {
    /// Look up and decode a registered public key.
    fn get_signing_key(
        &self,
        hash: &PublicKeyHash,
    ) -> impl std::future::Future<Output = Result<Option<Ed25519PublicKey>>> + Send;

    /// Self-sign and store `keypair`'s public key, returning its identity.
    fn register_signing_key(
        &self,
        keypair: &Keypair,
    ) -> impl std::future::Future<Output = Result<PublicKeyHash>> + Send;

    /// Sign `block` as `writer` and store it.
    fn put_signed(
        &self,
        owner: &PublicKeyHash,
        writer: &SigningIdentity,
        block: Bytes,
    ) -> impl std::future::Future<Output = Result<ContentHash>> + Send;
}

impl<S: ContentAddressedStorage + ?Sized> StorageExt for S {
    async fn get_signing_key(&self, hash: &PublicKeyHash) -> Result<Option<Ed25519PublicKey>> {
        match self.get(hash.hash()).await? {
            Some(block) => Ed25519PublicKey::from_block(&block)
                .map(Some)
                .map_err(|e| StoreError::InvalidData(format!("key block {}: {}", hash, e))),
            None => Ok(None),
        }
    }

    async fn register_signing_key(&self, keypair: &Keypair) -> Result<PublicKeyHash> {
        let signature = keypair.sign_own_key()?;
        self.put_signing_key(&signature, &keypair.public_key()).await
    }

    async fn put_signed(
        &self,
        owner: &PublicKeyHash,
        writer: &SigningIdentity,
        block: Bytes,
    ) -> Result<ContentHash> {
        let signature = writer.sign(&block);
        self.put(owner, &writer.public_hash, &signature, block).await
    }
}

#[async_trait]
impl<S: ContentAddressedStorage + ?Sized> ContentAddressedStorage for Arc<S> {
    async fn put(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
        signature: &Ed25519Signature,
        block: Bytes,
    ) -> Result<ContentHash> {
        (**self).put(owner, writer, signature, block).await
    }

    async fn get(&self, hash: &ContentHash) -> Result<Option<Bytes>> {
        (**self).get(hash).await
    }

    async fn put_signing_key(
        &self,
        signature: &Ed25519Signature,
        key: &Ed25519PublicKey,
    ) -> Result<PublicKeyHash> {
        (**self).put_signing_key(signature, key).await
    }
}

#[async_trait]
impl<P: PointerTable + ?Sized> PointerTable for Arc<P> {
    async fn get_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
    ) -> Result<Option<Bytes>> {
        (**self).get_pointer(owner, writer).await
    }

    async fn compare_and_swap_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
        expected: OptionalHash,
        updated: OptionalHash,
        payload: Bytes,
    ) -> Result<bool> {
        (**self)
            .compare_and_swap_pointer(owner, writer, expected, updated, payload)
            .await
    }
}
