//! Hash-verifying storage decorator.
//!
//! [`HashVerifyingStorage`] recomputes the digest of every block it returns
//! or writes and rejects any that do not match the hash they travel under.
//! It catches storage bugs and a backend that lies about content alike.
//! No caching, no retry.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;

use vellum_core::{
    ContentHash, CryptoContext, Ed25519PublicKey, Ed25519Signature, OptionalHash, PublicKeyHash,
};

use crate::error::{Result, StoreError};
use crate::traits::{ContentAddressedStorage, PointerTable};

/// Wraps a store and verifies every hash that crosses it.
pub struct HashVerifyingStorage<S> {
    inner: S,
    crypto: CryptoContext,
}

impl<S> HashVerifyingStorage<S> {
    pub fn new(inner: S, crypto: CryptoContext) -> Self {
        Self { inner, crypto }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn crypto(&self) -> &CryptoContext {
        &self.crypto
    }

    /// Check that `data` hashes to `claimed` under `claimed`'s algorithm.
    pub fn verify(&self, claimed: &ContentHash, data: &[u8]) -> Result<()> {
        self.check_algorithm(claimed)?;
        let actual = self.crypto.recompute(claimed, data)?;
        if actual != *claimed {
            warn!(expected = %claimed, %actual, "block failed hash verification");
            return Err(StoreError::Integrity {
                expected: *claimed,
                actual,
            });
        }
        Ok(())
    }

    fn check_algorithm(&self, hash: &ContentHash) -> Result<()> {
        let algorithm = hash.algorithm();
        if !self.crypto.supports(algorithm) {
            return Err(StoreError::UnsupportedAlgorithm(algorithm.name().to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: ContentAddressedStorage> ContentAddressedStorage for HashVerifyingStorage<S> {
    async fn put(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
        signature: &Ed25519Signature,
        block: Bytes,
    ) -> Result<ContentHash> {
        let hash = self
            .inner
            .put(owner, writer, signature, block.clone())
            .await?;
        self.verify(&hash, &block)?;
        Ok(hash)
    }

    async fn get(&self, hash: &ContentHash) -> Result<Option<Bytes>> {
        self.check_algorithm(hash)?;
        match self.inner.get(hash).await? {
            Some(block) => {
                self.verify(hash, &block)?;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    async fn put_signing_key(
        &self,
        signature: &Ed25519Signature,
        key: &Ed25519PublicKey,
    ) -> Result<PublicKeyHash> {
        let hash = self.inner.put_signing_key(signature, key).await?;
        self.verify(hash.hash(), &key.to_block()?)?;
        Ok(hash)
    }
}

#[async_trait]
impl<S: PointerTable> PointerTable for HashVerifyingStorage<S> {
    async fn get_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
    ) -> Result<Option<Bytes>> {
        self.inner.get_pointer(owner, writer).await
    }

    async fn compare_and_swap_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
        expected: OptionalHash,
        updated: OptionalHash,
        payload: Bytes,
    ) -> Result<bool> {
        self.inner
            .compare_and_swap_pointer(owner, writer, expected, updated, payload)
            .await
    }
}
