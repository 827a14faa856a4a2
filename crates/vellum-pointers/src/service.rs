//! The mutable-pointer service: the linearization point for tree roots.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use vellum_core::{display_optional, CoreError, HashCasPair, OptionalHash, PublicKeyHash};
use vellum_store::{ContentAddressedStorage, PointerTable, StorageExt};

use crate::error::{PointerError, Result};

/// Compare-and-swap pointers, one per `(owner, writer)`.
#[async_trait]
pub trait MutablePointers: Send + Sync {
    /// Apply a signed [`HashCasPair`] from `writer`.
    ///
    /// Returns `false`, leaving state untouched, if the stored target does
    /// not equal the pair's original.
    async fn set_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
        signed: Bytes,
    ) -> Result<bool>;

    /// The most recently accepted signed payload, or `None` if never set.
    async fn get_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
    ) -> Result<Option<Bytes>>;
}

#[async_trait]
impl<M: MutablePointers + ?Sized> MutablePointers for Arc<M> {
    async fn set_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
        signed: Bytes,
    ) -> Result<bool> {
        (**self).set_pointer(owner, writer, signed).await
    }

    async fn get_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
    ) -> Result<Option<Bytes>> {
        (**self).get_pointer(owner, writer).await
    }
}

/// Authoritative pointer service backed by a store.
///
/// Verifies each payload against the writer key registered in the store,
/// then delegates the atomic swap to the store's [`PointerTable`].
pub struct PointerService<S> {
    storage: S,
}

impl<S> PointerService<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

/// Fetch `writer`'s key and open a signed pair with it.
async fn open_signed<S: ContentAddressedStorage + ?Sized>(
    storage: &S,
    writer: &PublicKeyHash,
    signed: &[u8],
) -> Result<HashCasPair> {
    let key = storage
        .get_signing_key(writer)
        .await?
        .ok_or_else(|| PointerError::Unauthorized(format!("unknown writer {}", writer)))?;
    HashCasPair::open(signed, &key).map_err(|e| match e {
        CoreError::InvalidSignature | CoreError::InvalidPublicKey => {
            PointerError::Unauthorized(format!("bad signature from writer {}", writer))
        }
        other => PointerError::Core(other),
    })
}

#[async_trait]
impl<S: ContentAddressedStorage + PointerTable> MutablePointers for PointerService<S> {
    async fn set_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
        signed: Bytes,
    ) -> Result<bool> {
        let pair = open_signed(&self.storage, writer, &signed).await?;
        let swapped = self
            .storage
            .compare_and_swap_pointer(owner, writer, pair.original(), pair.updated(), signed)
            .await?;

        if swapped {
            debug!(
                %owner, %writer,
                from = %display_optional(&pair.original()),
                to = %display_optional(&pair.updated()),
                "pointer updated"
            );
        } else {
            warn!(
                %owner, %writer,
                expected = %display_optional(&pair.original()),
                "pointer update rejected: stale original"
            );
        }
        Ok(swapped)
    }

    async fn get_pointer(
        &self,
        owner: &PublicKeyHash,
        writer: &PublicKeyHash,
    ) -> Result<Option<Bytes>> {
        Ok(self.storage.get_pointer(owner, writer).await?)
    }
}

/// Recover the current target of a pointer, verifying its signature.
///
/// `None` if the pointer was never set or was last set to absent.
pub async fn read_pointer<S, M>(
    storage: &S,
    pointers: &M,
    owner: &PublicKeyHash,
    writer: &PublicKeyHash,
) -> Result<OptionalHash>
where
    S: ContentAddressedStorage + ?Sized,
    M: MutablePointers + ?Sized,
{
    match pointers.get_pointer(owner, writer).await? {
        Some(signed) => Ok(open_signed(storage, writer, &signed).await?.updated()),
        None => Ok(None),
    }
}
