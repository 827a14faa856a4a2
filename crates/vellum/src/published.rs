//! A tree whose root is published through a mutable pointer.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use vellum_core::{ContentHash, HashCasPair, OptionalHash, PublicKeyHash, SigningIdentity};
use vellum_pointers::{read_pointer, MutablePointers};
use vellum_store::{ContentAddressedStorage, HashVerifyingStorage};

use crate::config::TreeConfig;
use crate::error::{Error, Result};
use crate::tree::MerkleBTree;

/// A [`MerkleBTree`] bound to the `(owner, writer)` pointer that names its
/// current root.
///
/// Each write builds the new tree version, then moves the pointer from the
/// old root to the new one with a signed compare-and-swap. If another
/// writer moved the pointer first, the write fails with
/// [`Error::PointerConflict`] and this handle keeps the last root it
/// published; call [`refresh`](Self::refresh) and try again.
pub struct PublishedTree<S, M> {
    tree: MerkleBTree<S>,
    pointers: M,
    owner: PublicKeyHash,
    writer: SigningIdentity,
}

impl<S: ContentAddressedStorage, M: MutablePointers> PublishedTree<S, M> {
    /// Open the tree the pointer names, creating and publishing an empty
    /// one if the pointer is unset.
    pub async fn open(
        owner: PublicKeyHash,
        writer: SigningIdentity,
        storage: Arc<HashVerifyingStorage<S>>,
        pointers: M,
        config: TreeConfig,
    ) -> Result<Self> {
        let current = read_pointer(&*storage, &pointers, &owner, &writer.public_hash).await?;
        let tree = match current {
            Some(root) => MerkleBTree::load(&root, storage, config).await?,
            None => {
                let tree = MerkleBTree::create(&owner, &writer, storage.clone(), config.clone()).await?;
                if publish(&pointers, &owner, &writer, None, tree.root_hash()).await? {
                    info!(%owner, root = %tree.root_hash(), "published new tree");
                    tree
                } else {
                    // Someone initialised it first; use theirs.
                    let root = read_pointer(&*storage, &pointers, &owner, &writer.public_hash)
                        .await?
                        .ok_or_else(|| Error::NotFound(format!("pointer for {}", owner)))?;
                    MerkleBTree::load(&root, storage, config).await?
                }
            }
        };

        Ok(Self {
            tree,
            pointers,
            owner,
            writer,
        })
    }

    pub fn tree(&self) -> &MerkleBTree<S> {
        &self.tree
    }

    pub fn owner(&self) -> &PublicKeyHash {
        &self.owner
    }

    /// The root this handle last published or loaded.
    pub fn root_hash(&self) -> ContentHash {
        self.tree.root_hash()
    }

    pub async fn get(&self, key: &[u8]) -> Result<OptionalHash> {
        self.tree.get(key).await
    }

    pub async fn size(&self) -> Result<usize> {
        self.tree.size().await
    }

    /// [`MerkleBTree::put`], then publish the new root.
    pub async fn put(
        &mut self,
        key: &[u8],
        existing: OptionalHash,
        value: ContentHash,
    ) -> Result<ContentHash> {
        let mut staged = self.tree.clone();
        staged
            .put(&self.owner, &self.writer, key, existing, value)
            .await?;
        self.advance(staged).await
    }

    /// [`MerkleBTree::remove`], then publish the new root.
    pub async fn remove(&mut self, key: &[u8], existing: OptionalHash) -> Result<ContentHash> {
        let mut staged = self.tree.clone();
        staged
            .remove(&self.owner, &self.writer, key, existing)
            .await?;
        self.advance(staged).await
    }

    /// Reload the root the pointer currently names.
    pub async fn refresh(&mut self) -> Result<ContentHash> {
        let root = read_pointer(
            &**self.tree.storage(),
            &self.pointers,
            &self.owner,
            &self.writer.public_hash,
        )
        .await?
        .ok_or_else(|| Error::NotFound(format!("pointer for {}", self.owner)))?;

        if root != self.tree.root_hash() {
            debug!(from = %self.tree.root_hash(), to = %root, "refreshed root");
            self.tree = MerkleBTree::load(&root, self.tree.storage().clone(), self.tree.config().clone()).await?;
        }
        Ok(root)
    }

    async fn advance(&mut self, staged: MerkleBTree<S>) -> Result<ContentHash> {
        let from = self.tree.root_hash();
        let to = staged.root_hash();
        if from == to {
            return Ok(to);
        }
        if !publish(&self.pointers, &self.owner, &self.writer, Some(from), to).await? {
            warn!(owner = %self.owner, expected = %from, "root moved underneath us");
            return Err(Error::PointerConflict {
                expected: Some(from),
            });
        }
        self.tree = staged;
        Ok(to)
    }
}

/// Sign `original -> updated` and submit it.
async fn publish<M: MutablePointers>(
    pointers: &M,
    owner: &PublicKeyHash,
    writer: &SigningIdentity,
    original: OptionalHash,
    updated: ContentHash,
) -> Result<bool> {
    let signed = HashCasPair::new(original, Some(updated))?.sign(writer)?;
    Ok(pointers
        .set_pointer(owner, &writer.public_hash, Bytes::from(signed))
        .await?)
}
