//! # Vellum
//!
//! A persistent, content-addressed key-value map: a Merkle B-tree whose
//! nodes live in a content-addressed block store and whose current root is
//! published through a signed, compare-and-swap pointer.
//!
//! ## Overview
//!
//! - **Blocks**: every tree node is stored under the multihash of its
//!   canonical CBOR encoding, and every fetched block is re-hashed before
//!   use.
//! - **Copy-on-write**: a write stores new nodes along one root-to-leaf
//!   path and shares everything else with the previous version.
//! - **Conditional writes**: `put` and `remove` name the value they expect
//!   the key to hold; a stale expectation fails with
//!   [`Error::CasMismatch`] and changes nothing.
//! - **Pointers**: the `(owner, writer)` pointer moves from one root to the
//!   next only through a signed [`HashCasPair`](vellum_core::HashCasPair),
//!   so concurrent writers are linearized and losers see
//!   [`Error::PointerConflict`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vellum::{PublishedTree, TreeConfig};
//! use vellum::core::{ContentHash, CryptoContext, Keypair, SigningIdentity};
//! use vellum::pointers::PointerService;
//! use vellum::store::{HashVerifyingStorage, SqliteStore, StorageExt};
//!
//! async fn example() -> vellum::Result<()> {
//!     let store = Arc::new(SqliteStore::open("vellum.db")?);
//!     let storage = Arc::new(HashVerifyingStorage::new(store.clone(), CryptoContext::new()));
//!
//!     let keypair = Keypair::from_seed(&[7; 32]);
//!     let id = storage.register_signing_key(&keypair).await?;
//!     let writer = SigningIdentity::new(id, keypair);
//!
//!     let pointers = PointerService::new(store);
//!     let mut tree =
//!         PublishedTree::open(id, writer, storage, pointers, TreeConfig::default()).await?;
//!
//!     let value = ContentHash::sha256(b"some block");
//!     tree.put(b"greeting", None, value).await?;
//!     assert_eq!(tree.get(b"greeting").await?, Some(value));
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `vellum::core` - hashes, keys, canonical encoding, node formats
//! - `vellum::store` - block storage, pointer tables, hash verification
//! - `vellum::pointers` - the mutable-pointer service and its client

pub mod config;
pub mod error;
pub mod published;
pub mod tree;

// Re-export component crates
pub use vellum_core as core;
pub use vellum_pointers as pointers;
pub use vellum_store as store;

// Re-export main types for convenience
pub use config::{TreeConfig, DEFAULT_MAX_CHILDREN};
pub use error::{Error, Result};
pub use published::PublishedTree;
pub use tree::MerkleBTree;

pub use vellum_core::{ContentHash, HashAlgorithm, OptionalHash, PublicKeyHash, SigningIdentity};
