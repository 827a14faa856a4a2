//! # Vellum Store
//!
//! Storage abstraction for Vellum. Provides trait-based interfaces for
//! content-addressed blocks and mutable pointer rows, with SQLite and
//! in-memory implementations.
//!
//! ## Key Types
//!
//! - [`ContentAddressedStorage`] - Blocks keyed by the hash of their bytes
//! - [`PointerTable`] - Atomic compare-and-swap over `(owner, writer)` rows
//! - [`HashVerifyingStorage`] - Decorator that re-verifies every hash
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use vellum_core::{CryptoContext, SigningIdentity};
//! use vellum_store::{ContentAddressedStorage, HashVerifyingStorage, SqliteStore, StorageExt};
//!
//! async fn example() {
//!     let crypto = CryptoContext::new();
//!     let store = HashVerifyingStorage::new(SqliteStore::open("vellum.db").unwrap(), crypto.clone());
//!
//!     let keypair = crypto.generate_keypair();
//!     let id = store.register_signing_key(&keypair).await.unwrap();
//!     let writer = SigningIdentity::new(id, keypair);
//!
//!     let hash = store.put_signed(&id, &writer, Bytes::from_static(b"block")).await.unwrap();
//!     assert!(store.get(&hash).await.unwrap().is_some());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent puts**: identical bytes always land under the identical hash
//! - **Signed writes**: every block write carries the writer's signature
//! - **Absence is not an error**: `get` of an unknown hash is `Ok(None)`

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;
pub mod verifying;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{ContentAddressedStorage, PointerTable, StorageExt};
pub use verifying::HashVerifyingStorage;
