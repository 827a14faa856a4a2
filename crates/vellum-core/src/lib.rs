//! # Vellum Core
//!
//! Pure primitives for Vellum: content hashes, signing keys, canonical
//! encoding, and the node types the Merkle B-tree is built from.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`ContentHash`] - Algorithm-tagged digest identifying an immutable block
//! - [`CryptoContext`] - The hashing and signing capabilities a process accepts
//! - [`TreeNode`] - An immutable B-tree node
//! - [`HashCasPair`] - A signed compare-and-swap request for a mutable pointer
//!
//! ## Canonicalization
//!
//! Everything hashed is encoded using deterministic CBOR. See [`canonical`].

pub mod canonical;
pub mod cas;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod node;

pub use canonical::{decode_value, encode_canonical, LINK_TAG};
pub use cas::HashCasPair;
pub use crypto::{
    CryptoContext, Ed25519PublicKey, Ed25519Signature, Keypair, PublicKeyHash, SigningIdentity,
    SigningScheme,
};
pub use error::{CoreError, Result};
pub use hash::{display_optional, ContentHash, HashAlgorithm, OptionalHash};
pub use merkle::{Link, MerkleNode};
pub use node::{child_label, Entry, Slot, TreeNode};
