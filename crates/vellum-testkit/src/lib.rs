//! # Vellum Testkit
//!
//! Testing utilities for Vellum.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: exact bytes and hashes for the canonical encodings
//! - **Generators**: proptest strategies for keys, hashes, nodes and edit scripts
//! - **Fixtures**: a ready-made store, writer identity and tree
//!
//! ## Golden Vectors
//!
//! ```rust
//! use vellum_testkit::vectors::verify_all_vectors;
//!
//! for (name, ok, actual) in verify_all_vectors() {
//!     assert!(ok, "{} produced {}", name, actual);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use vellum_testkit::generators::ops;
//!
//! proptest! {
//!     #[test]
//!     fn tree_matches_model(script in ops(64)) {
//!         // replay `script` against a tree and a BTreeMap
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use vellum_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new().await;
//! let mut tree = fixture.tree(4).await;
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{value, TestFixture};
pub use generators::{apply_to_model, Op};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
