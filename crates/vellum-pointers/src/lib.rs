//! # Vellum Pointers
//!
//! Compare-and-swap mutable pointers: the only mutable state in Vellum.
//!
//! ## Overview
//!
//! A pointer maps `(owner, writer)` to the hash of the writer's current
//! tree root. Writers advance it with a signed [`HashCasPair`]
//! `(original, updated)`; the service swaps only if its stored value
//! equals `original`. That swap is where "the current version" of a tree
//! is defined.
//!
//! ## Key Properties
//!
//! - **Linearizable**: of two racing updates from the same original, exactly one wins
//! - **Authenticated**: payloads are verified against the writer's registered key
//! - **No automatic merge**: losers re-read the pointer and redo their change
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vellum_pointers::{ClientConfig, LoopbackPoster, PointerHandler, PointerService, RemotePointers};
//! use vellum_store::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::new());
//! let handler = Arc::new(PointerHandler::new(PointerService::new(store)));
//! let client = RemotePointers::new(LoopbackPoster::new(handler), ClientConfig::default());
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Writer                               Service
//!   |-------- getPointer ------------->|
//!   |<------- signed (orig, cur) ------|
//!   |   ... build new tree root ...    |
//!   |-------- setPointer (cur, new) -->|
//!   |<------- 1 / 0 -------------------|
//! ```
//!
//! [`HashCasPair`]: vellum_core::HashCasPair

pub mod client;
pub mod error;
pub mod server;
pub mod service;
pub mod transport;
pub mod wire;

pub use client::{ClientConfig, RemotePointers};
pub use error::{PointerError, Result};
pub use server::PointerHandler;
pub use service::{read_pointer, MutablePointers, PointerService};
pub use transport::{loopback::LoopbackPoster, Poster, Response};
