//! Reference engine for the Tessera store protocol
//!
//! This crate provides an in-memory [`StoreEngine`](tessera_core::StoreEngine):
//! - Mutation application with per-trait operation history
//! - Predicate evaluation over codec-projected payload documents
//! - Ordering, cursor paging and content hashing of result pages
//! - Live queries pushed over bounded channels
//!
//! It is the engine the client crate is tested against, and a model of the
//! behavior a storage-backed engine must reproduce.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod apply;
pub mod config;
mod engine;
mod eval;
mod hash;
mod query;
mod store;
mod watch;

pub use config::{EngineConfig, CONFIG_FILE_NAME};
pub use engine::MemoryEngine;
