//! Storage subsystem
//!
//! This module provides the persistence collaborator the segmenter calls out
//! to, and the backends implementing it.
//!
//! Components:
//! - `storage_trait`: the async `Storage` trait defining a uniform API.
//! - `types`: filters, summaries and pagination shared by backends.
//! - `memory_storage`: process-local implementation.
//! - `file_storage`: filesystem-backed implementation storing JSON documents.
//! - `session_filter`: helpers to build session and node queries.

pub mod file_storage;
pub mod memory_storage;
pub mod session_filter;
pub mod storage_trait;
#[cfg(test)]
pub mod testing;
pub mod types;

pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
pub use storage_trait::Storage;
