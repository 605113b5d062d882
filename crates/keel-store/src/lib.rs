//! # keel-store
//!
//! Durable key-value storage behind the [`KeyValueStore`] trait.
//!
//! The background persists its undeliverable-message queue and the live
//! session through this trait. Two backends ship:
//!
//! - [`MemoryStore`]: process-local, for tests and ephemeral runs
//! - [`SqliteStore`]: a single `kv` table in a `SQLite` file

#![deny(unsafe_code)]

pub mod errors;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::Value;

pub use errors::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Durable JSON key-value storage.
///
/// Writes are best-effort from the caller's point of view: callers log
/// failures and carry on with their in-memory state.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    /// Delete a value. Deleting a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
