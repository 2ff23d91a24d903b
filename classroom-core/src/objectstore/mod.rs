//! Component B — cold-tier blob storage.
//!
//! Content whose size exceeds [`crate::config::Config::hot_limit_bytes`]
//! lives here instead of in the KV store (spec §4.G "Hot/cold placement").
//! Keys are the same deterministic strings [`crate::keys`] produces for the
//! hot tier, so placement can move a given file between tiers without
//! renaming it.

mod s3_store;

use async_trait::async_trait;

use crate::error::Result;

pub use s3_store::S3ObjectStore;

/// Blob operations against the cold tier (component B).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Reads an entire object. `None` if it does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes an entire object, overwriting any existing one.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Deletes an object. Missing objects are not an error (S3 semantics).
    async fn delete(&self, key: &str) -> Result<()>;

    /// Copies an object server-side without downloading it, then deletes the
    /// source. Used by `FileStore::rename` when a cold-tier entry moves.
    async fn rename(&self, src: &str, dst: &str) -> Result<()>;

    /// Size of an object in bytes, without fetching its body.
    async fn size(&self, key: &str) -> Result<Option<u64>>;
}
