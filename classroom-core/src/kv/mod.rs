//! Component A — typed operations over an in-memory keyed store.
//!
//! The hot tier of the file store (component G), the room lattice's
//! cross-instance fan-out (component K/L), and the permission cache
//! (component F) are all built on the small set of primitives exposed here:
//! strings, sorted sets, hashes, and a pub/sub channel per namespace.
//! `classroom-server` wires the [`redis`]-backed implementation in
//! [`redis_store`]; tests use the in-memory fake in
//! [`crate::testutil::InMemoryKv`].

mod redis_store;

use async_trait::async_trait;

use crate::error::Result;

pub use redis_store::RedisKv;

/// A single `(member, score)` pair from a sorted set, where `score` is the
/// byte length of the member's content at last write (spec §3 Invariant 1).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    /// The sorted-set member (typically an encoded filename).
    pub member: String,
    /// The member's score.
    pub score: f64,
}

/// A message delivered on a subscribed pub/sub channel.
#[derive(Debug, Clone)]
pub struct KvMessage {
    /// The channel the message arrived on.
    pub channel: String,
    /// The raw payload.
    pub payload: Vec<u8>,
}

/// A live subscription to one or more pub/sub channels.
#[async_trait]
pub trait KvSubscription: Send {
    /// Awaits the next message, or `None` if the subscription was closed.
    async fn next(&mut self) -> Option<KvMessage>;
}

/// Typed, non-blocking operations over the hot-tier keyed store (component A).
///
/// Every method here corresponds to a single atomic KV command — no method
/// spans multiple round trips except where explicitly documented (e.g.
/// `rename_nx`, which is itself one atomic server-side operation).
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Reads a string value. `None` if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes a string value, overwriting any existing value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Length in bytes of a string value; `0` if the key does not exist.
    async fn strlen(&self, key: &str) -> Result<u64>;

    /// Atomically increments an integer value (creating it at `0` first if absent).
    async fn incrby(&self, key: &str, delta: i64) -> Result<i64>;

    /// Deletes a key. Returns `true` if it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Sets a TTL on a key, in seconds.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()>;

    /// Renames `src` to `dst` only if `dst` does not already exist.
    ///
    /// Returns `true` if the rename happened. Used by `FileStore::rename`
    /// for the file-content key, where a race against a concurrent create at
    /// `dst` must not silently clobber it (spec §4.G "Race on rename").
    async fn rename_nx(&self, src: &str, dst: &str) -> Result<bool>;

    /// Adds or updates a sorted-set member's score.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// Removes a sorted-set member. Returns `true` if it was present.
    async fn zrem(&self, key: &str, member: &str) -> Result<bool>;

    /// Reads a single sorted-set member's score.
    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>>;

    /// Returns every member of a sorted set with its score.
    async fn zscan(&self, key: &str) -> Result<Vec<ScoredMember>>;

    /// Reads a hash field.
    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>>;

    /// Writes a hash field.
    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<()>;

    /// Publishes a payload to a pub/sub channel. Delivered to every
    /// subscriber on every instance, per spec §9 "Cross-instance fan-out".
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<()>;

    /// Subscribes to a pub/sub channel.
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn KvSubscription>>;
}
