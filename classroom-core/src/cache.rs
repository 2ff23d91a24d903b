//! Component F — memoized read-through cache over a dedicated KV namespace.
//!
//! Grounded on the upstream `Cache.memoize` helper: a cache key is the
//! function's identity plus a digest of its arguments and calling scope, so
//! that (for example) a participant summary computed for `(course, lesson,
//! participant)` never collides with one for a different participant. Unlike
//! the original's `pickle`-based payloads, cached values here are
//! JSON-serialized, matching the rest of this crate's wire and storage
//! encoding.
//!
//! This cache is deliberately a *separate* [`crate::kv::KvStore`] instance
//! pointed at [`crate::config::Config::cache_db`], so that flushing it can
//! never evict file content living in the same Redis server's default DB.

use std::sync::Arc;

use md5::{Digest, Md5};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::kv::KvStore;

/// A read-through memoization cache keyed by function identity + arguments.
pub struct Cache {
    store: Arc<dyn KvStore>,
}

impl Cache {
    /// Wraps a KV store dedicated to the cache namespace.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Builds the cache key for one memoized call: `_:{scope}:{fn_name}:{md5(args_repr+scope)}`.
    pub fn make_key(scope: &str, fn_name: &str, args_repr: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(args_repr.as_bytes());
        hasher.update(scope.as_bytes());
        let digest = hasher.finalize();
        format!("_:{scope}:{fn_name}:{digest:x}")
    }

    /// Returns the cached value for `key`, if present and deserializable.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(key).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes).ok()),
            None => Ok(None),
        }
    }

    /// Stores `value` under `key`, with an optional TTL in seconds.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: Option<u64>,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.set(key, &bytes).await?;
        if let Some(ttl) = ttl_secs {
            self.store.expire(key, ttl).await?;
        }
        Ok(())
    }

    /// Evicts a memoized entry outright (used after a mutation invalidates it).
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        self.store.delete(key).await?;
        Ok(())
    }

    /// Returns the cached result for `(scope, fn_name, args_repr)`, computing
    /// and storing it via `compute` on a miss. A `None` result from `compute`
    /// is never cached, matching the upstream memoize's documented behavior.
    pub async fn memoize<T, F, Fut>(
        &self,
        scope: &str,
        fn_name: &str,
        args_repr: &str,
        ttl_secs: Option<u64>,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let key = Self::make_key(scope, fn_name, args_repr);
        if let Some(hit) = self.get::<T>(&key).await? {
            return Ok(hit);
        }
        let computed = compute().await?;
        self.set(&key, &computed, ttl_secs).await?;
        Ok(computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_key_is_stable_for_same_inputs() {
        let a = Cache::make_key("course:1:lesson:2", "participant_summary", "[42]");
        let b = Cache::make_key("course:1:lesson:2", "participant_summary", "[42]");
        assert_eq!(a, b);
    }

    #[test]
    fn make_key_differs_by_scope() {
        let a = Cache::make_key("course:1:lesson:2", "participant_summary", "[42]");
        let b = Cache::make_key("course:1:lesson:3", "participant_summary", "[42]");
        assert_ne!(a, b);
    }

    #[test]
    fn make_key_differs_by_args() {
        let a = Cache::make_key("course:1:lesson:2", "participant_summary", "[42]");
        let b = Cache::make_key("course:1:lesson:2", "participant_summary", "[43]");
        assert_ne!(a, b);
    }
}
