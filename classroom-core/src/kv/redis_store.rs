use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use super::{KvMessage, KvStore, KvSubscription, ScoredMember};
use crate::error::{ClassroomError, Result};

fn infra(err: redis::RedisError) -> ClassroomError {
    ClassroomError::Kv(Box::new(err))
}

/// A `KvStore` backed by Redis, using a pooled [`ConnectionManager`] for
/// request/response commands and opening a dedicated multiplexed connection
/// per `subscribe` call (mirrors the teacher's pattern of a long-lived
/// control connection plus short-lived per-subscriber connections in
/// `remote_access/connection.rs`).
#[derive(Clone)]
pub struct RedisKv {
    client: Client,
    manager: ConnectionManager,
}

impl RedisKv {
    /// Connects to `url` and eagerly establishes the shared command connection.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(infra)?;
        let manager = client.get_connection_manager().await.map_err(infra)?;
        Ok(Self { client, manager })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(infra)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.set(key, value).await.map_err(infra)
    }

    async fn strlen(&self, key: &str) -> Result<u64> {
        let mut conn = self.manager.clone();
        conn.strlen(key).await.map_err(infra)
    }

    async fn incrby(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.manager.clone();
        conn.incr(key, delta).await.map_err(infra)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let removed: u64 = conn.del(key).await.map_err(infra)?;
        Ok(removed > 0)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.expire(key, ttl_secs as i64).await.map_err(infra)
    }

    async fn rename_nx(&self, src: &str, dst: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        conn.rename_nx(src, dst).await.map_err(infra)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.zadd(key, member, score).await.map_err(infra)
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let removed: u64 = conn.zrem(key, member).await.map_err(infra)?;
        Ok(removed > 0)
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let mut conn = self.manager.clone();
        conn.zscore(key, member).await.map_err(infra)
    }

    async fn zscan(&self, key: &str) -> Result<Vec<ScoredMember>> {
        let mut conn = self.manager.clone();
        let raw: Vec<(String, f64)> = conn.zrange_withscores(key, 0, -1).await.map_err(infra)?;
        Ok(raw
            .into_iter()
            .map(|(member, score)| ScoredMember { member, score })
            .collect())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        conn.hget(key, field).await.map_err(infra)
    }

    async fn hset(&self, key: &str, field: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.hset(key, field, value).await.map_err(infra)
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.publish(channel, payload).await.map_err(infra)
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn KvSubscription>> {
        let conn = self.client.get_async_pubsub().await.map_err(infra)?;
        let mut pubsub = conn;
        pubsub.subscribe(channel).await.map_err(infra)?;
        Ok(Box::new(RedisSubscription { pubsub }))
    }
}

struct RedisSubscription {
    pubsub: redis::aio::PubSub,
}

#[async_trait]
impl KvSubscription for RedisSubscription {
    async fn next(&mut self) -> Option<KvMessage> {
        use futures_util::StreamExt;
        let msg = self.pubsub.on_message().next().await?;
        let channel = msg.get_channel_name().to_owned();
        let payload: Vec<u8> = msg.get_payload().ok()?;
        Some(KvMessage { channel, payload })
    }
}
