//! # Redis Tag Cache
//!
//! `TagCache` over a deadpool-redis pool. Each cached value is stored
//! as a JSON envelope that carries its own tag list, and every tag
//! maintains a set of member keys. Invalidating a tag deletes its
//! members and prunes them from the other tag sets they belonged to.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Connection, Pool};
use serde::{Deserialize, Serialize};

use domains::{AppError, Result, TagCache};

pub struct RedisTagCache {
    pool: Pool,
    prefix: String,
}

/// Stored alongside the value so invalidation can unlink the key from
/// every tag set it joined at write time.
#[derive(Serialize, Deserialize)]
struct Envelope {
    tags: Vec<String>,
    value: serde_json::Value,
}

impl RedisTagCache {
    pub fn new(pool: Pool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
        }
    }

    fn value_key(&self, namespace: &str, key: &str) -> String {
        format!("{}:cache:{namespace}:{key}", self.prefix)
    }

    fn tag_key(&self, tag: &str) -> String {
        format!("{}:tag:{tag}", self.prefix)
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| AppError::Unavailable(format!("redis pool: {e}")))
    }
}

fn redis_err(err: deadpool_redis::redis::RedisError) -> AppError {
    AppError::Unavailable(format!("redis: {err}"))
}

#[async_trait]
impl TagCache for RedisTagCache {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<serde_json::Value>> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn
            .get(self.value_key(namespace, key))
            .await
            .map_err(redis_err)?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let envelope: Envelope = serde_json::from_str(&raw)
            .map_err(|e| AppError::Storage(format!("cache envelope decode: {e}")))?;
        Ok(Some(envelope.value))
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: serde_json::Value,
        tags: &[String],
        ttl: Duration,
    ) -> Result<()> {
        let value_key = self.value_key(namespace, key);
        let envelope = Envelope {
            tags: tags.to_vec(),
            value,
        };
        let raw = serde_json::to_string(&envelope)
            .map_err(|e| AppError::Storage(format!("cache envelope encode: {e}")))?;

        let mut conn = self.conn().await?;
        let _: () = conn
            .set_ex(&value_key, raw, ttl.as_secs().max(1))
            .await
            .map_err(redis_err)?;
        for tag in tags {
            let _: () = conn
                .sadd(self.tag_key(tag), &value_key)
                .await
                .map_err(redis_err)?;
        }
        Ok(())
    }

    async fn invalidate(&self, tags: &[String]) -> Result<()> {
        let mut conn = self.conn().await?;
        for tag in tags {
            let tag_key = self.tag_key(tag);
            let members: Vec<String> = conn.smembers(&tag_key).await.map_err(redis_err)?;

            for value_key in &members {
                // Unlink the key from the other tag sets it joined.
                let raw: Option<String> = conn.get(value_key).await.map_err(redis_err)?;
                if let Some(raw) = raw {
                    if let Ok(envelope) = serde_json::from_str::<Envelope>(&raw) {
                        for other in envelope.tags.iter().filter(|t| *t != tag) {
                            let _: () = conn
                                .srem(self.tag_key(other), value_key)
                                .await
                                .map_err(redis_err)?;
                        }
                    }
                }
                let _: () = conn.del(value_key).await.map_err(redis_err)?;
            }

            let _: () = conn.del(&tag_key).await.map_err(redis_err)?;
        }
        Ok(())
    }
}
