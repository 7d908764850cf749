//! # Cache Service
//!
//! Typed `getOrCompute`/`invalidate` surface over the injected `TagCache`
//! port. Error policy per the consistency design: a failed read is a
//! miss (recompute), a failed write is logged and the computed value is
//! still returned, and a failed invalidation never fails the mutation
//! that triggered it — canonical state is authoritative, the cache is
//! strictly derived and disposable.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use domains::{ContentKind, Result, TagCache};

#[derive(Clone)]
pub struct CacheService {
    store: Arc<dyn TagCache>,
}

impl CacheService {
    pub fn new(store: Arc<dyn TagCache>) -> Self {
        Self { store }
    }

    /// Return the cached value under (namespace, key), or run `compute`,
    /// cache its result under the given tags with `ttl`, and return it.
    /// Only `compute` errors propagate.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        tags: &[String],
        ttl: Duration,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.store.get(namespace, key).await {
            Ok(Some(raw)) => match serde_json::from_value::<T>(raw) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::debug!(namespace, key, error = %err, "stale cache shape, recomputing");
                }
            },
            Ok(None) => {}
            Err(err) => {
                tracing::debug!(namespace, key, error = %err, "cache read failed, treating as miss");
            }
        }

        let value = compute().await?;

        match serde_json::to_value(&value) {
            Ok(json) => {
                if let Err(err) = self.store.set(namespace, key, json, tags, ttl).await {
                    tracing::warn!(namespace, key, error = %err, "cache write failed");
                }
            }
            Err(err) => tracing::warn!(namespace, key, error = %err, "cache encode failed"),
        }

        Ok(value)
    }

    /// Flush every entry carrying any of `tags`. Failures are logged,
    /// never propagated: the worst case is a stale read until TTL.
    pub async fn invalidate(&self, tags: &[String]) {
        if let Err(err) = self.store.invalidate(tags).await {
            tracing::warn!(?tags, error = %err, "cache invalidation failed");
        }
    }
}

/// Invalidation tag scoping one user's derived views (profile stats).
pub fn user_tag(user_id: Uuid) -> String {
    format!("user:{user_id}")
}

/// Tags flushed when a content item of `kind` mutates: the kind's own
/// tag, the derived aggregate views, and the owner's profile tag.
pub fn content_mutation_tags(kind: ContentKind, owner: Option<Uuid>) -> Vec<String> {
    let mut tags = vec![
        kind.cache_tag().to_string(),
        "popular".to_string(),
        "recent".to_string(),
        "trending".to_string(),
    ];
    if let Some(owner) = owner {
        tags.push(user_tag(owner));
    }
    tags
}
