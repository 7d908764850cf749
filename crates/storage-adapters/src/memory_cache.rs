//! # In-Memory Tag Cache
//!
//! DashMap-backed `TagCache` with TTL expiry and an exact reverse index
//! from tag → entry keys. Entries are never mutated in place; `set`
//! always replaces. The test-suite substitute for the Redis adapter.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use domains::{Result, TagCache};

type EntryKey = (String, String);

struct Entry {
    value: serde_json::Value,
    tags: Vec<String>,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryTagCache {
    entries: DashMap<EntryKey, Entry>,
    tag_index: DashMap<String, HashSet<EntryKey>>,
}

impl MemoryTagCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn unindex(&self, key: &EntryKey, tags: &[String]) {
        for tag in tags {
            let emptied = self
                .tag_index
                .get_mut(tag)
                .map(|mut bucket| {
                    bucket.remove(key);
                    bucket.is_empty()
                })
                .unwrap_or(false);
            if emptied {
                self.tag_index.remove(tag);
            }
        }
    }

    fn remove_entry(&self, key: &EntryKey) {
        if let Some((_, entry)) = self.entries.remove(key) {
            self.unindex(key, &entry.tags);
        }
    }

    #[cfg(test)]
    fn tag_bucket_count(&self) -> usize {
        self.tag_index.len()
    }
}

#[async_trait]
impl TagCache for MemoryTagCache {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<serde_json::Value>> {
        let entry_key = (namespace.to_string(), key.to_string());
        let expired = match self.entries.get(&entry_key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()))
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.remove_entry(&entry_key);
        }
        Ok(None)
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: serde_json::Value,
        tags: &[String],
        ttl: Duration,
    ) -> Result<()> {
        let entry_key = (namespace.to_string(), key.to_string());

        // Replace-on-write: retire the previous entry's index links first.
        self.remove_entry(&entry_key);

        for tag in tags {
            self.tag_index
                .entry(tag.clone())
                .or_default()
                .insert(entry_key.clone());
        }
        self.entries.insert(
            entry_key,
            Entry {
                value,
                tags: tags.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn invalidate(&self, tags: &[String]) -> Result<()> {
        for tag in tags {
            let Some((_, bucket)) = self.tag_index.remove(tag) else {
                continue;
            };
            for entry_key in bucket {
                // Removes the entry and its links in every other bucket.
                self.remove_entry(&entry_key);
            }
        }
        Ok(())
    }
}
