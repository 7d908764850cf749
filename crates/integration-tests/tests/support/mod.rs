//! Shared fixture: the full service stack over the in-memory adapters,
//! with an event sink that records everything it sees.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use configs::Settings;
use domains::{DomainEvent, EventSink, IndexedSearch};
use services::{
    AcceptanceService, AggregatePolicy, AggregateService, CacheService, CommentPolicy,
    CommentService, ContentService, ReactionService, SearchService,
};
use storage_adapters::{MemoryStore, MemoryTagCache};

/// Collects emitted events for assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DomainEvent>>,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: DomainEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl RecordingSink {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }
}

pub struct Env {
    pub settings: Settings,
    pub store: Arc<MemoryStore>,
    pub tag_cache: Arc<MemoryTagCache>,
    pub sink: Arc<RecordingSink>,
    pub content: ContentService,
    pub reactions: ReactionService,
    pub comments: CommentService,
    pub acceptance: AcceptanceService,
    pub aggregates: AggregateService,
}

impl Env {
    pub fn new() -> Self {
        // Policies come from the same settings a deployment would load;
        // with no config file or env set this is all defaults.
        let settings = Settings::load().unwrap_or_default();
        let store = Arc::new(MemoryStore::new());
        let tag_cache = Arc::new(MemoryTagCache::new());
        let sink = Arc::new(RecordingSink::default());
        let cache = CacheService::new(tag_cache.clone());

        Self {
            content: ContentService::new(store.clone(), cache.clone(), sink.clone()),
            reactions: ReactionService::new(
                store.clone(),
                store.clone(),
                cache.clone(),
                sink.clone(),
            ),
            comments: CommentService::new(
                store.clone(),
                store.clone(),
                cache.clone(),
                CommentPolicy {
                    max_body_len: settings.comments.max_body_len,
                },
            ),
            acceptance: AcceptanceService::new(store.clone(), cache.clone(), sink.clone()),
            aggregates: AggregateService::new(
                store.clone(),
                cache.clone(),
                AggregatePolicy {
                    ttl: settings.cache.ttl(),
                    ..AggregatePolicy::default()
                },
            ),
            settings,
            store,
            tag_cache,
            sink,
        }
    }

    /// A search resolver over this fixture's store as the fallback.
    pub fn search(&self, indexed: Option<Arc<dyn IndexedSearch>>) -> SearchService {
        SearchService::new(indexed, self.store.clone())
    }
}

pub fn user() -> Uuid {
    Uuid::now_v7()
}
