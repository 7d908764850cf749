//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be wired into the services.
//! All shared state (relational store, tag cache, indexed search) enters
//! the system through these ports — never through implicit singletons —
//! so tests can substitute in-memory fakes or mockall mocks.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::events::DomainEvent;
use crate::models::{
    Answer, Comment, CommentNode, ContentKind, ContentRef, ProfileStats, Question,
    RankedQuestion, Reaction, ReactionCounts, SearchHit, Solution,
};

/// Canonical persistence contract for content items and their lifecycle.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ContentRepo: Send + Sync {
    async fn create_question(&self, question: Question) -> Result<()>;
    async fn create_answer(&self, answer: Answer) -> Result<()>;
    async fn create_solution(&self, solution: Solution) -> Result<()>;

    /// Soft-deleted items are not returned by any of the lookups below.
    async fn question(&self, id: Uuid) -> Result<Option<Question>>;
    async fn answer(&self, id: Uuid) -> Result<Option<Answer>>;
    async fn solution(&self, id: Uuid) -> Result<Option<Solution>>;

    /// Owning user of a live content item, if the item exists.
    async fn owner(&self, content: ContentRef) -> Result<Option<Uuid>>;

    async fn answers_for(&self, question_id: Uuid) -> Result<Vec<Answer>>;

    /// Atomically clear `is_accepted` on every answer of `question_id`
    /// and set it on `answer_id`. A concurrent reader observes either
    /// the old state or the new state, never two accepted answers.
    async fn set_exclusive_acceptance(&self, question_id: Uuid, answer_id: Uuid) -> Result<()>;

    /// Clear `is_accepted` on a single answer. Siblings are untouched.
    async fn clear_acceptance(&self, answer_id: Uuid) -> Result<()>;

    /// Mark a content item deleted. Deleting a question also marks its
    /// answers; reactions and comments ride on the storage cascade when
    /// the row is eventually purged.
    async fn soft_delete(&self, content: ContentRef, at: DateTime<Utc>) -> Result<()>;

    /// Permanently remove items soft-deleted before `cutoff`.
    /// Returns the number of purged content items.
    async fn purge_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    // Aggregate source queries (cached by the aggregate service)
    async fn recent_questions(&self, limit: usize) -> Result<Vec<Question>>;
    async fn popular_questions(&self, limit: usize) -> Result<Vec<RankedQuestion>>;
    async fn trending_questions(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RankedQuestion>>;
    async fn profile_stats(&self, user_id: Uuid) -> Result<ProfileStats>;
}

/// Persistence contract for the reaction ledger.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReactionRepo: Send + Sync {
    async fn find(&self, user_id: Uuid, content: ContentRef) -> Result<Option<Reaction>>;

    /// Fails with `AppError::Conflict` when a row for the same
    /// (user, content) pair already exists — the caller retries as an
    /// update rather than propagating the race.
    async fn insert(&self, reaction: &Reaction) -> Result<()>;

    async fn set_sign(&self, reaction_id: Uuid, liked: bool) -> Result<()>;
    async fn delete(&self, reaction_id: Uuid) -> Result<()>;
    async fn counts(&self, content: ContentRef) -> Result<ReactionCounts>;
}

/// Persistence contract for threaded comments.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn insert(&self, comment: &Comment) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Comment>>;

    /// Top-level comments for an item, most-recent first, children
    /// eagerly attached (oldest-first within a thread).
    async fn roots(&self, content: ContentRef) -> Result<Vec<CommentNode>>;
}

/// Local boolean-mode text matching against the relational store.
/// `expr` is pre-sanitized (`+tok*` tokens); an empty expression or a
/// kind without searchable fields yields an empty list, never an error.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ContentSearch: Send + Sync {
    async fn match_terms(
        &self,
        kind: ContentKind,
        expr: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;
}

/// Thin client to the external indexed search service. The service is
/// an opaque black box: the raw term goes over the wire untouched, and
/// every transport or protocol failure surfaces as
/// `AppError::Unavailable` for the resolver to recover from.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IndexedSearch: Send + Sync {
    async fn query(&self, kind: ContentKind, term: &str, limit: usize)
        -> Result<Vec<SearchHit>>;
}

/// Tag-indexed cache for derived read views. Shared and externally
/// synchronized; mutation is always replace-or-delete, never partial
/// update, so no in-process locking is required. The whole store is
/// disposable — flushing it entirely loses no data.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TagCache: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<serde_json::Value>>;

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: serde_json::Value,
        tags: &[String],
        ttl: Duration,
    ) -> Result<()>;

    /// Remove every entry whose tag set intersects `tags`, and drop
    /// emptied tag buckets from the reverse index.
    async fn invalidate(&self, tags: &[String]) -> Result<()>;
}

/// Sink for logical domain events. Fire-and-forget: delivery and
/// transport belong to the notification collaborator.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: DomainEvent);
}
