//! # Reaction Ledger
//!
//! Toggles a user's signed reaction on a content item. One row at most
//! per (user, item) pair; toggling the same sign twice returns the pair
//! to the "no reaction" state.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use domains::{
    AppError, ContentRef, ContentRepo, DomainEvent, EventSink, Reaction, ReactionCounts,
    ReactionRepo, Result,
};

use crate::cache::{content_mutation_tags, CacheService};

pub struct ReactionService {
    content: Arc<dyn ContentRepo>,
    reactions: Arc<dyn ReactionRepo>,
    cache: CacheService,
    events: Arc<dyn EventSink>,
}

impl ReactionService {
    pub fn new(
        content: Arc<dyn ContentRepo>,
        reactions: Arc<dyn ReactionRepo>,
        cache: CacheService,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            content,
            reactions,
            cache,
            events,
        }
    }

    /// Toggle `user_id`'s reaction on `content` and return the fresh
    /// counts. Any authenticated user may react to any live item,
    /// including their own.
    ///
    /// Toggle semantics:
    /// - no existing reaction       → create with `liked`
    /// - existing with same sign    → delete (un-react)
    /// - existing with opposite sign → flip in place
    pub async fn set_reaction(
        &self,
        user_id: Uuid,
        content: ContentRef,
        liked: bool,
    ) -> Result<ReactionCounts> {
        let owner = self
            .content
            .owner(content)
            .await?
            .ok_or_else(|| AppError::not_found(content.kind.as_str(), content.id))?;

        match self.reactions.find(user_id, content).await? {
            None => {
                let reaction = Reaction {
                    id: Uuid::now_v7(),
                    user_id,
                    content,
                    liked,
                    parent_id: None,
                    created_at: Utc::now(),
                };
                match self.reactions.insert(&reaction).await {
                    Ok(()) => {}
                    Err(AppError::Conflict(_)) => {
                        // Lost a same-user race: the unique constraint on
                        // (user, kind, id) guarantees a single row exists
                        // now. Retry once as an update.
                        tracing::debug!(%user_id, %content, "reaction insert raced, retrying as update");
                        if let Some(existing) = self.reactions.find(user_id, content).await? {
                            self.reactions.set_sign(existing.id, liked).await?;
                        }
                    }
                    Err(other) => return Err(other),
                }
            }
            Some(existing) if existing.liked == liked => {
                self.reactions.delete(existing.id).await?;
            }
            Some(existing) => {
                self.reactions.set_sign(existing.id, liked).await?;
            }
        }

        let counts = self.reactions.counts(content).await?;

        self.cache
            .invalidate(&content_mutation_tags(content.kind, Some(owner)))
            .await;
        self.events
            .emit(DomainEvent::ReactionChanged { content, counts })
            .await;

        Ok(counts)
    }
}
