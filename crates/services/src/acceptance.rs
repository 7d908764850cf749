//! # Acceptance State Machine
//!
//! Per-answer states `Unaccepted` ⇄ `Accepted`, with at most one
//! accepted answer per question at any instant. Only the question owner
//! may transition. The "clear siblings, set target" sequence runs as a
//! single storage transaction (see `ContentRepo::set_exclusive_acceptance`)
//! so concurrent readers observe the old state or the new state, never
//! two accepted answers and never zero mid-transition.

use std::sync::Arc;

use uuid::Uuid;

use domains::{
    AppError, ContentKind, ContentRepo, DomainEvent, EventSink, Result,
};

use crate::cache::{content_mutation_tags, user_tag, CacheService};

pub struct AcceptanceService {
    content: Arc<dyn ContentRepo>,
    cache: CacheService,
    events: Arc<dyn EventSink>,
}

impl AcceptanceService {
    pub fn new(
        content: Arc<dyn ContentRepo>,
        cache: CacheService,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            content,
            cache,
            events,
        }
    }

    /// Toggle acceptance of `answer_id` on behalf of `requester_id`.
    /// Returns the answer's new acceptance state.
    pub async fn toggle_acceptance(&self, answer_id: Uuid, requester_id: Uuid) -> Result<bool> {
        let answer = self
            .content
            .answer(answer_id)
            .await?
            .ok_or_else(|| AppError::not_found("answer", answer_id))?;
        let question = self
            .content
            .question(answer.question_id)
            .await?
            .ok_or_else(|| AppError::not_found("question", answer.question_id))?;

        if requester_id != question.author_id {
            return Err(AppError::Forbidden(
                "only the question owner may toggle acceptance".into(),
            ));
        }

        let accepted = if answer.is_accepted {
            self.content.clear_acceptance(answer_id).await?;
            false
        } else {
            self.content
                .set_exclusive_acceptance(question.id, answer_id)
                .await?;
            true
        };

        tracing::debug!(%answer_id, question_id = %question.id, accepted, "acceptance toggled");

        let mut tags = content_mutation_tags(ContentKind::Answer, Some(answer.author_id));
        tags.push(ContentKind::Question.cache_tag().to_string());
        tags.push(user_tag(question.author_id));
        self.cache.invalidate(&tags).await;

        self.events
            .emit(DomainEvent::AnswerAccepted {
                answer_id,
                question_id: question.id,
                accepted,
            })
            .await;

        Ok(accepted)
    }
}
