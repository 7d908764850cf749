//! # Content Lifecycle
//!
//! Creation, soft deletion, and grace-period purge for questions,
//! answers, and solutions. Soft-deleted items disappear from lookups,
//! search, and aggregates immediately; rows (and their reactions and
//! comments, via the storage cascade) are destroyed on purge.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use domains::{
    Answer, AppError, ContentAddress, ContentKind, ContentRef, ContentRepo, DomainEvent,
    EventSink, Question, Result, Solution,
};

use crate::cache::{content_mutation_tags, CacheService};

const MAX_TITLE_LEN: usize = 200;

pub struct ContentService {
    content: Arc<dyn ContentRepo>,
    cache: CacheService,
    events: Arc<dyn EventSink>,
}

impl ContentService {
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

    pub async fn create_question(
        &self,
        author_id: Uuid,
        title: &str,
        body: &str,
    ) -> Result<Question> {
        validate_title(title)?;
        validate_body(body)?;

        let question = Question {
            id: Uuid::now_v7(),
            author_id,
            title: title.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
            deleted_at: None,
        };
        self.content.create_question(question.clone()).await?;
        self.published(question.content_ref(), author_id).await;
        Ok(question)
    }

    pub async fn create_answer(
        &self,
        author_id: Uuid,
        question_id: Uuid,
        body: &str,
    ) -> Result<Answer> {
        validate_body(body)?;
        self.content
            .question(question_id)
            .await?
            .ok_or_else(|| AppError::not_found("question", question_id))?;

        let answer = Answer {
            id: Uuid::now_v7(),
            question_id,
            author_id,
            body: body.to_string(),
            is_accepted: false,
            created_at: Utc::now(),
            deleted_at: None,
        };
        self.content.create_answer(answer.clone()).await?;
        self.published(answer.content_ref(), author_id).await;
        Ok(answer)
    }

    pub async fn create_solution(
        &self,
        author_id: Uuid,
        title: &str,
        body: &str,
    ) -> Result<Solution> {
        validate_title(title)?;
        validate_body(body)?;

        let solution = Solution {
            id: Uuid::now_v7(),
            author_id,
            title: title.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
            deleted_at: None,
        };
        self.content.create_solution(solution.clone()).await?;
        self.published(solution.content_ref(), author_id).await;
        Ok(solution)
    }

    /// Hide a content item. Deleting a question cascades to its answers.
    /// Purge destroys the rows for good after the grace period.
    pub async fn soft_delete(&self, content: ContentRef) -> Result<()> {
        let owner = self
            .content
            .owner(content)
            .await?
            .ok_or_else(|| AppError::not_found(content.kind.as_str(), content.id))?;

        self.content.soft_delete(content, Utc::now()).await?;

        let mut tags = content_mutation_tags(content.kind, Some(owner));
        if content.kind == ContentKind::Question {
            // The cascade hides answers by arbitrary authors; flush the
            // answer views and the whole profile namespace rather than
            // enumerating affected users.
            tags.push(ContentKind::Answer.cache_tag().to_string());
        }
        tags.push("users".to_string());
        self.cache.invalidate(&tags).await;
        Ok(())
    }

    /// Permanently remove items whose grace period elapsed.
    /// Returns the number of purged content items.
    pub async fn purge_expired(&self, grace: Duration) -> Result<u64> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(grace)
                .map_err(|e| AppError::validation("grace", e.to_string()))?;
        let purged = self.content.purge_deleted_before(cutoff).await?;
        if purged > 0 {
            tracing::debug!(purged, "purged expired content");
        }
        Ok(purged)
    }

    async fn published(&self, content: ContentRef, author_id: Uuid) {
        self.cache
            .invalidate(&content_mutation_tags(content.kind, Some(author_id)))
            .await;
        self.events
            .emit(DomainEvent::ContentCreated { content })
            .await;
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(AppError::validation("title", "must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::validation(
            "title",
            format!("exceeds {MAX_TITLE_LEN} characters"),
        ));
    }
    Ok(())
}

fn validate_body(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(AppError::validation("body", "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{ContentKind, MockContentRepo, MockEventSink, MockTagCache};

    fn service(content: MockContentRepo, events: MockEventSink) -> ContentService {
        let mut cache = MockTagCache::new();
        cache.expect_invalidate().returning(|_| Ok(()));
        ContentService::new(
            Arc::new(content),
            CacheService::new(Arc::new(cache)),
            Arc::new(events),
        )
    }

    #[tokio::test]
    async fn creating_a_question_emits_content_created() {
        let mut content = MockContentRepo::new();
        content.expect_create_question().returning(|_| Ok(()));

        let mut events = MockEventSink::new();
        events
            .expect_emit()
            .withf(|e| {
                matches!(e, DomainEvent::ContentCreated { content }
                    if content.kind == ContentKind::Question)
            })
            .times(1)
            .returning(|_| ());

        let svc = service(content, events);
        let q = svc
            .create_question(Uuid::now_v7(), "How?", "Like this.")
            .await
            .unwrap();
        assert!(q.deleted_at.is_none());
    }

    #[tokio::test]
    async fn answering_a_missing_question_is_not_found() {
        let mut content = MockContentRepo::new();
        content.expect_question().returning(|_| Ok(None));

        let svc = service(content, MockEventSink::new());
        let err = svc
            .create_answer(Uuid::now_v7(), Uuid::now_v7(), "body")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(entity, _) if entity == "question"));
    }

    #[tokio::test]
    async fn blank_title_is_a_validation_error() {
        let svc = service(MockContentRepo::new(), MockEventSink::new());
        let err = svc
            .create_question(Uuid::now_v7(), "  ", "body")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { field, .. } if field == "title"));
    }
}
