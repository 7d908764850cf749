//! # Domain Models
//!
//! These structs represent the core entities of Quorum.
//! We use UUID v7 for time-ordered, globally unique identification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminates the three reactable/commentable/searchable content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Question,
    Answer,
    Solution,
}

impl ContentKind {
    /// Storage-level type tag (column value, event payload).
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Question => "question",
            ContentKind::Answer => "answer",
            ContentKind::Solution => "solution",
        }
    }

    /// Cache tag flushed whenever an item of this kind mutates.
    pub fn cache_tag(&self) -> &'static str {
        match self {
            ContentKind::Question => "questions",
            ContentKind::Answer => "answers",
            ContentKind::Solution => "solutions",
        }
    }

    /// Text fields the fallback matcher may search for this kind.
    /// A kind with an empty list simply yields no fallback results.
    pub fn searchable_fields(&self) -> &'static [&'static str] {
        match self {
            ContentKind::Question => &["title", "body"],
            ContentKind::Answer => &["body"],
            ContentKind::Solution => &["title", "body"],
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stable (type-tag, id) pair shared by everything that can be
/// reacted to, commented on, or searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub id: Uuid,
}

impl ContentRef {
    pub fn question(id: Uuid) -> Self {
        Self { kind: ContentKind::Question, id }
    }

    pub fn answer(id: Uuid) -> Self {
        Self { kind: ContentKind::Answer, id }
    }

    pub fn solution(id: Uuid) -> Self {
        Self { kind: ContentKind::Solution, id }
    }
}

impl std::fmt::Display for ContentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Anything addressable as a content item.
pub trait ContentAddress {
    fn content_ref(&self) -> ContentRef;
}

/// A user's question. The root of an answer/acceptance thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// Soft-delete marker; hidden once set, purged after the grace period.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ContentAddress for Question {
    fn content_ref(&self) -> ContentRef {
        ContentRef::question(self.id)
    }
}

/// An answer to a question. At most one answer per question carries
/// `is_accepted = true` at any instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: Uuid,
    pub question_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub is_accepted: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ContentAddress for Answer {
    fn content_ref(&self) -> ContentRef {
        ContentRef::answer(self.id)
    }
}

/// A standalone step-by-step solution write-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ContentAddress for Solution {
    fn content_ref(&self) -> ContentRef {
        ContentRef::solution(self.id)
    }
}

/// A signed (like/dislike) vote by one user on one content item.
/// At most one row exists per (user_id, content) pair; the storage
/// layer enforces this with a composite unique constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: ContentRef,
    /// true = like, false = dislike
    pub liked: bool,
    /// Present in the data model for nesting fidelity; no operation
    /// currently creates a child reaction.
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Signed reaction totals for one content item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
}

/// A threaded comment on a content item. Children must share their
/// parent's content reference (no cross-item replies).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: ContentRef,
    pub body: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A comment with its replies eagerly attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentNode {
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

impl CommentNode {
    /// Thread a flat batch of one item's comments into root nodes:
    /// most-recent root first, replies oldest-first within a thread.
    /// Comments whose parent is missing from the batch are dropped
    /// (their thread root was deleted).
    pub fn assemble(comments: Vec<Comment>) -> Vec<CommentNode> {
        fn attach(parent_id: Uuid, pool: &[Comment]) -> Vec<CommentNode> {
            let mut children: Vec<CommentNode> = pool
                .iter()
                .filter(|c| c.parent_id == Some(parent_id))
                .map(|c| CommentNode {
                    comment: c.clone(),
                    children: attach(c.id, pool),
                })
                .collect();
            children.sort_by_key(|n| n.comment.created_at);
            children
        }

        let mut roots: Vec<CommentNode> = comments
            .iter()
            .filter(|c| c.parent_id.is_none())
            .map(|c| CommentNode {
                comment: c.clone(),
                children: attach(c.id, &comments),
            })
            .collect();
        roots.sort_by(|a, b| b.comment.created_at.cmp(&a.comment.created_at));
        roots
    }
}

/// One ranked search result. Both search paths (indexed service and
/// local fallback) produce exactly this shape so callers stay
/// path-agnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: ContentRef,
    pub title: String,
    pub snippet: String,
    pub score: f32,
    pub created_at: DateTime<Utc>,
}

/// A question paired with its reaction score, for popular/trending views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedQuestion {
    pub question: Question,
    pub score: i64,
}

/// Per-user contribution statistics shown on profile pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub user_id: Uuid,
    pub questions: u64,
    pub answers: u64,
    pub solutions: u64,
    pub accepted_answers: u64,
    pub likes_received: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_ref_is_stable_across_variants() {
        let id = Uuid::now_v7();
        let q = Question {
            id,
            author_id: Uuid::now_v7(),
            title: "How do I borrow twice?".into(),
            body: "...".into(),
            created_at: Utc::now(),
            deleted_at: None,
        };
        assert_eq!(q.content_ref(), ContentRef::question(id));
        assert_eq!(q.content_ref().to_string(), format!("question:{id}"));
    }

    #[test]
    fn every_kind_declares_its_searchable_fields() {
        assert_eq!(ContentKind::Question.searchable_fields(), ["title", "body"]);
        assert_eq!(ContentKind::Answer.searchable_fields(), ["body"]);
        assert!(!ContentKind::Solution.searchable_fields().is_empty());
    }
}
