//! # Comment Threads
//!
//! Appends comments to content items and reads back the comment tree.
//! Replies must stay on the same content item as their parent.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use domains::{AppError, Comment, CommentNode, CommentRepo, ContentRef, ContentRepo, Result};

use crate::cache::{content_mutation_tags, CacheService};

/// Body length limits. Reaction-attached discussion threads keep the
/// tighter historical limit; long-form threads get more room.
#[derive(Debug, Clone, Copy)]
pub struct CommentPolicy {
    pub max_body_len: usize,
}

impl Default for CommentPolicy {
    fn default() -> Self {
        Self { max_body_len: 1000 }
    }
}

pub struct CommentService {
    content: Arc<dyn ContentRepo>,
    comments: Arc<dyn CommentRepo>,
    cache: CacheService,
    policy: CommentPolicy,
}

impl CommentService {
    pub fn new(
        content: Arc<dyn ContentRepo>,
        comments: Arc<dyn CommentRepo>,
        cache: CacheService,
        policy: CommentPolicy,
    ) -> Self {
        Self {
            content,
            comments,
            cache,
            policy,
        }
    }

    /// Append a comment to `content`, optionally replying to `parent_id`.
    pub async fn add_comment(
        &self,
        user_id: Uuid,
        content: ContentRef,
        body: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Comment> {
        if body.is_empty() {
            return Err(AppError::validation("body", "must not be empty"));
        }
        if body.chars().count() > self.policy.max_body_len {
            return Err(AppError::validation(
                "body",
                format!("exceeds {} characters", self.policy.max_body_len),
            ));
        }

        let owner = self
            .content
            .owner(content)
            .await?
            .ok_or_else(|| AppError::not_found(content.kind.as_str(), content.id))?;

        if let Some(parent_id) = parent_id {
            let parent = self
                .comments
                .get(parent_id)
                .await?
                .ok_or_else(|| AppError::not_found("comment", parent_id))?;
            // No cross-item replies: the child inherits its parent's item.
            if parent.content != content {
                return Err(AppError::validation(
                    "parent_id",
                    "parent comment belongs to a different content item",
                ));
            }
        }

        let comment = Comment {
            id: Uuid::now_v7(),
            user_id,
            content,
            body: body.to_string(),
            parent_id,
            created_at: Utc::now(),
            deleted_at: None,
        };
        self.comments.insert(&comment).await?;

        self.cache
            .invalidate(&content_mutation_tags(content.kind, Some(owner)))
            .await;

        Ok(comment)
    }

    /// Top-level comments for `content`, most-recent first, with children
    /// eagerly attached.
    pub async fn list_roots(&self, content: ContentRef) -> Result<Vec<CommentNode>> {
        self.comments.roots(content).await
    }
}
