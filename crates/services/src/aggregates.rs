//! # Aggregate Query Service
//!
//! Cached derived read views: popular/recent/trending question lists
//! and per-user profile statistics. Every view is computed from the
//! relational store and cached under the tags the mutation paths flush,
//! so a reaction, comment, acceptance, or content write is visible on
//! the very next read.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use domains::{ContentKind, ContentRepo, ProfileStats, Question, RankedQuestion, Result};

use crate::cache::{user_tag, CacheService};

const NAMESPACE: &str = "aggregates";

/// TTLs and the trending recency window.
#[derive(Debug, Clone, Copy)]
pub struct AggregatePolicy {
    pub ttl: Duration,
    pub trending_window: Duration,
}

impl Default for AggregatePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            trending_window: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

pub struct AggregateService {
    content: Arc<dyn ContentRepo>,
    cache: CacheService,
    policy: AggregatePolicy,
}

impl AggregateService {
    pub fn new(content: Arc<dyn ContentRepo>, cache: CacheService, policy: AggregatePolicy) -> Self {
        Self {
            content,
            cache,
            policy,
        }
    }

    pub async fn popular_questions(&self, limit: usize) -> Result<Vec<RankedQuestion>> {
        let tags = view_tags("popular");
        self.cache
            .get_or_compute(
                NAMESPACE,
                &format!("popular:{limit}"),
                &tags,
                self.policy.ttl,
                || async { self.content.popular_questions(limit).await },
            )
            .await
    }

    pub async fn recent_questions(&self, limit: usize) -> Result<Vec<Question>> {
        let tags = view_tags("recent");
        self.cache
            .get_or_compute(
                NAMESPACE,
                &format!("recent:{limit}"),
                &tags,
                self.policy.ttl,
                || async { self.content.recent_questions(limit).await },
            )
            .await
    }

    pub async fn trending_questions(&self, limit: usize) -> Result<Vec<RankedQuestion>> {
        let since = Utc::now()
            - chrono::Duration::from_std(self.policy.trending_window)
                .unwrap_or_else(|_| chrono::Duration::days(7));
        let tags = view_tags("trending");
        self.cache
            .get_or_compute(
                NAMESPACE,
                &format!("trending:{limit}"),
                &tags,
                self.policy.ttl,
                || async { self.content.trending_questions(since, limit).await },
            )
            .await
    }

    pub async fn profile_stats(&self, user_id: Uuid) -> Result<ProfileStats> {
        let tags = vec!["users".to_string(), user_tag(user_id)];
        self.cache
            .get_or_compute(
                NAMESPACE,
                &format!("profile:{user_id}"),
                &tags,
                self.policy.ttl,
                || async { self.content.profile_stats(user_id).await },
            )
            .await
    }
}

fn view_tags(view: &str) -> Vec<String> {
    vec![
        ContentKind::Question.cache_tag().to_string(),
        view.to_string(),
    ]
}
