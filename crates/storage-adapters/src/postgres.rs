//! # Postgres Store
//!
//! sqlx implementation of the content, reaction, comment, and
//! fallback-search ports. Acceptance transitions and cascading purges
//! run inside transactions; the reaction uniqueness invariant lives in
//! a composite unique index and surfaces as `AppError::Conflict` for
//! the ledger to retry as an update. Boolean-mode match expressions
//! (`+tok*`) are translated to prefix tsqueries over each kind's
//! searchable columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use domains::{
    Answer, AppError, Comment, CommentNode, CommentRepo, ContentKind, ContentRef, ContentRepo,
    ContentSearch, ProfileStats, Question, RankedQuestion, Reaction, ReactionCounts, ReactionRepo,
    Result, SearchHit, Solution,
};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await.map_err(map_db_err)?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Storage(format!("migration failed: {e}")))?;
        Ok(())
    }
}

fn map_db_err(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return AppError::Conflict(db.message().to_string());
        }
    }
    AppError::Storage(err.to_string())
}

fn table(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Question => "questions",
        ContentKind::Answer => "answers",
        ContentKind::Solution => "solutions",
    }
}

fn question_from_row(row: &PgRow) -> Question {
    Question {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        body: row.get("body"),
        created_at: row.get("created_at"),
        deleted_at: row.get("deleted_at"),
    }
}

fn answer_from_row(row: &PgRow) -> Answer {
    Answer {
        id: row.get("id"),
        question_id: row.get("question_id"),
        author_id: row.get("author_id"),
        body: row.get("body"),
        is_accepted: row.get("is_accepted"),
        created_at: row.get("created_at"),
        deleted_at: row.get("deleted_at"),
    }
}

fn solution_from_row(row: &PgRow) -> Solution {
    Solution {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        body: row.get("body"),
        created_at: row.get("created_at"),
        deleted_at: row.get("deleted_at"),
    }
}

#[async_trait]
impl ContentRepo for PgStore {
    async fn create_question(&self, question: Question) -> Result<()> {
        sqlx::query(
            "INSERT INTO questions (id, author_id, title, body, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(question.id)
        .bind(question.author_id)
        .bind(&question.title)
        .bind(&question.body)
        .bind(question.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn create_answer(&self, answer: Answer) -> Result<()> {
        sqlx::query(
            "INSERT INTO answers (id, question_id, author_id, body, is_accepted, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(answer.id)
        .bind(answer.question_id)
        .bind(answer.author_id)
        .bind(&answer.body)
        .bind(answer.is_accepted)
        .bind(answer.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn create_solution(&self, solution: Solution) -> Result<()> {
        sqlx::query(
            "INSERT INTO solutions (id, author_id, title, body, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(solution.id)
        .bind(solution.author_id)
        .bind(&solution.title)
        .bind(&solution.body)
        .bind(solution.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn question(&self, id: Uuid) -> Result<Option<Question>> {
        let row = sqlx::query("SELECT * FROM questions WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(row.as_ref().map(question_from_row))
    }

    async fn answer(&self, id: Uuid) -> Result<Option<Answer>> {
        let row = sqlx::query("SELECT * FROM answers WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(row.as_ref().map(answer_from_row))
    }

    async fn solution(&self, id: Uuid) -> Result<Option<Solution>> {
        let row = sqlx::query("SELECT * FROM solutions WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(row.as_ref().map(solution_from_row))
    }

    async fn owner(&self, content: ContentRef) -> Result<Option<Uuid>> {
        let sql = format!(
            "SELECT author_id FROM {} WHERE id = $1 AND deleted_at IS NULL",
            table(content.kind)
        );
        let row = sqlx::query(&sql)
            .bind(content.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(row.map(|r| r.get("author_id")))
    }

    async fn answers_for(&self, question_id: Uuid) -> Result<Vec<Answer>> {
        let rows = sqlx::query(
            "SELECT * FROM answers \
             WHERE question_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at ASC",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(rows.iter().map(answer_from_row).collect())
    }

    /// "Clear siblings, set target" as one transaction: a concurrent
    /// reader sees the old accepted answer or the new one, never both.
    async fn set_exclusive_acceptance(&self, question_id: Uuid, answer_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        sqlx::query("UPDATE answers SET is_accepted = FALSE WHERE question_id = $1 AND is_accepted")
            .bind(question_id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        let updated = sqlx::query(
            "UPDATE answers SET is_accepted = TRUE \
             WHERE id = $1 AND question_id = $2 AND deleted_at IS NULL",
        )
        .bind(answer_id)
        .bind(question_id)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?;

        if updated.rows_affected() != 1 {
            // Dropping the transaction rolls the sibling clear back.
            return Err(AppError::not_found("answer", answer_id));
        }

        tx.commit().await.map_err(map_db_err)?;
        Ok(())
    }

    async fn clear_acceptance(&self, answer_id: Uuid) -> Result<()> {
        let updated = sqlx::query("UPDATE answers SET is_accepted = FALSE WHERE id = $1")
            .bind(answer_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        if updated.rows_affected() != 1 {
            return Err(AppError::not_found("answer", answer_id));
        }
        Ok(())
    }

    async fn soft_delete(&self, content: ContentRef, at: DateTime<Utc>) -> Result<()> {
        if content.kind == ContentKind::Question {
            let mut tx = self.pool.begin().await.map_err(map_db_err)?;
            let updated = sqlx::query(
                "UPDATE questions SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL",
            )
            .bind(content.id)
            .bind(at)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
            if updated.rows_affected() != 1 {
                return Err(AppError::not_found("question", content.id));
            }
            sqlx::query(
                "UPDATE answers SET deleted_at = $2 \
                 WHERE question_id = $1 AND deleted_at IS NULL",
            )
            .bind(content.id)
            .bind(at)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
            tx.commit().await.map_err(map_db_err)?;
            return Ok(());
        }

        let sql = format!(
            "UPDATE {} SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL",
            table(content.kind)
        );
        let updated = sqlx::query(&sql)
            .bind(content.id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        if updated.rows_affected() != 1 {
            return Err(AppError::not_found(content.kind.as_str(), content.id));
        }
        Ok(())
    }

    async fn purge_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        let question_ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM questions WHERE deleted_at < $1")
                .bind(cutoff)
                .fetch_all(&mut *tx)
                .await
                .map_err(map_db_err)?;
        // Answers go with their question regardless of their own marker.
        let answer_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM answers WHERE deleted_at < $1 OR question_id = ANY($2)",
        )
        .bind(cutoff)
        .bind(&question_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_db_err)?;
        let solution_ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM solutions WHERE deleted_at < $1")
                .bind(cutoff)
                .fetch_all(&mut *tx)
                .await
                .map_err(map_db_err)?;

        // Reactions and comments are polymorphic (no FK); destroy them
        // explicitly alongside their content.
        for (kind, ids) in [
            (ContentKind::Question, &question_ids),
            (ContentKind::Answer, &answer_ids),
            (ContentKind::Solution, &solution_ids),
        ] {
            sqlx::query("DELETE FROM reactions WHERE content_kind = $1 AND content_id = ANY($2)")
                .bind(kind.as_str())
                .bind(ids)
                .execute(&mut *tx)
                .await
                .map_err(map_db_err)?;
            sqlx::query("DELETE FROM comments WHERE content_kind = $1 AND content_id = ANY($2)")
                .bind(kind.as_str())
                .bind(ids)
                .execute(&mut *tx)
                .await
                .map_err(map_db_err)?;
        }

        sqlx::query("DELETE FROM answers WHERE id = ANY($1)")
            .bind(&answer_ids)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
        sqlx::query("DELETE FROM questions WHERE id = ANY($1)")
            .bind(&question_ids)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
        sqlx::query("DELETE FROM solutions WHERE id = ANY($1)")
            .bind(&solution_ids)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;
        Ok((question_ids.len() + answer_ids.len() + solution_ids.len()) as u64)
    }

    async fn recent_questions(&self, limit: usize) -> Result<Vec<Question>> {
        let rows = sqlx::query(
            "SELECT * FROM questions WHERE deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(rows.iter().map(question_from_row).collect())
    }

    async fn popular_questions(&self, limit: usize) -> Result<Vec<RankedQuestion>> {
        let rows = sqlx::query(
            "SELECT q.id, q.author_id, q.title, q.body, q.created_at, q.deleted_at, \
                    COALESCE(SUM(CASE WHEN r.liked THEN 1 ELSE -1 END), 0)::BIGINT AS score \
             FROM questions q \
             LEFT JOIN reactions r ON r.content_kind = 'question' AND r.content_id = q.id \
             WHERE q.deleted_at IS NULL \
             GROUP BY q.id \
             ORDER BY score DESC, q.created_at DESC \
             LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(rows
            .iter()
            .map(|row| RankedQuestion {
                question: question_from_row(row),
                score: row.get("score"),
            })
            .collect())
    }

    async fn trending_questions(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RankedQuestion>> {
        let rows = sqlx::query(
            "SELECT q.id, q.author_id, q.title, q.body, q.created_at, q.deleted_at, \
                    COALESCE(SUM(CASE WHEN r.liked THEN 1 ELSE -1 END), 0)::BIGINT AS score \
             FROM questions q \
             LEFT JOIN reactions r ON r.content_kind = 'question' AND r.content_id = q.id \
                                   AND r.created_at >= $1 \
             WHERE q.deleted_at IS NULL \
             GROUP BY q.id \
             HAVING COALESCE(SUM(CASE WHEN r.liked THEN 1 ELSE -1 END), 0) > 0 \
                 OR q.created_at >= $1 \
             ORDER BY score DESC, q.created_at DESC \
             LIMIT $2",
        )
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(rows
            .iter()
            .map(|row| RankedQuestion {
                question: question_from_row(row),
                score: row.get("score"),
            })
            .collect())
    }

    async fn profile_stats(&self, user_id: Uuid) -> Result<ProfileStats> {
        let row = sqlx::query(
            "SELECT \
               (SELECT COUNT(*) FROM questions WHERE author_id = $1 AND deleted_at IS NULL) AS questions, \
               (SELECT COUNT(*) FROM answers WHERE author_id = $1 AND deleted_at IS NULL) AS answers, \
               (SELECT COUNT(*) FROM solutions WHERE author_id = $1 AND deleted_at IS NULL) AS solutions, \
               (SELECT COUNT(*) FROM answers WHERE author_id = $1 AND deleted_at IS NULL AND is_accepted) AS accepted_answers, \
               (SELECT COUNT(*) FROM reactions r WHERE r.liked AND ( \
                  (r.content_kind = 'question' AND EXISTS (SELECT 1 FROM questions q WHERE q.id = r.content_id AND q.author_id = $1 AND q.deleted_at IS NULL)) OR \
                  (r.content_kind = 'answer' AND EXISTS (SELECT 1 FROM answers a WHERE a.id = r.content_id AND a.author_id = $1 AND a.deleted_at IS NULL)) OR \
                  (r.content_kind = 'solution' AND EXISTS (SELECT 1 FROM solutions s WHERE s.id = r.content_id AND s.author_id = $1 AND s.deleted_at IS NULL)) \
               )) AS likes_received",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(ProfileStats {
            user_id,
            questions: row.get::<i64, _>("questions") as u64,
            answers: row.get::<i64, _>("answers") as u64,
            solutions: row.get::<i64, _>("solutions") as u64,
            accepted_answers: row.get::<i64, _>("accepted_answers") as u64,
            likes_received: row.get::<i64, _>("likes_received") as u64,
        })
    }
}

#[async_trait]
impl ReactionRepo for PgStore {
    async fn find(&self, user_id: Uuid, content: ContentRef) -> Result<Option<Reaction>> {
        let row = sqlx::query(
            "SELECT id, liked, parent_id, created_at FROM reactions \
             WHERE user_id = $1 AND content_kind = $2 AND content_id = $3",
        )
        .bind(user_id)
        .bind(content.kind.as_str())
        .bind(content.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(row.map(|row| Reaction {
            id: row.get("id"),
            user_id,
            content,
            liked: row.get("liked"),
            parent_id: row.get("parent_id"),
            created_at: row.get("created_at"),
        }))
    }

    async fn insert(&self, reaction: &Reaction) -> Result<()> {
        // The unique index on (user_id, content_kind, content_id) turns
        // a same-user race into AppError::Conflict for the ledger.
        sqlx::query(
            "INSERT INTO reactions (id, user_id, content_kind, content_id, liked, parent_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(reaction.id)
        .bind(reaction.user_id)
        .bind(reaction.content.kind.as_str())
        .bind(reaction.content.id)
        .bind(reaction.liked)
        .bind(reaction.parent_id)
        .bind(reaction.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn set_sign(&self, reaction_id: Uuid, liked: bool) -> Result<()> {
        let updated = sqlx::query("UPDATE reactions SET liked = $2 WHERE id = $1")
            .bind(reaction_id)
            .bind(liked)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        if updated.rows_affected() != 1 {
            return Err(AppError::not_found("reaction", reaction_id));
        }
        Ok(())
    }

    async fn delete(&self, reaction_id: Uuid) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM reactions WHERE id = $1")
            .bind(reaction_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        if deleted.rows_affected() != 1 {
            return Err(AppError::not_found("reaction", reaction_id));
        }
        Ok(())
    }

    async fn counts(&self, content: ContentRef) -> Result<ReactionCounts> {
        let row = sqlx::query(
            "SELECT COUNT(*) FILTER (WHERE liked) AS likes, \
                    COUNT(*) FILTER (WHERE NOT liked) AS dislikes \
             FROM reactions WHERE content_kind = $1 AND content_id = $2",
        )
        .bind(content.kind.as_str())
        .bind(content.id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(ReactionCounts {
            likes: row.get("likes"),
            dislikes: row.get("dislikes"),
        })
    }
}

#[async_trait]
impl CommentRepo for PgStore {
    async fn insert(&self, comment: &Comment) -> Result<()> {
        sqlx::query(
            "INSERT INTO comments (id, user_id, content_kind, content_id, body, parent_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(comment.id)
        .bind(comment.user_id)
        .bind(comment.content.kind.as_str())
        .bind(comment.content.id)
        .bind(&comment.body)
        .bind(comment.parent_id)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "SELECT * FROM comments WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(row.as_ref().map(comment_from_row))
    }

    async fn roots(&self, content: ContentRef) -> Result<Vec<CommentNode>> {
        let rows = sqlx::query(
            "SELECT * FROM comments \
             WHERE content_kind = $1 AND content_id = $2 AND deleted_at IS NULL",
        )
        .bind(content.kind.as_str())
        .bind(content.id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(CommentNode::assemble(
            rows.iter().map(comment_from_row).collect(),
        ))
    }
}

fn comment_from_row(row: &PgRow) -> Comment {
    let kind = match row.get::<&str, _>("content_kind") {
        "answer" => ContentKind::Answer,
        "solution" => ContentKind::Solution,
        _ => ContentKind::Question,
    };
    Comment {
        id: row.get("id"),
        user_id: row.get("user_id"),
        content: ContentRef {
            kind,
            id: row.get("content_id"),
        },
        body: row.get("body"),
        parent_id: row.get("parent_id"),
        created_at: row.get("created_at"),
        deleted_at: row.get("deleted_at"),
    }
}

#[async_trait]
impl ContentSearch for PgStore {
    async fn match_terms(
        &self,
        kind: ContentKind,
        expr: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let query = match prefix_tsquery(expr) {
            Some(q) if !kind.searchable_fields().is_empty() => q,
            _ => return Ok(Vec::new()),
        };

        let vector = kind
            .searchable_fields()
            .iter()
            .map(|f| format!("coalesce({f}, '')"))
            .collect::<Vec<_>>()
            .join(" || ' ' || ");
        let title_expr = match kind {
            ContentKind::Answer => "left(body, 80)",
            _ => "title",
        };
        let sql = format!(
            "SELECT id, {title_expr} AS title, left(body, 200) AS snippet, created_at, \
                    ts_rank(to_tsvector('english', {vector}), to_tsquery('english', $1)) AS score \
             FROM {} \
             WHERE deleted_at IS NULL \
               AND to_tsvector('english', {vector}) @@ to_tsquery('english', $1) \
             ORDER BY created_at DESC \
             LIMIT $2",
            table(kind)
        );

        let rows = sqlx::query(&sql)
            .bind(&query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(rows
            .iter()
            .map(|row| SearchHit {
                content: ContentRef {
                    kind,
                    id: row.get("id"),
                },
                title: row.get("title"),
                snippet: row.get("snippet"),
                score: row.get("score"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}

/// Translate a sanitized `+tok*` expression into a Postgres prefix
/// tsquery (`tok:* & tok2:*`). Tokens are reduced to alphanumerics so
/// no tsquery syntax can leak through from user input.
fn prefix_tsquery(expr: &str) -> Option<String> {
    let terms: Vec<String> = expr
        .split_whitespace()
        .map(|t| t.trim_start_matches('+').trim_end_matches('*'))
        .map(|t| t.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|t| !t.is_empty())
        .map(|t| format!("{t}:*"))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" & "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsquery_translation_keeps_required_prefix_semantics() {
        assert_eq!(
            prefix_tsquery("+rust* +borrow*").as_deref(),
            Some("rust:* & borrow:*")
        );
    }

    #[test]
    fn tsquery_translation_drops_non_alphanumerics() {
        assert_eq!(
            prefix_tsquery("+o'neil* +x&y*").as_deref(),
            Some("oneil:* & xy:*")
        );
        assert_eq!(prefix_tsquery("+'* +&*"), None);
        assert_eq!(prefix_tsquery(""), None);
    }
}
