//! # In-Memory Store
//!
//! DashMap-backed implementation of the content, reaction, comment, and
//! fallback-search ports on a single struct, so cross-entity cascades
//! (question → answers, purge → reactions/comments) work without a
//! relational engine. Backs the test suites; substitutable anywhere an
//! `Arc<dyn ...Repo>` is expected.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use domains::{
    Answer, AppError, Comment, CommentNode, CommentRepo, ContentKind, ContentRef, ContentRepo,
    ContentSearch, ProfileStats, Question, RankedQuestion, Reaction, ReactionCounts, ReactionRepo,
    Result, SearchHit, Solution,
};

#[derive(Default)]
pub struct MemoryStore {
    questions: DashMap<Uuid, Question>,
    answers: DashMap<Uuid, Answer>,
    solutions: DashMap<Uuid, Solution>,
    reactions: DashMap<Uuid, Reaction>,
    /// (user, content) → reaction id; enforces the at-most-one invariant
    /// the way the relational unique constraint does.
    reaction_pairs: DashMap<(Uuid, ContentRef), Uuid>,
    comments: DashMap<Uuid, Comment>,
    /// Serializes acceptance transitions per process, mirroring the
    /// relational transaction.
    accept_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_question(&self, id: &Uuid) -> Option<Question> {
        self.questions
            .get(id)
            .map(|q| q.clone())
            .filter(|q| q.deleted_at.is_none())
    }

    fn live_answer(&self, id: &Uuid) -> Option<Answer> {
        self.answers
            .get(id)
            .map(|a| a.clone())
            .filter(|a| a.deleted_at.is_none())
    }

    fn live_solution(&self, id: &Uuid) -> Option<Solution> {
        self.solutions
            .get(id)
            .map(|s| s.clone())
            .filter(|s| s.deleted_at.is_none())
    }

    fn reaction_score(&self, content: ContentRef, since: Option<DateTime<Utc>>) -> i64 {
        self.reactions
            .iter()
            .filter(|r| r.content == content)
            .filter(|r| since.map_or(true, |s| r.created_at >= s))
            .map(|r| if r.liked { 1 } else { -1 })
            .sum()
    }

    fn drop_content_attachments(&self, content: ContentRef) {
        let reaction_ids: Vec<Uuid> = self
            .reactions
            .iter()
            .filter(|r| r.content == content)
            .map(|r| r.id)
            .collect();
        for id in reaction_ids {
            if let Some((_, reaction)) = self.reactions.remove(&id) {
                self.reaction_pairs
                    .remove(&(reaction.user_id, reaction.content));
            }
        }
        self.comments.retain(|_, c| c.content != content);
    }
}

#[async_trait]
impl ContentRepo for MemoryStore {
    async fn create_question(&self, question: Question) -> Result<()> {
        self.questions.insert(question.id, question);
        Ok(())
    }

    async fn create_answer(&self, answer: Answer) -> Result<()> {
        self.answers.insert(answer.id, answer);
        Ok(())
    }

    async fn create_solution(&self, solution: Solution) -> Result<()> {
        self.solutions.insert(solution.id, solution);
        Ok(())
    }

    async fn question(&self, id: Uuid) -> Result<Option<Question>> {
        Ok(self.live_question(&id))
    }

    async fn answer(&self, id: Uuid) -> Result<Option<Answer>> {
        Ok(self.live_answer(&id))
    }

    async fn solution(&self, id: Uuid) -> Result<Option<Solution>> {
        Ok(self.live_solution(&id))
    }

    async fn owner(&self, content: ContentRef) -> Result<Option<Uuid>> {
        Ok(match content.kind {
            ContentKind::Question => self.live_question(&content.id).map(|q| q.author_id),
            ContentKind::Answer => self.live_answer(&content.id).map(|a| a.author_id),
            ContentKind::Solution => self.live_solution(&content.id).map(|s| s.author_id),
        })
    }

    async fn answers_for(&self, question_id: Uuid) -> Result<Vec<Answer>> {
        let mut answers: Vec<Answer> = self
            .answers
            .iter()
            .filter(|a| a.question_id == question_id && a.deleted_at.is_none())
            .map(|a| a.clone())
            .collect();
        answers.sort_by_key(|a| a.created_at);
        Ok(answers)
    }

    async fn set_exclusive_acceptance(&self, question_id: Uuid, answer_id: Uuid) -> Result<()> {
        // The guarded state is (), so a poisoned lock is still usable.
        let _guard = self
            .accept_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let target = self
            .live_answer(&answer_id)
            .filter(|a| a.question_id == question_id)
            .ok_or_else(|| AppError::not_found("answer", answer_id))?;

        for mut entry in self.answers.iter_mut() {
            if entry.question_id == question_id {
                entry.is_accepted = entry.id == target.id;
            }
        }
        Ok(())
    }

    async fn clear_acceptance(&self, answer_id: Uuid) -> Result<()> {
        let _guard = self
            .accept_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut answer = self
            .answers
            .get_mut(&answer_id)
            .ok_or_else(|| AppError::not_found("answer", answer_id))?;
        answer.is_accepted = false;
        Ok(())
    }

    async fn soft_delete(&self, content: ContentRef, at: DateTime<Utc>) -> Result<()> {
        match content.kind {
            ContentKind::Question => {
                let mut question = self
                    .questions
                    .get_mut(&content.id)
                    .ok_or_else(|| AppError::not_found("question", content.id))?;
                question.deleted_at = Some(at);
                drop(question);
                // Deleting a question hides its answers as well.
                for mut answer in self.answers.iter_mut() {
                    if answer.question_id == content.id && answer.deleted_at.is_none() {
                        answer.deleted_at = Some(at);
                    }
                }
            }
            ContentKind::Answer => {
                let mut answer = self
                    .answers
                    .get_mut(&content.id)
                    .ok_or_else(|| AppError::not_found("answer", content.id))?;
                answer.deleted_at = Some(at);
            }
            ContentKind::Solution => {
                let mut solution = self
                    .solutions
                    .get_mut(&content.id)
                    .ok_or_else(|| AppError::not_found("solution", content.id))?;
                solution.deleted_at = Some(at);
            }
        }
        Ok(())
    }

    async fn purge_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let expired = |deleted_at: Option<DateTime<Utc>>| {
            deleted_at.map_or(false, |at| at < cutoff)
        };

        let question_ids: Vec<Uuid> = self
            .questions
            .iter()
            .filter(|q| expired(q.deleted_at))
            .map(|q| q.id)
            .collect();
        let answer_ids: Vec<Uuid> = self
            .answers
            .iter()
            .filter(|a| expired(a.deleted_at) || question_ids.contains(&a.question_id))
            .map(|a| a.id)
            .collect();
        let solution_ids: Vec<Uuid> = self
            .solutions
            .iter()
            .filter(|s| expired(s.deleted_at))
            .map(|s| s.id)
            .collect();

        for id in &question_ids {
            self.questions.remove(id);
            self.drop_content_attachments(ContentRef::question(*id));
        }
        for id in &answer_ids {
            self.answers.remove(id);
            self.drop_content_attachments(ContentRef::answer(*id));
        }
        for id in &solution_ids {
            self.solutions.remove(id);
            self.drop_content_attachments(ContentRef::solution(*id));
        }

        Ok((question_ids.len() + answer_ids.len() + solution_ids.len()) as u64)
    }

    async fn recent_questions(&self, limit: usize) -> Result<Vec<Question>> {
        let mut questions: Vec<Question> = self
            .questions
            .iter()
            .filter(|q| q.deleted_at.is_none())
            .map(|q| q.clone())
            .collect();
        questions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        questions.truncate(limit);
        Ok(questions)
    }

    async fn popular_questions(&self, limit: usize) -> Result<Vec<RankedQuestion>> {
        let mut ranked: Vec<RankedQuestion> = self
            .questions
            .iter()
            .filter(|q| q.deleted_at.is_none())
            .map(|q| RankedQuestion {
                score: self.reaction_score(ContentRef::question(q.id), None),
                question: q.clone(),
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(b.question.created_at.cmp(&a.question.created_at))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn trending_questions(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RankedQuestion>> {
        let mut ranked: Vec<RankedQuestion> = self
            .questions
            .iter()
            .filter(|q| q.deleted_at.is_none())
            .map(|q| RankedQuestion {
                score: self.reaction_score(ContentRef::question(q.id), Some(since)),
                question: q.clone(),
            })
            .filter(|r| r.score > 0 || r.question.created_at >= since)
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(b.question.created_at.cmp(&a.question.created_at))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn profile_stats(&self, user_id: Uuid) -> Result<ProfileStats> {
        let questions = self
            .questions
            .iter()
            .filter(|q| q.author_id == user_id && q.deleted_at.is_none())
            .count() as u64;
        let answers: Vec<Answer> = self
            .answers
            .iter()
            .filter(|a| a.author_id == user_id && a.deleted_at.is_none())
            .map(|a| a.clone())
            .collect();
        let solutions = self
            .solutions
            .iter()
            .filter(|s| s.author_id == user_id && s.deleted_at.is_none())
            .count() as u64;
        let accepted_answers = answers.iter().filter(|a| a.is_accepted).count() as u64;

        let owned: Vec<ContentRef> = self
            .questions
            .iter()
            .filter(|q| q.author_id == user_id && q.deleted_at.is_none())
            .map(|q| ContentRef::question(q.id))
            .chain(answers.iter().map(|a| ContentRef::answer(a.id)))
            .chain(
                self.solutions
                    .iter()
                    .filter(|s| s.author_id == user_id && s.deleted_at.is_none())
                    .map(|s| ContentRef::solution(s.id)),
            )
            .collect();
        let likes_received = self
            .reactions
            .iter()
            .filter(|r| r.liked && owned.contains(&r.content))
            .count() as u64;

        Ok(ProfileStats {
            user_id,
            questions,
            answers: answers.len() as u64,
            solutions,
            accepted_answers,
            likes_received,
        })
    }
}

#[async_trait]
impl ReactionRepo for MemoryStore {
    async fn find(&self, user_id: Uuid, content: ContentRef) -> Result<Option<Reaction>> {
        let reaction_id = match self.reaction_pairs.get(&(user_id, content)) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.reactions.get(&reaction_id).map(|r| r.clone()))
    }

    async fn insert(&self, reaction: &Reaction) -> Result<()> {
        match self
            .reaction_pairs
            .entry((reaction.user_id, reaction.content))
        {
            Entry::Occupied(_) => {
                return Err(AppError::Conflict(format!(
                    "reaction already exists for user {} on {}",
                    reaction.user_id, reaction.content
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(reaction.id);
            }
        }
        self.reactions.insert(reaction.id, reaction.clone());
        Ok(())
    }

    async fn set_sign(&self, reaction_id: Uuid, liked: bool) -> Result<()> {
        let mut reaction = self
            .reactions
            .get_mut(&reaction_id)
            .ok_or_else(|| AppError::not_found("reaction", reaction_id))?;
        reaction.liked = liked;
        Ok(())
    }

    async fn delete(&self, reaction_id: Uuid) -> Result<()> {
        let (_, reaction) = self
            .reactions
            .remove(&reaction_id)
            .ok_or_else(|| AppError::not_found("reaction", reaction_id))?;
        self.reaction_pairs
            .remove(&(reaction.user_id, reaction.content));
        Ok(())
    }

    async fn counts(&self, content: ContentRef) -> Result<ReactionCounts> {
        let mut counts = ReactionCounts::default();
        for reaction in self.reactions.iter().filter(|r| r.content == content) {
            if reaction.liked {
                counts.likes += 1;
            } else {
                counts.dislikes += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl CommentRepo for MemoryStore {
    async fn insert(&self, comment: &Comment) -> Result<()> {
        self.comments.insert(comment.id, comment.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Comment>> {
        Ok(self
            .comments
            .get(&id)
            .map(|c| c.clone())
            .filter(|c| c.deleted_at.is_none()))
    }

    async fn roots(&self, content: ContentRef) -> Result<Vec<CommentNode>> {
        let live: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.content == content && c.deleted_at.is_none())
            .map(|c| c.clone())
            .collect();
        Ok(CommentNode::assemble(live))
    }
}

#[async_trait]
impl ContentSearch for MemoryStore {
    async fn match_terms(
        &self,
        kind: ContentKind,
        expr: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let tokens: Vec<String> = expr
            .split_whitespace()
            .map(|t| {
                t.trim_start_matches('+')
                    .trim_end_matches('*')
                    .to_lowercase()
            })
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() || kind.searchable_fields().is_empty() {
            return Ok(Vec::new());
        }

        let matches = |text: &str| -> bool {
            let words: Vec<String> = text
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .map(|w| w.to_lowercase())
                .collect();
            tokens
                .iter()
                .all(|token| words.iter().any(|w| w.starts_with(token.as_str())))
        };

        let mut hits: Vec<SearchHit> = match kind {
            ContentKind::Question => self
                .questions
                .iter()
                .filter(|q| q.deleted_at.is_none())
                .filter(|q| matches(&format!("{} {}", q.title, q.body)))
                .map(|q| SearchHit {
                    content: ContentRef::question(q.id),
                    title: q.title.clone(),
                    snippet: snippet(&q.body),
                    score: 1.0,
                    created_at: q.created_at,
                })
                .collect(),
            ContentKind::Answer => self
                .answers
                .iter()
                .filter(|a| a.deleted_at.is_none())
                .filter(|a| matches(&a.body))
                .map(|a| SearchHit {
                    content: ContentRef::answer(a.id),
                    title: snippet_title(&a.body),
                    snippet: snippet(&a.body),
                    score: 1.0,
                    created_at: a.created_at,
                })
                .collect(),
            ContentKind::Solution => self
                .solutions
                .iter()
                .filter(|s| s.deleted_at.is_none())
                .filter(|s| matches(&format!("{} {}", s.title, s.body)))
                .map(|s| SearchHit {
                    content: ContentRef::solution(s.id),
                    title: s.title.clone(),
                    snippet: snippet(&s.body),
                    score: 1.0,
                    created_at: s.created_at,
                })
                .collect(),
        };

        // Equal relevance → most recent first.
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        hits.truncate(limit);
        Ok(hits)
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}

fn snippet_title(body: &str) -> String {
    body.chars().take(80).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(author_id: Uuid, title: &str, body: &str) -> Question {
        Question {
            id: Uuid::now_v7(),
            author_id,
            title: title.into(),
            body: body.into(),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn duplicate_reaction_insert_conflicts() {
        let store = MemoryStore::new();
        let user = Uuid::now_v7();
        let content = ContentRef::question(Uuid::now_v7());
        let reaction = Reaction {
            id: Uuid::now_v7(),
            user_id: user,
            content,
            liked: true,
            parent_id: None,
            created_at: Utc::now(),
        };
        ReactionRepo::insert(&store, &reaction).await.unwrap();

        let duplicate = Reaction {
            id: Uuid::now_v7(),
            ..reaction.clone()
        };
        let err = ReactionRepo::insert(&store, &duplicate).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn soft_deleted_question_hides_itself_and_its_answers() {
        let store = MemoryStore::new();
        let q = question(Uuid::now_v7(), "t", "b");
        let q_id = q.id;
        store.create_question(q).await.unwrap();
        let answer = Answer {
            id: Uuid::now_v7(),
            question_id: q_id,
            author_id: Uuid::now_v7(),
            body: "a".into(),
            is_accepted: false,
            created_at: Utc::now(),
            deleted_at: None,
        };
        let a_id = answer.id;
        store.create_answer(answer).await.unwrap();

        store
            .soft_delete(ContentRef::question(q_id), Utc::now())
            .await
            .unwrap();

        assert!(store.question(q_id).await.unwrap().is_none());
        assert!(store.answer(a_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn purge_destroys_rows_and_attachments_after_grace() {
        let store = MemoryStore::new();
        let q = question(Uuid::now_v7(), "t", "b");
        let q_id = q.id;
        let content = ContentRef::question(q_id);
        store.create_question(q).await.unwrap();
        ReactionRepo::insert(
            &store,
            &Reaction {
                id: Uuid::now_v7(),
                user_id: Uuid::now_v7(),
                content,
                liked: true,
                parent_id: None,
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        let past = Utc::now() - chrono::Duration::days(30);
        store.soft_delete(content, past).await.unwrap();

        let purged = store.purge_deleted_before(Utc::now()).await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.questions.is_empty());
        assert!(store.reactions.is_empty());
        assert!(store.reaction_pairs.is_empty());
    }

    #[tokio::test]
    async fn prefix_matching_ranks_recent_first() {
        let store = MemoryStore::new();
        store
            .create_question(question(Uuid::now_v7(), "Borrow checker", "lifetimes"))
            .await
            .unwrap();
        store
            .create_question(question(Uuid::now_v7(), "Borrowing twice", "mutable aliasing"))
            .await
            .unwrap();
        store
            .create_question(question(Uuid::now_v7(), "Unrelated", "tokio runtime"))
            .await
            .unwrap();

        let hits = store
            .match_terms(ContentKind::Question, "+borrow*", 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].created_at >= hits[1].created_at);
    }

    #[tokio::test]
    async fn exclusive_acceptance_clears_siblings() {
        let store = MemoryStore::new();
        let q = question(Uuid::now_v7(), "t", "b");
        let q_id = q.id;
        store.create_question(q).await.unwrap();

        let mut ids = Vec::new();
        for _ in 0..3 {
            let answer = Answer {
                id: Uuid::now_v7(),
                question_id: q_id,
                author_id: Uuid::now_v7(),
                body: "a".into(),
                is_accepted: false,
                created_at: Utc::now(),
                deleted_at: None,
            };
            ids.push(answer.id);
            store.create_answer(answer).await.unwrap();
        }

        store.set_exclusive_acceptance(q_id, ids[0]).await.unwrap();
        store.set_exclusive_acceptance(q_id, ids[2]).await.unwrap();

        let accepted: Vec<Uuid> = store
            .answers_for(q_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.is_accepted)
            .map(|a| a.id)
            .collect();
        assert_eq!(accepted, vec![ids[2]]);
    }

    #[tokio::test]
    async fn acceptance_survives_a_poisoned_lock() {
        let store = MemoryStore::new();
        let q = question(Uuid::now_v7(), "t", "b");
        let q_id = q.id;
        store.create_question(q).await.unwrap();
        let answer = Answer {
            id: Uuid::now_v7(),
            question_id: q_id,
            author_id: Uuid::now_v7(),
            body: "a".into(),
            is_accepted: false,
            created_at: Utc::now(),
            deleted_at: None,
        };
        let a_id = answer.id;
        store.create_answer(answer).await.unwrap();

        // Panic while holding the lock to poison it.
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.accept_lock.lock().unwrap();
            panic!("poison");
        }));
        assert!(result.is_err());
        assert!(store.accept_lock.is_poisoned());

        store.set_exclusive_acceptance(q_id, a_id).await.unwrap();
        assert!(store.answer(a_id).await.unwrap().unwrap().is_accepted);
        store.clear_acceptance(a_id).await.unwrap();
        assert!(!store.answer(a_id).await.unwrap().unwrap().is_accepted);
    }
}
