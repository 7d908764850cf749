//! Invalidation completeness: after any canonical mutation, the next
//! aggregate read reflects it, cached or not.

mod support;

use domains::ContentAddress;
use support::{user, Env};

#[tokio::test]
async fn new_question_shows_up_on_the_next_recent_read() {
    let env = Env::new();
    env.content
        .create_question(user(), "Old news", "already here")
        .await
        .unwrap();

    // Prime the cache.
    assert_eq!(env.aggregates.recent_questions(10).await.unwrap().len(), 1);

    env.content
        .create_question(user(), "Hot off the press", "brand new")
        .await
        .unwrap();

    let recent = env.aggregates.recent_questions(10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].title, "Hot off the press");
}

#[tokio::test]
async fn reaction_reorders_the_popular_view_immediately() {
    let env = Env::new();
    let q1 = env
        .content
        .create_question(user(), "First", "one")
        .await
        .unwrap();
    let q2 = env
        .content
        .create_question(user(), "Second", "two")
        .await
        .unwrap();

    env.reactions
        .set_reaction(user(), q1.content_ref(), true)
        .await
        .unwrap();
    let popular = env.aggregates.popular_questions(10).await.unwrap();
    assert_eq!(popular[0].question.id, q1.id);

    // Two likes on q2 must surface on the very next read.
    env.reactions
        .set_reaction(user(), q2.content_ref(), true)
        .await
        .unwrap();
    env.reactions
        .set_reaction(user(), q2.content_ref(), true)
        .await
        .unwrap();

    let popular = env.aggregates.popular_questions(10).await.unwrap();
    assert_eq!(popular[0].question.id, q2.id);
    assert_eq!(popular[0].score, 2);
}

#[tokio::test]
async fn acceptance_refreshes_both_authors_profile_stats() {
    let env = Env::new();
    let asker = user();
    let answerer = user();
    let q = env
        .content
        .create_question(asker, "Stats", "watch the profiles")
        .await
        .unwrap();
    let a = env
        .content
        .create_answer(answerer, q.id, "the answer")
        .await
        .unwrap();

    // Prime both profiles.
    assert_eq!(
        env.aggregates.profile_stats(answerer).await.unwrap().accepted_answers,
        0
    );
    env.aggregates.profile_stats(asker).await.unwrap();

    env.acceptance.toggle_acceptance(a.id, asker).await.unwrap();

    let stats = env.aggregates.profile_stats(answerer).await.unwrap();
    assert_eq!(stats.accepted_answers, 1);
}

#[tokio::test]
async fn soft_delete_drops_the_item_from_cached_views() {
    let env = Env::new();
    let q = env
        .content
        .create_question(user(), "Ephemeral", "here and gone")
        .await
        .unwrap();
    assert_eq!(env.aggregates.recent_questions(10).await.unwrap().len(), 1);

    env.content.soft_delete(q.content_ref()).await.unwrap();
    assert!(env.aggregates.recent_questions(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn unrelated_views_stay_cached_across_a_mutation() {
    let env = Env::new();
    let author = user();
    let q = env
        .content
        .create_question(author, "Stable", "cached view")
        .await
        .unwrap();

    let bystander = user();
    env.aggregates.profile_stats(bystander).await.unwrap();

    // A reaction on the question flushes question views and the author's
    // profile, not the bystander's.
    env.reactions
        .set_reaction(user(), q.content_ref(), true)
        .await
        .unwrap();

    // Still served from cache: the stored value round-trips unchanged.
    let stats = env.aggregates.profile_stats(bystander).await.unwrap();
    assert_eq!(stats.questions, 0);
}
