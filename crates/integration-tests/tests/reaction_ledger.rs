//! Reaction toggling against the real in-memory store: idempotence,
//! sign flips, per-pair uniqueness under concurrency, and count math.

mod support;

use domains::{ContentAddress, DomainEvent, ReactionCounts, ReactionRepo};
use support::{user, Env};

#[tokio::test]
async fn toggling_twice_returns_to_no_reaction() {
    let env = Env::new();
    let author = user();
    let reader = user();
    let q = env
        .content
        .create_question(author, "Borrowing twice?", "How do I do it?")
        .await
        .unwrap();

    for sign in [true, false] {
        let counts = env
            .reactions
            .set_reaction(reader, q.content_ref(), sign)
            .await
            .unwrap();
        let expected = if sign {
            ReactionCounts { likes: 1, dislikes: 0 }
        } else {
            ReactionCounts { likes: 0, dislikes: 1 }
        };
        assert_eq!(counts, expected);

        let counts = env
            .reactions
            .set_reaction(reader, q.content_ref(), sign)
            .await
            .unwrap();
        assert_eq!(counts, ReactionCounts { likes: 0, dislikes: 0 });
    }
}

#[tokio::test]
async fn flipping_sign_updates_in_place() {
    let env = Env::new();
    let author = user();
    let reader = user();
    let q = env
        .content
        .create_question(author, "Lifetimes", "Explain 'static please")
        .await
        .unwrap();

    env.reactions
        .set_reaction(reader, q.content_ref(), true)
        .await
        .unwrap();
    let counts = env
        .reactions
        .set_reaction(reader, q.content_ref(), false)
        .await
        .unwrap();

    assert_eq!(counts, ReactionCounts { likes: 0, dislikes: 1 });
    // Still exactly one row for the pair.
    let reaction = env
        .store
        .find(reader, q.content_ref())
        .await
        .unwrap()
        .unwrap();
    assert!(!reaction.liked);
}

#[tokio::test]
async fn distinct_users_accumulate_counts() {
    let env = Env::new();
    let q = env
        .content
        .create_question(user(), "Unsafe?", "When is it fine?")
        .await
        .unwrap();

    for _ in 0..3 {
        env.reactions
            .set_reaction(user(), q.content_ref(), true)
            .await
            .unwrap();
    }
    let counts = env
        .reactions
        .set_reaction(user(), q.content_ref(), false)
        .await
        .unwrap();
    assert_eq!(counts, ReactionCounts { likes: 3, dislikes: 1 });
}

#[tokio::test]
async fn authors_may_react_to_their_own_content() {
    let env = Env::new();
    let author = user();
    let q = env
        .content
        .create_question(author, "Self-review", "Is this idiomatic?")
        .await
        .unwrap();

    let counts = env
        .reactions
        .set_reaction(author, q.content_ref(), true)
        .await
        .unwrap();
    assert_eq!(counts.likes, 1);
}

#[tokio::test]
async fn concurrent_toggles_never_produce_two_rows_for_one_pair() {
    let env = Env::new();
    let reader = user();
    let q = env
        .content
        .create_question(user(), "Race", "Who wins?")
        .await
        .unwrap();
    let content = q.content_ref();

    // Each task mimics a separate request handler over the shared store.
    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = env.store.clone();
        let tag_cache = env.tag_cache.clone();
        let sink = env.sink.clone();
        handles.push(tokio::spawn(async move {
            let svc = services::ReactionService::new(
                store.clone(),
                store,
                services::CacheService::new(tag_cache),
                sink,
            );
            svc.set_reaction(reader, content, true).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // However the toggles interleaved, the pair holds zero or one rows.
    let row = env.store.find(reader, content).await.unwrap();
    let counts = env.store.counts(content).await.unwrap();
    match row {
        Some(_) => assert_eq!(counts, ReactionCounts { likes: 1, dislikes: 0 }),
        None => assert_eq!(counts, ReactionCounts { likes: 0, dislikes: 0 }),
    }
}

#[tokio::test]
async fn every_settled_toggle_emits_fresh_counts() {
    let env = Env::new();
    let q = env
        .content
        .create_question(user(), "Events", "Do they fire?")
        .await
        .unwrap();

    env.reactions
        .set_reaction(user(), q.content_ref(), true)
        .await
        .unwrap();

    let reaction_events: Vec<_> = env
        .sink
        .events()
        .into_iter()
        .filter(|e| matches!(e, DomainEvent::ReactionChanged { .. }))
        .collect();
    assert_eq!(reaction_events.len(), 1);
    assert!(matches!(
        &reaction_events[0],
        DomainEvent::ReactionChanged { content, counts }
            if *content == q.content_ref() && counts.likes == 1
    ));
}
