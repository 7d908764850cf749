//! The two search paths against real content: a healthy indexed backend
//! serves requests, a failing one degrades to the relational matcher,
//! and both honor soft-deletion and limits.

mod support;

use std::sync::Arc;

use domains::{
    AppError, ContentAddress, ContentKind, ContentRef, MockIndexedSearch, SearchHit,
};
use support::{user, Env};

fn wire_hit(kind: ContentKind, title: &str) -> SearchHit {
    SearchHit {
        content: ContentRef {
            kind,
            id: uuid::Uuid::now_v7(),
        },
        title: title.to_string(),
        snippet: String::new(),
        score: 2.5,
        created_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn healthy_indexed_backend_receives_the_raw_term() {
    let env = Env::new();
    let mut indexed = MockIndexedSearch::new();
    indexed
        .expect_query()
        .withf(|kind, term, limit| {
            *kind == ContentKind::Question && term == "rust (borrow)" && *limit == 10
        })
        .returning(|kind, _, _| Ok(vec![wire_hit(kind, "from the index")]));

    let search = env.search(Some(Arc::new(indexed)));
    let hits = search
        .search(ContentKind::Question, "rust (borrow)", 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "from the index");
}

#[tokio::test]
async fn backend_failure_degrades_to_matching_stored_content() {
    let env = Env::new();
    env.content
        .create_question(user(), "Borrowing in Rust", "How does the borrow checker work?")
        .await
        .unwrap();
    env.content
        .create_question(user(), "Async executors", "Pinning and polling")
        .await
        .unwrap();

    let mut indexed = MockIndexedSearch::new();
    indexed
        .expect_query()
        .returning(|_, _, _| Err(AppError::Unavailable("timeout".into())));

    let search = env.search(Some(Arc::new(indexed)));
    let hits = search
        .search(ContentKind::Question, "rust borrow", 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Borrowing in Rust");
}

#[tokio::test]
async fn fallback_requires_every_term_as_a_prefix() {
    let env = Env::new();
    env.content
        .create_solution(user(), "Borrow checker walkthrough", "step by step")
        .await
        .unwrap();
    env.content
        .create_solution(user(), "Borrowed time", "unrelated musings")
        .await
        .unwrap();

    let search = env.search(None);
    let hits = search
        .search(ContentKind::Solution, "borrow check", 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Borrow checker walkthrough");
}

#[tokio::test]
async fn soft_deleted_content_never_matches_on_the_fallback_path() {
    let env = Env::new();
    let q = env
        .content
        .create_question(user(), "Disappearing act", "now you see me")
        .await
        .unwrap();

    let search = env.search(None);
    assert_eq!(
        search
            .search(ContentKind::Question, "disappearing", 10)
            .await
            .unwrap()
            .len(),
        1
    );

    env.content.soft_delete(q.content_ref()).await.unwrap();
    assert!(search
        .search(ContentKind::Question, "disappearing", 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn operator_only_term_yields_empty_without_touching_the_store() {
    let env = Env::new();
    let search = env.search(None);
    let hits = search
        .search(ContentKind::Question, "+-<>()~@", 10)
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn fallback_honors_the_limit() {
    let env = Env::new();
    for i in 0..5 {
        env.content
            .create_question(user(), &format!("Generics part {i}"), "turbofish syntax")
            .await
            .unwrap();
    }

    let search = env.search(None);
    let hits = search
        .search(ContentKind::Question, "generics", 3)
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
}
