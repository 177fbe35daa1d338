// tests/recall_test.rs


use chrono::{Duration, Utc};
use hybridmem::{MemoryError, Message};
use test_helpers::*;

#[tokio::test]
async fn context_merges_semantic_hits_with_recent_dialogue() {
    let embedder = MockEmbedder::new(TEST_DIM);
    let summarizer = MockSummarizer::new("unused");
    let (engine, _pool) = create_engine(test_config(), embedder.clone(), summarizer).await;

    engine
        .long_term()
        .create("user likes hiking", embedder.embedding_for("user likes hiking"), None)
        .await
        .unwrap();
    engine.on_message("s1", Message::user("what should I do this weekend?")).await.unwrap();

    let context = engine.build_context("s1", "user likes hiking").await.unwrap();
    assert_eq!(context.semantic.len(), 1);
    assert_eq!(context.semantic[0].record.content, "user likes hiking");
    assert_eq!(context.recent.len(), 1);

    let rendered = context.render();
    let long_pos = rendered.find("Long-term memory").unwrap();
    let short_pos = rendered.find("Short-term memory").unwrap();
    assert!(long_pos < short_pos);
}

#[tokio::test]
async fn duplicate_content_appears_once_across_tiers() {
    let embedder = MockEmbedder::new(TEST_DIM);
    let summarizer = MockSummarizer::new("unused");
    let (engine, _pool) = create_engine(test_config(), embedder.clone(), summarizer).await;

    engine
        .long_term()
        .create("prefers tea over coffee", embedder.embedding_for("prefers tea over coffee"), None)
        .await
        .unwrap();
    // The same text also sits in the recent window.
    engine
        .on_message("s1", Message::user("prefers tea over coffee"))
        .await
        .unwrap();
    engine.on_message("s1", Message::assistant("noted")).await.unwrap();

    let context = engine
        .build_context("s1", "prefers tea over coffee")
        .await
        .unwrap();

    // Long-term wins; the short-term duplicate is dropped.
    assert_eq!(context.semantic.len(), 1);
    let recent: Vec<&str> = context.recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(recent, vec!["noted"]);
}

#[tokio::test]
async fn embedding_failure_degrades_to_recency_only() {
    let embedder = MockEmbedder::new(TEST_DIM);
    let summarizer = MockSummarizer::new("unused");
    let (engine, _pool) = create_engine(test_config(), embedder.clone(), summarizer).await;

    engine
        .long_term()
        .create("a relevant memory", embedder.embedding_for("a relevant memory"), None)
        .await
        .unwrap();
    engine.on_message("s1", Message::user("hello there")).await.unwrap();

    embedder.set_failing(true);
    let context = engine.build_context("s1", "a relevant memory").await.unwrap();
    assert!(context.semantic.is_empty());
    assert_eq!(context.recent.len(), 1);

    // The manual search command surfaces the same failure instead.
    assert!(matches!(
        engine.search("a relevant memory", 5).await,
        Err(MemoryError::EmbeddingFailed(_))
    ));
}

#[tokio::test]
async fn recall_reinforces_surfaced_hits() {
    let embedder = MockEmbedder::new(TEST_DIM);
    let summarizer = MockSummarizer::new("unused");
    let (engine, pool) = create_engine(test_config(), embedder.clone(), summarizer).await;

    let record = engine
        .long_term()
        .create("remember this", embedder.embedding_for("remember this"), None)
        .await
        .unwrap();
    let then = (Utc::now() - Duration::days(20)).naive_utc();
    sqlx::query("UPDATE memories SET last_reinforced_at = ? WHERE id = ?")
        .bind(then)
        .bind(record.id)
        .execute(&pool)
        .await
        .unwrap();

    let context = engine.build_context("s1", "remember this").await.unwrap();
    assert_eq!(context.semantic.len(), 1);

    let after = engine.long_term().get(record.id).await.unwrap();
    assert_eq!(after.importance, after.base_importance);
    assert!(after.last_reinforced_at > Utc::now() - Duration::minutes(1));
}

#[tokio::test]
async fn search_results_are_ranked_and_capped() {
    let embedder = MockEmbedder::new(TEST_DIM);
    let summarizer = MockSummarizer::new("unused");
    let (engine, _pool) = create_engine(test_config(), embedder.clone(), summarizer).await;

    for content in ["alpha", "beta", "gamma", "delta"] {
        engine
            .long_term()
            .create(content, embedder.embedding_for(content), None)
            .await
            .unwrap();
    }

    let hits = engine.search("alpha", 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].record.content, "alpha");
    assert!(hits[0].similarity >= hits[1].similarity);
    assert!((hits[0].similarity - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn stale_index_entries_are_dropped_and_index_heals() {
    let embedder = MockEmbedder::new(TEST_DIM);
    let summarizer = MockSummarizer::new("unused");
    let (engine, _pool) = create_engine(test_config(), embedder.clone(), summarizer).await;

    engine
        .long_term()
        .create("real record", embedder.embedding_for("real record"), None)
        .await
        .unwrap();
    // A phantom entry with no backing record.
    engine
        .index()
        .insert(999, embedder.embedding_for("real record"))
        .unwrap();

    let hits = engine.search("real record", 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.content, "real record");

    // The detected divergence schedules a rebuild that evicts the phantom.
    let index = engine.index().clone();
    assert!(
        wait_until(move || {
            let index = index.clone();
            Box::pin(async move { !index.contains(999) })
        })
        .await,
        "index was never rebuilt"
    );
    assert_eq!(engine.index().len(), 1);
}
