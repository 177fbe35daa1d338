// tests/decay_test.rs


use chrono::{Duration, Utc};
use hybridmem::{MemoryError, MemoryTier};
use sqlx::SqlitePool;
use test_helpers::*;

async fn backdate(pool: &SqlitePool, id: i64, days: i64) {
    let then = (Utc::now() - Duration::days(days)).naive_utc();
    sqlx::query("UPDATE memories SET created_at = ?, last_reinforced_at = ? WHERE id = ?")
        .bind(then)
        .bind(then)
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn importance_halves_at_the_half_life() {
    let embedder = MockEmbedder::new(TEST_DIM);
    let summarizer = MockSummarizer::new("unused");
    let (engine, pool) = create_engine(test_config(), embedder.clone(), summarizer).await;

    let record = engine
        .long_term()
        .create("likes rust", embedder.embedding_for("likes rust"), None)
        .await
        .unwrap();
    assert_eq!(record.importance, 1.0);

    backdate(&pool, record.id, 30).await;
    let updated = engine.long_term().apply_decay(Utc::now()).await.unwrap();
    assert_eq!(updated, 1);

    let decayed = engine.long_term().get(record.id).await.unwrap();
    assert!(
        (decayed.importance - 0.5).abs() < 1e-3,
        "expected ~0.5, got {}",
        decayed.importance
    );
    // Recomputation from the stored base is idempotent.
    engine.long_term().apply_decay(Utc::now()).await.unwrap();
    let again = engine.long_term().get(record.id).await.unwrap();
    assert!((again.importance - decayed.importance).abs() < 1e-3);
}

#[tokio::test]
async fn sweep_prunes_forgotten_records() {
    let embedder = MockEmbedder::new(TEST_DIM);
    let summarizer = MockSummarizer::new("unused");
    let (engine, pool) = create_engine(test_config(), embedder.clone(), summarizer).await;

    let old = engine
        .long_term()
        .create("ancient fact", embedder.embedding_for("ancient fact"), None)
        .await
        .unwrap();
    let fresh = engine
        .long_term()
        .create("fresh fact", embedder.embedding_for("fresh fact"), None)
        .await
        .unwrap();

    // 300 days at a 30-day half-life puts the record far below the floor.
    backdate(&pool, old.id, 300).await;

    let outcome = engine.lifecycle().periodic_sweep().await.unwrap();
    assert_eq!(outcome.pruned, 1);

    assert!(matches!(
        engine.long_term().get(old.id).await,
        Err(MemoryError::NotFound(_))
    ));
    assert!(engine.long_term().get(fresh.id).await.is_ok());
    // The index entry went with the record.
    assert!(!engine.index().contains(old.id));
    assert!(engine.index().contains(fresh.id));
}

#[tokio::test]
async fn forgotten_records_are_excluded_from_search() {
    let embedder = MockEmbedder::new(TEST_DIM);
    let summarizer = MockSummarizer::new("unused");
    let (engine, pool) = create_engine(test_config(), embedder.clone(), summarizer).await;

    let old = engine
        .long_term()
        .create("stale topic", embedder.embedding_for("stale topic"), None)
        .await
        .unwrap();
    backdate(&pool, old.id, 300).await;

    // No sweep has run; lazy pruning still keeps it out of results.
    let hits = engine.search("stale topic", 5).await.unwrap();
    assert!(hits.is_empty());
    assert!(matches!(
        engine.long_term().get(old.id).await,
        Err(MemoryError::NotFound(_))
    ));
}

#[tokio::test]
async fn reinforcement_resets_the_decay_clock() {
    let embedder = MockEmbedder::new(TEST_DIM);
    let summarizer = MockSummarizer::new("unused");
    let (engine, pool) = create_engine(test_config(), embedder.clone(), summarizer).await;

    let record = engine
        .long_term()
        .create("likes hiking", embedder.embedding_for("likes hiking"), None)
        .await
        .unwrap();
    backdate(&pool, record.id, 29).await;
    engine.long_term().apply_decay(Utc::now()).await.unwrap();
    let before = engine.long_term().get(record.id).await.unwrap();
    assert!(before.importance < 1.0);

    engine.long_term().reinforce(record.id).await.unwrap();
    let after = engine.long_term().get(record.id).await.unwrap();
    assert_eq!(after.importance, after.base_importance);
    assert!(after.last_reinforced_at > before.last_reinforced_at);

    // A decay pass right after reinforcement barely moves it.
    engine.long_term().apply_decay(Utc::now()).await.unwrap();
    let settled = engine.long_term().get(record.id).await.unwrap();
    assert!(settled.importance > 0.99);
}

#[tokio::test]
async fn decay_disabled_preserves_importance() {
    let embedder = MockEmbedder::new(TEST_DIM);
    let summarizer = MockSummarizer::new("unused");
    let config = hybridmem::MemoryConfig {
        decay_enabled: false,
        ..test_config()
    };
    let (engine, pool) = create_engine(config, embedder.clone(), summarizer).await;

    let record = engine
        .long_term()
        .create("permanent fact", embedder.embedding_for("permanent fact"), None)
        .await
        .unwrap();
    backdate(&pool, record.id, 3650).await;

    let outcome = engine.lifecycle().periodic_sweep().await.unwrap();
    assert_eq!(outcome.decayed, 0);
    assert_eq!(outcome.pruned, 0);
    let kept = engine.long_term().get(record.id).await.unwrap();
    assert_eq!(kept.importance, 1.0);
}

#[tokio::test]
async fn delete_is_idempotent_not_found() {
    let embedder = MockEmbedder::new(TEST_DIM);
    let summarizer = MockSummarizer::new("unused");
    let (engine, _pool) = create_engine(test_config(), embedder.clone(), summarizer).await;

    let record = engine
        .long_term()
        .create("short lived", embedder.embedding_for("short lived"), None)
        .await
        .unwrap();

    engine.forget(record.id, MemoryTier::Long).await.unwrap();
    assert!(matches!(
        engine.forget(record.id, MemoryTier::Long).await,
        Err(MemoryError::NotFound(id)) if id == record.id
    ));
    assert!(!engine.index().contains(record.id));
}

#[tokio::test]
async fn update_validates_importance_range() {
    let embedder = MockEmbedder::new(TEST_DIM);
    let summarizer = MockSummarizer::new("unused");
    let (engine, _pool) = create_engine(test_config(), embedder.clone(), summarizer).await;

    let record = engine
        .long_term()
        .create("editable", embedder.embedding_for("editable"), None)
        .await
        .unwrap();

    assert!(engine.update_record(record.id, None, Some(1.5)).await.is_err());

    let edited = engine
        .update_record(record.id, Some("edited content"), Some(0.4))
        .await
        .unwrap();
    assert_eq!(edited.content, "edited content");
    assert_eq!(edited.base_importance, 0.4);
}

#[tokio::test]
async fn stats_and_status_aggregate_both_tiers() {
    let embedder = MockEmbedder::new(TEST_DIM);
    let summarizer = MockSummarizer::new("unused");
    let (engine, _pool) = create_engine(test_config(), embedder.clone(), summarizer).await;

    engine
        .on_message("s1", hybridmem::Message::user("hello"))
        .await
        .unwrap();
    engine
        .long_term()
        .create("a fact", embedder.embedding_for("a fact"), Some("s1"))
        .await
        .unwrap();

    let stats = engine.stats().await.unwrap();
    assert_eq!(stats.long_term_records, 1);
    assert_eq!(stats.short_term_sessions, 1);
    assert_eq!(stats.short_term_messages, 1);
    assert!(stats.last_activity.is_some());

    let status = engine.status().await.unwrap();
    assert_eq!(status.long_term_records, 1);
    assert_eq!(status.index_entries, 1);
    assert!(status.decay_enabled);
}
