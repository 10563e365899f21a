//! Daily-story idempotency under concurrent requests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};

use lexiloop_core::daily::{DailyConfig, DailyGuard, DailyRequest};
use lexiloop_core::executor::BoundedExecutor;
use lexiloop_core::model::{ArtifactKind, Item, ReviewState, StoryLength};
use lexiloop_core::traits::{ContentGenerator, FixedClock, ReviewStore};
use lexiloop_core::ErrorKind;
use lexiloop_providers::mock::MockGenerator;
use lexiloop_store::MemoryStore;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

async fn seeded_store(terms: &[&str]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    for (i, term) in terms.iter().enumerate() {
        let created = base + chrono::Duration::minutes(i as i64);
        let item = Item::new("alice", term, "", created);
        let state = ReviewState::seed("alice", &item.id, created);
        store.insert_item(item, state).await.unwrap();
    }
    store
}

fn guard(store: Arc<MemoryStore>, generator: Arc<dyn ContentGenerator>) -> DailyGuard {
    DailyGuard::new(
        store,
        generator,
        BoundedExecutor::new(2).unwrap(),
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        )),
        DailyConfig {
            model: "mock-model".into(),
        },
    )
    .with_seed(7)
}

#[tokio::test]
async fn concurrent_requests_store_one_story() {
    let store = seeded_store(&["sol", "luna", "mar", "cielo"]).await;
    let generator =
        Arc::new(MockGenerator::with_fixed_response("Bajo el sol.").with_delay(Duration::from_millis(50)));
    let guard = guard(store.clone(), generator.clone());
    let request = DailyRequest::default();

    let (first, second) = tokio::join!(
        guard.get_or_create("alice", date(), &request),
        guard.get_or_create("alice", date(), &request),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.text, second.text);
    assert_eq!(store.artifact_count("alice").await, 1);
    // Both racers may generate; only one result is kept.
    assert!((1..=2).contains(&generator.call_count()));

    let stored = store
        .get_artifact("alice", ArtifactKind::Daily, date())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, first.id);
}

#[tokio::test]
async fn existing_story_is_returned_without_generating() {
    let store = seeded_store(&["sol"]).await;
    let generator = Arc::new(MockGenerator::with_fixed_response("Hoy."));
    let guard = guard(store.clone(), generator.clone());

    let first = guard
        .get_or_create("alice", date(), &DailyRequest::default())
        .await
        .unwrap();
    let again = guard
        .get_or_create("alice", date(), &DailyRequest::default())
        .await
        .unwrap();

    assert_eq!(first, again);
    assert_eq!(generator.call_count(), 1);

    // A different day gets its own story.
    let next_day = date().succ_opt().unwrap();
    let other = guard
        .get_or_create("alice", next_day, &DailyRequest::default())
        .await
        .unwrap();
    assert_ne!(other.id, first.id);
    assert_eq!(store.artifact_count("alice").await, 2);
}

#[tokio::test]
async fn requested_terms_come_first() {
    let terms: Vec<String> = (0..20).map(|i| format!("w{i:02}")).collect();
    let refs: Vec<&str> = terms.iter().map(String::as_str).collect();
    let store = seeded_store(&refs).await;
    let generator = Arc::new(MockGenerator::with_fixed_response("Story."));
    let guard = guard(store.clone(), generator.clone());

    let request = DailyRequest {
        length: StoryLength::Short,
        requested_terms: vec!["W15".into(), "w03".into()],
        ..DailyRequest::default()
    };
    let artifact = guard.get_or_create("alice", date(), &request).await.unwrap();
    assert_eq!(artifact.target_item_ids.len(), 10);

    let sent = generator.last_request().unwrap();
    assert_eq!(sent.terms.len(), 10);
    assert_eq!(&sent.terms[..2], &["w03".to_string(), "w15".to_string()]);
    assert_eq!(sent.model, "mock-model");

    let mut unique = sent.terms.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 10);
}

#[tokio::test]
async fn small_pool_uses_everything() {
    let store = seeded_store(&["a", "b", "c"]).await;
    let generator = Arc::new(MockGenerator::with_fixed_response("Story."));
    let guard = guard(store, generator);

    let request = DailyRequest {
        length: StoryLength::Long,
        ..DailyRequest::default()
    };
    let artifact = guard.get_or_create("alice", date(), &request).await.unwrap();
    assert_eq!(artifact.target_item_ids.len(), 3);
}

#[tokio::test]
async fn empty_pool_is_invalid() {
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(MockGenerator::with_fixed_response("Story."));
    let guard = guard(store, generator.clone());

    let err = guard
        .get_or_create("alice", date(), &DailyRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn generator_failure_stores_nothing() {
    let store = seeded_store(&["sol"]).await;
    let generator = Arc::new(MockGenerator::failing("quota exhausted"));
    let guard = guard(store.clone(), generator);

    let err = guard
        .get_or_create("alice", date(), &DailyRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert!(err.to_string().contains("quota exhausted"));
    assert_eq!(store.artifact_count("alice").await, 0);
}

#[tokio::test]
async fn save_is_idempotent() {
    let store = seeded_store(&["sol"]).await;
    let generator = Arc::new(MockGenerator::with_fixed_response("Story."));
    let guard = guard(store.clone(), generator);

    let err = guard.save("alice", date()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let created = guard
        .get_or_create("alice", date(), &DailyRequest::default())
        .await
        .unwrap();
    assert!(!created.saved);

    let saved = guard.save("alice", date()).await.unwrap();
    assert!(saved.saved);
    let again = guard.save("alice", date()).await.unwrap();
    assert_eq!(again, saved);

    let stored = store
        .get_artifact("alice", ArtifactKind::Daily, date())
        .await
        .unwrap()
        .unwrap();
    assert!(stored.saved);
    assert_eq!(stored.text, created.text);
}

#[tokio::test]
async fn today_follows_offset_and_rejects_out_of_range() {
    let store = seeded_store(&["sol"]).await;
    let generator = Arc::new(MockGenerator::with_fixed_response("Story."));
    // The clock reads 09:00Z on June 1st.
    let guard = guard(store, generator);

    assert_eq!(guard.today(0).unwrap(), date());
    assert_eq!(guard.today(-600).unwrap(), NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
    assert_eq!(guard.today(840).unwrap(), date());

    for offset in [i32::MIN, i32::MAX, 900] {
        let err = guard.today(offset).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
