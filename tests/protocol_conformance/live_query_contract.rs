//! Live query contract

use crate::test_utils::*;
use std::time::Duration;
use tessera::{EngineConfig, Error, LiveState, LiveUpdate, QueryBuilder};

fn watched(token: u64) -> tessera::EntityQuery {
    QueryBuilder::new()
        .with_trait("myapp.Note", None)
        .watch(token)
        .build()
        .unwrap()
}

async fn next_changed(live: &mut tessera::LiveQuery) -> tessera::EntityResults {
    let update = tokio::time::timeout(Duration::from_secs(5), live.next())
        .await
        .expect("push within timeout")
        .expect("stream open")
        .unwrap();
    match update {
        LiveUpdate::Changed(results) => results,
        other => panic!("expected a changed page, got {:?}", other),
    }
}

#[tokio::test]
async fn put_pushes_page_with_new_hash() {
    let store = store();
    let mut live = store.watch(watched(42)).await.unwrap();
    let initial = next_changed(&mut live).await;
    assert!(initial.is_empty());

    put_note(&store, "e1", "t1", note("new", "")).await;
    let pushed = next_changed(&mut live).await;
    assert_ne!(pushed.hash, initial.hash);
    let entity = pushed.entities[0].entity.as_ref().unwrap();
    assert!(entity.trait_by_id("t1").is_some());
    assert_eq!(live.hash(), Some(pushed.hash));
}

#[tokio::test]
async fn unrelated_write_yields_unchanged_summary() {
    let store = store_with(EngineConfig {
        notify_unchanged: true,
        ..EngineConfig::default()
    });
    put_note(&store, "e1", "t1", note("a", "")).await;

    let query = QueryBuilder::new()
        .with_id("e1")
        .watch(42)
        .build()
        .unwrap();
    let mut live = store.watch(query).await.unwrap();
    let initial = next_changed(&mut live).await;

    put_note(&store, "e2", "t2", note("b", "")).await;
    let update = tokio::time::timeout(Duration::from_secs(5), live.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(update, LiveUpdate::Unchanged { hash: initial.hash });
    assert_eq!(live.results().unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_token_is_rejected() {
    let store = store();
    let _live = store.watch(watched(7)).await.unwrap();
    assert!(matches!(
        store.watch(watched(7)).await,
        Err(Error::DuplicateWatch(7))
    ));
}

#[tokio::test]
async fn cancel_twice_succeeds_and_stops_pushes() {
    let store = store();
    let mut live = store.watch(watched(42)).await.unwrap();
    next_changed(&mut live).await;

    store.cancel_watch(42).await.unwrap();
    store.cancel_watch(42).await.unwrap();

    put_note(&store, "e1", "t1", note("late", "")).await;
    assert!(live.next().await.is_none());
    assert_eq!(live.state(), LiveState::Terminated);

    // Token is free again
    let _again = store.watch(watched(42)).await.unwrap();
}

#[tokio::test]
async fn cancel_from_another_task() {
    let store = store();
    let mut live = store.watch(watched(9)).await.unwrap();
    next_changed(&mut live).await;

    let handle = live.cancel_handle();
    let canceller = tokio::spawn(async move { handle.cancel().await });
    canceller.await.unwrap().unwrap();

    assert!(live.next().await.is_none());
    assert_eq!(live.state(), LiveState::Cancelled);
    live.cancel().await.unwrap();
}
