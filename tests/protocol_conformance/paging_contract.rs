//! Paging contract

use crate::test_utils::*;
use std::collections::HashSet;
use tessera::{OrderingValue, Paging, QueryBuilder};

async fn five_notes() -> tessera::Store {
    let store = store();
    for i in 1..=5 {
        put_note(&store, &format!("e{}", i), &format!("t{}", i), note(&i.to_string(), "")).await;
    }
    store
}

#[tokio::test]
async fn page_respects_count_and_next_page_is_disjoint() {
    let store = five_notes().await;
    let first_query = QueryBuilder::new()
        .with_trait("myapp.Note", None)
        .count(2)
        .build()
        .unwrap();
    let first = store.query(first_query.clone()).await.unwrap();
    assert!(first.len() <= 2);
    assert_eq!(first.estimated_count, 5);

    let next = first.next_page.clone().unwrap();
    let second = store.query(first_query.with_paging(next)).await.unwrap();
    assert_eq!(second.len(), 2);

    let seen: HashSet<&str> = first.entity_ids().into_iter().collect();
    assert!(second.entity_ids().iter().all(|id| !seen.contains(id)));
}

#[tokio::test]
async fn walking_pages_visits_every_entity_once() {
    let store = five_notes().await;
    let query = QueryBuilder::new()
        .with_trait("myapp.Note", None)
        .count(2)
        .build()
        .unwrap();

    let mut paging = Paging::new(2);
    let mut seen = Vec::new();
    loop {
        let page = store.query(query.with_paging(paging)).await.unwrap();
        seen.extend(page.entity_ids().into_iter().map(str::to_string));
        match page.next_page {
            Some(next) => paging = next,
            None => break,
        }
    }
    // Default ordering is latest first
    assert_eq!(seen, vec!["e5", "e4", "e3", "e2", "e1"]);
}

#[tokio::test]
async fn same_query_without_writes_is_idempotent() {
    let store = five_notes().await;
    let query = QueryBuilder::new()
        .with_trait("myapp.Note", None)
        .count(3)
        .order_by_operation_id(true)
        .build()
        .unwrap();
    let a = store.query(query.clone()).await.unwrap();
    let b = store.query(query).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn next_page_survives_token_encoding() {
    let store = five_notes().await;
    let query = QueryBuilder::new().all().count(2).build().unwrap();
    let first = store.query(query.clone()).await.unwrap();
    let next = first.next_page.unwrap();

    let token = next.to_token().unwrap();
    let decoded = Paging::from_token(&token).unwrap();
    let direct = store.query(query.with_paging(next)).await.unwrap();
    let via_token = store.query(query.with_paging(decoded)).await.unwrap();
    assert_eq!(direct, via_token);
}

#[tokio::test]
async fn matching_hash_returns_summary() {
    let store = five_notes().await;
    let query = QueryBuilder::new().with_trait("myapp.Note", None).build().unwrap();
    let full = store.query(query).await.unwrap();
    assert!(!full.summary);

    let again = QueryBuilder::new()
        .with_trait("myapp.Note", None)
        .result_hash(full.hash)
        .build()
        .unwrap();
    let summary = store.query(again).await.unwrap();
    assert!(summary.summary);
    assert!(summary.is_unchanged_from(full.hash));
    assert!(summary.entities.iter().all(|r| r.entity.is_none()));
}

#[tokio::test]
async fn string_field_orders_notes_by_title() {
    let store = store();
    put_note(&store, "e1", "t1", note("banana", "")).await;
    put_note(&store, "e2", "t2", note("cherry", "")).await;
    put_note(&store, "e3", "t3", note("apple", "")).await;

    let by_title = |ascending| {
        QueryBuilder::new()
            .with_trait("myapp.Note", None)
            .order_by_field("title", ascending)
            .build()
            .unwrap()
    };
    let ascending = store.query(by_title(true)).await.unwrap();
    assert_eq!(ascending.entity_ids(), vec!["e3", "e1", "e2"]);
    assert_eq!(
        ascending.entities[0].ordering_value.value,
        tessera::SortValue::String("apple".to_string())
    );

    let descending = store.query(by_title(false)).await.unwrap();
    assert_eq!(descending.entity_ids(), vec!["e2", "e1", "e3"]);
}

#[tokio::test]
async fn missing_field_sorts_last_in_both_directions() {
    let store = store();
    put_task(&store, "e1", task("a", None)).await;
    put_task(&store, "e2", task("b", Some(2))).await;
    put_task(&store, "e3", task("c", Some(1))).await;

    let by_priority = |ascending| {
        QueryBuilder::new()
            .with_trait("myapp.Task", None)
            .order_by_field("priority", ascending)
            .build()
            .unwrap()
    };
    let ascending = store.query(by_priority(true)).await.unwrap();
    assert_eq!(ascending.entity_ids(), vec!["e3", "e2", "e1"]);
    assert_eq!(ascending.estimated_count, 3);

    let descending = store.query(by_priority(false)).await.unwrap();
    assert_eq!(descending.entity_ids(), vec!["e2", "e3", "e1"]);
}

#[tokio::test]
async fn cursor_still_valid_after_appends() {
    let store = store();
    for (id, priority) in [("e1", 10), ("e2", 20), ("e3", 30)] {
        put_task(&store, id, task(id, Some(priority))).await;
    }
    let query = QueryBuilder::new()
        .with_trait("myapp.Task", None)
        .order_by_field("priority", true)
        .count(2)
        .build()
        .unwrap();
    let first = store.query(query.clone()).await.unwrap();
    assert_eq!(first.entity_ids(), vec!["e1", "e2"]);
    let next = first.next_page.clone().unwrap();

    // A negative value lands before the cursor, 25 lands after it
    put_task(&store, "e4", task("e4", Some(-5))).await;
    put_task(&store, "e5", task("e5", Some(25))).await;

    let second = store.query(query.with_paging(next)).await.unwrap();
    assert_eq!(second.entity_ids(), vec!["e5", "e3"]);
}

#[tokio::test]
async fn before_cursor_bounds_the_page() {
    let store = five_notes().await;
    let by_title = QueryBuilder::new()
        .with_trait("myapp.Note", None)
        .order_by_field("title", true);
    let full = store.query(by_title.clone().build().unwrap()).await.unwrap();
    let bound: OrderingValue = full.entities[2].ordering_value.clone();
    assert_eq!(full.entity_ids()[2], "e3");

    let before = store
        .query(by_title.clone().before(bound.clone()).build().unwrap())
        .await
        .unwrap();
    assert_eq!(before.entity_ids(), vec!["e1", "e2"]);

    let window = store
        .query(
            by_title
                .after(full.entities[0].ordering_value.clone())
                .before(bound)
                .build()
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(window.entity_ids(), vec!["e2"]);
}
