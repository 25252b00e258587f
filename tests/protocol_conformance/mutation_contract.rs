//! Mutation contract

use crate::test_utils::*;
use tessera::{Error, QueryBuilder};

#[tokio::test]
async fn put_then_get_returns_equal_value() {
    let store = store();
    let written = note("groceries", "milk and eggs");
    put_note(&store, "e1", "t1", written.clone()).await;

    let entity = store.get_entity("e1").await.unwrap().unwrap();
    let t = entity.trait_by_id("t1").unwrap();
    assert_eq!(t.payload.type_tag(), "myapp.Note");
    let read: Note = t.payload_as(store.registry()).unwrap();
    assert_eq!(read, written);
}

#[tokio::test]
async fn operation_ids_match_request_length_and_increase() {
    let store = store();
    let request = store
        .mutation()
        .create_entity(Some("e1"))
        .put_trait(&note("a", "1"), Some("t1"))
        .unwrap()
        .put_trait(&note("b", "2"), Some("t2"))
        .unwrap()
        .create_entity(Some("e2"))
        .put_trait(&note("c", "3"), Some("t3"))
        .unwrap()
        .build()
        .unwrap();
    let result = store.mutate(request).await.unwrap();

    assert_eq!(result.operation_ids.len(), 3);
    assert!(result.operation_ids.windows(2).all(|w| w[0] < w[1]));
    assert!(result.entities.is_none());

    let later = put_note(&store, "e3", "t4", note("d", "4")).await;
    assert!(later.operation_ids[0] > result.operation_ids[2]);
}

#[tokio::test]
async fn return_entities_reflects_the_write() {
    let store = store();
    let request = store
        .mutation()
        .create_entity(None)
        .put_trait(&note("a", "1"), None)
        .unwrap()
        .return_entities()
        .build()
        .unwrap();
    let result = store.mutate(request).await.unwrap();
    let entities = result.entities.unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].id, "et1");
    assert_eq!(entities[0].traits[0].id, "tr2");
    assert_eq!(
        entities[0].traits[0].last_operation_id,
        Some(result.operation_ids[0])
    );
}

#[tokio::test]
async fn stale_precondition_is_a_conflicting_write() {
    let store = store();
    let first = put_note(&store, "e1", "t1", note("v1", "")).await.operation_ids[0];

    let update = |value: Note, expected: u64| {
        store
            .mutation()
            .update_entity("e1")
            .update_trait("t1", &value, &[], Some(expected))
            .unwrap()
            .build()
            .unwrap()
    };

    let second = store.mutate(update(note("v2", ""), first)).await.unwrap();
    let err = store
        .mutate(update(note("v3", ""), first))
        .await
        .unwrap_err();
    match err {
        Error::ConflictingWrite {
            expected,
            actual,
            ..
        } => {
            assert_eq!(expected, first);
            assert_eq!(actual, Some(second.operation_ids[0]));
        }
        other => panic!("unexpected {:?}", other),
    }

    let entity = store.get_entity("e1").await.unwrap().unwrap();
    let current: Note = entity.traits[0].payload_as(store.registry()).unwrap();
    assert_eq!(current.title, "v2");
}

#[tokio::test]
async fn failed_test_operation_reports_test_failure() {
    let store = store();
    let request = store.mutation().update_entity("e1").test(false).build().unwrap();
    assert!(matches!(
        store.mutate(request).await,
        Err(Error::TestFailure(_))
    ));
}

#[tokio::test]
async fn deleted_entities_hidden_unless_requested() {
    let store = store();
    put_note(&store, "e1", "t1", note("a", "")).await;
    let request = store.mutation().update_entity("e1").delete_entity().build().unwrap();
    store.mutate(request).await.unwrap();

    assert!(store.get_entity("e1").await.unwrap().is_none());
    let query = QueryBuilder::new()
        .with_id("e1")
        .include_deleted()
        .build()
        .unwrap();
    let results = store.query(query).await.unwrap();
    let entity = results.entities[0].entity.as_ref().unwrap();
    assert!(entity.deleted);
    assert!(entity.traits.is_empty());
}
