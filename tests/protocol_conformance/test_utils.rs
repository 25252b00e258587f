//! Shared fixtures

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera::{
    EngineConfig, MemoryEngine, MutationResult, SequentialIdGenerator, Store, TraitType,
    TypeRegistry,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub title: String,
    pub body: String,
}

impl TraitType for Note {
    const TYPE_NAME: &'static str = "myapp.Note";
}

/// Task with an optional integer priority, for field ordering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

impl TraitType for Task {
    const TYPE_NAME: &'static str = "myapp.Task";
}

pub fn task(title: &str, priority: Option<i64>) -> Task {
    Task {
        title: title.to_string(),
        priority,
    }
}

pub fn note(title: &str, body: &str) -> Note {
    Note {
        title: title.to_string(),
        body: body.to_string(),
    }
}

pub fn registry() -> Arc<TypeRegistry> {
    Arc::new(TypeRegistry::new().with_type::<Note>().with_type::<Task>())
}

pub fn store() -> Store {
    store_with(EngineConfig::default())
}

pub fn store_with(config: EngineConfig) -> Store {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let registry = registry();
    let engine = MemoryEngine::with_config(registry.clone(), config).unwrap();
    Store::new(Arc::new(engine), registry)
        .with_id_generator(Arc::new(SequentialIdGenerator::starting_at(1)))
}

/// Create `entity_id` holding one note under `trait_id`
pub async fn put_note(store: &Store, entity_id: &str, trait_id: &str, n: Note) -> MutationResult {
    let request = store
        .mutation()
        .create_entity(Some(entity_id))
        .put_trait(&n, Some(trait_id))
        .unwrap()
        .build()
        .unwrap();
    store.mutate(request).await.unwrap()
}

/// Create `entity_id` holding one task under trait id `task`
pub async fn put_task(store: &Store, entity_id: &str, t: Task) -> MutationResult {
    let request = store
        .mutation()
        .create_entity(Some(entity_id))
        .put_trait(&t, Some("task"))
        .unwrap()
        .build()
        .unwrap();
    store.mutate(request).await.unwrap()
}
