//! In-memory entity state
//!
//! The engine keeps one [`EntityRecord`] per entity id ever mutated,
//! tombstoned ones included. Each record tracks the operation ids that
//! touched it, per trait and per entity, so optimistic concurrency checks,
//! compaction and operation predicates never scan a log.

use serde_json::Value;
use std::collections::BTreeMap;
use tessera_core::{Entity, Timestamp, Trait, TypeRegistry, TypedPayload};

/// Stored trait plus its bookkeeping
#[derive(Debug, Clone)]
pub(crate) struct TraitRecord {
    /// Trait as returned to clients (`last_operation_id` always set)
    pub value: Trait,
    /// Live operation ids that touched this trait, ascending
    pub operations: Vec<u64>,
    /// Payload projected through its codec; None if the type is unregistered
    pub document: Option<Value>,
}

impl TraitRecord {
    pub fn new(value: Trait, operation_id: u64, registry: &TypeRegistry) -> Self {
        let document = project(&value.payload, registry);
        TraitRecord {
            value,
            operations: vec![operation_id],
            document,
        }
    }

    /// Last operation applied to this trait
    pub fn last_operation_id(&self) -> u64 {
        self.operations.last().copied().unwrap_or(0)
    }

    /// Replace the payload, keeping the creation date
    pub fn replace(&mut self, payload: TypedPayload, operation_id: u64, registry: &TypeRegistry) {
        self.document = project(&payload, registry);
        self.value.payload = payload;
        self.value.modification_date = Timestamp::now();
        self.value.last_operation_id = Some(operation_id);
        self.operations.push(operation_id);
    }
}

/// Stored entity
#[derive(Debug, Clone)]
pub(crate) struct EntityRecord {
    pub id: String,
    pub traits: Vec<TraitRecord>,
    pub deleted: bool,
    /// Live operation ids that touched this entity, ascending
    pub operations: Vec<u64>,
}

impl EntityRecord {
    pub fn new(id: &str) -> Self {
        EntityRecord {
            id: id.to_string(),
            traits: Vec::new(),
            deleted: false,
            operations: Vec::new(),
        }
    }

    pub fn trait_record(&self, trait_id: &str) -> Option<&TraitRecord> {
        self.traits.iter().find(|t| t.value.id == trait_id)
    }

    pub fn trait_record_mut(&mut self, trait_id: &str) -> Option<&mut TraitRecord> {
        self.traits.iter_mut().find(|t| t.value.id == trait_id)
    }

    /// Last operation applied to this entity; the tie-breaker of its results
    pub fn last_operation_id(&self) -> u64 {
        self.operations.last().copied().unwrap_or(0)
    }

    /// Client-facing snapshot
    pub fn snapshot(&self) -> Entity {
        Entity {
            id: self.id.clone(),
            traits: self.traits.iter().map(|t| t.value.clone()).collect(),
            deleted: self.deleted,
        }
    }
}

/// Whole store
#[derive(Debug)]
pub(crate) struct StoreState {
    pub entities: BTreeMap<String, EntityRecord>,
    /// Next operation id to assign; ids start at 1
    pub next_operation_id: u64,
    /// Operations at or below this id are durable
    pub checkpoint: u64,
}

impl Default for StoreState {
    fn default() -> Self {
        StoreState {
            entities: BTreeMap::new(),
            next_operation_id: 1,
            checkpoint: 0,
        }
    }
}

impl StoreState {
    /// Highest operation id assigned so far (0 if none)
    pub fn last_operation_id(&self) -> u64 {
        self.next_operation_id - 1
    }

    /// Entities visible to a query
    pub fn visible(&self, include_deleted: bool) -> impl Iterator<Item = &EntityRecord> {
        self.entities
            .values()
            .filter(move |e| include_deleted || !e.deleted)
    }
}

/// Project a payload into its document form for evaluation
fn project(payload: &TypedPayload, registry: &TypeRegistry) -> Option<Value> {
    match payload.to_document(registry) {
        Ok(document) => Some(document),
        Err(e) => {
            tracing::warn!(
                target: "tessera::engine",
                type_tag = payload.type_tag(),
                error = %e,
                "Payload not indexable; field and text predicates will skip it"
            );
            None
        }
    }
}
