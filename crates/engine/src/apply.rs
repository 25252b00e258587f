//! Mutation application
//!
//! [`apply_mutation`] applies one mutation atomically: every check runs
//! before the state is touched, so a failed mutation leaves no trace and
//! does not consume an operation id.

use crate::store::{EntityRecord, StoreState, TraitRecord};
use serde_json::Value;
use tessera_core::{
    EntityMutation, Error, MutationOperation, Result, Timestamp, Trait, TypeRegistry,
    TypedPayload,
};

/// Apply `mutation`, returning its assigned operation id
pub(crate) fn apply_mutation(
    state: &mut StoreState,
    registry: &TypeRegistry,
    mutation: &EntityMutation,
) -> Result<u64> {
    let op = state.next_operation_id;
    let entity_id = mutation.entity_id.as_str();

    match &mutation.operation {
        MutationOperation::PutTrait(value) => put_trait(state, registry, entity_id, value, op),
        MutationOperation::DeleteTrait { trait_id } => {
            delete_trait(state, entity_id, trait_id, op)?
        }
        MutationOperation::DeleteEntity => delete_entity(state, entity_id, op)?,
        MutationOperation::UpdateTrait {
            trait_id,
            value,
            field_mask,
            if_last_operation_id,
        } => update_trait(
            state,
            registry,
            entity_id,
            trait_id,
            value,
            field_mask,
            *if_last_operation_id,
            op,
        )?,
        MutationOperation::CompactTrait {
            value,
            compacted_operations,
        } => compact_trait(state, registry, entity_id, value, compacted_operations, op)?,
        MutationOperation::Test { success } => {
            if !success {
                return Err(Error::TestFailure(format!(
                    "test mutation on {} requested failure",
                    entity_id
                )));
            }
        }
    }

    state.next_operation_id += 1;
    Ok(op)
}

fn put_trait(
    state: &mut StoreState,
    registry: &TypeRegistry,
    entity_id: &str,
    value: &Trait,
    op: u64,
) {
    let entity = state
        .entities
        .entry(entity_id.to_string())
        .or_insert_with(|| EntityRecord::new(entity_id));
    entity.deleted = false;
    entity.operations.push(op);

    match entity.trait_record_mut(&value.id) {
        Some(existing) => existing.replace(value.payload.clone(), op, registry),
        None => {
            let mut stored = value.clone();
            stored.modification_date = Timestamp::now();
            stored.last_operation_id = Some(op);
            entity.traits.push(TraitRecord::new(stored, op, registry));
        }
    }
}

fn delete_trait(state: &mut StoreState, entity_id: &str, trait_id: &str, op: u64) -> Result<()> {
    let entity = live_entity_mut(state, entity_id, trait_id)?;
    let index = entity
        .traits
        .iter()
        .position(|t| t.value.id == trait_id)
        .ok_or_else(|| not_found(entity_id, trait_id))?;
    entity.traits.remove(index);
    entity.operations.push(op);
    Ok(())
}

fn delete_entity(state: &mut StoreState, entity_id: &str, op: u64) -> Result<()> {
    let entity = state
        .entities
        .get_mut(entity_id)
        .filter(|e| !e.deleted)
        .ok_or_else(|| Error::invalid_mutation(format!("entity {} does not exist", entity_id)))?;
    entity.deleted = true;
    entity.traits.clear();
    entity.operations.push(op);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn update_trait(
    state: &mut StoreState,
    registry: &TypeRegistry,
    entity_id: &str,
    trait_id: &str,
    value: &Trait,
    field_mask: &[String],
    if_last_operation_id: Option<u64>,
    op: u64,
) -> Result<()> {
    let current = state
        .entities
        .get(entity_id)
        .filter(|e| !e.deleted)
        .and_then(|e| e.trait_record(trait_id));

    if let Some(expected) = if_last_operation_id {
        let actual = current.map(TraitRecord::last_operation_id);
        if actual != Some(expected) {
            return Err(Error::ConflictingWrite {
                entity_id: entity_id.to_string(),
                trait_id: trait_id.to_string(),
                expected,
                actual,
            });
        }
    }
    let current = current.ok_or_else(|| not_found(entity_id, trait_id))?;

    let payload = if field_mask.is_empty() {
        value.payload.clone()
    } else {
        merge_fields(registry, &current.value.payload, &value.payload, field_mask)?
    };

    let entity = live_entity_mut(state, entity_id, trait_id)?;
    entity.operations.push(op);
    if let Some(record) = entity.trait_record_mut(trait_id) {
        record.replace(payload, op, registry);
    }
    Ok(())
}

/// Copy the masked top-level fields of `incoming` into `current`
///
/// A masked field absent from `incoming` is removed from the result.
fn merge_fields(
    registry: &TypeRegistry,
    current: &TypedPayload,
    incoming: &TypedPayload,
    field_mask: &[String],
) -> Result<TypedPayload> {
    if current.type_tag() != incoming.type_tag() {
        return Err(Error::invalid_mutation(format!(
            "field mask update cannot change type {} to {}",
            current.type_tag(),
            incoming.type_tag()
        )));
    }
    let codec = registry.resolve(current.type_tag())?;
    let mut merged = codec.to_document(current.bytes())?;
    let source = codec.to_document(incoming.bytes())?;

    let (Value::Object(target), Value::Object(source)) = (&mut merged, &source) else {
        return Err(Error::invalid_mutation(format!(
            "field mask update needs a struct payload, {} is not one",
            current.type_tag()
        )));
    };
    for field in field_mask {
        match source.get(field) {
            Some(v) => {
                target.insert(field.clone(), v.clone());
            }
            None => {
                target.remove(field);
            }
        }
    }

    let bytes = codec.from_document(&merged)?;
    Ok(TypedPayload::from_parts(current.type_tag(), bytes))
}

fn compact_trait(
    state: &mut StoreState,
    registry: &TypeRegistry,
    entity_id: &str,
    value: &Trait,
    compacted: &[u64],
    op: u64,
) -> Result<()> {
    let entity = live_entity_mut(state, entity_id, &value.id)?;
    let record = entity
        .trait_record_mut(&value.id)
        .ok_or_else(|| not_found(entity_id, &value.id))?;

    if let Some(foreign) = compacted.iter().find(|o| !record.operations.contains(o)) {
        return Err(Error::invalid_mutation(format!(
            "operation {} does not belong to trait {}/{}",
            foreign, entity_id, value.id
        )));
    }
    let last = record.last_operation_id();
    if !compacted.contains(&last) {
        return Err(Error::ConflictingWrite {
            entity_id: entity_id.to_string(),
            trait_id: value.id.clone(),
            expected: compacted.iter().copied().max().unwrap_or(0),
            actual: Some(last),
        });
    }

    record.operations.retain(|o| !compacted.contains(o));
    record.replace(value.payload.clone(), op, registry);
    entity.operations.retain(|o| !compacted.contains(o));
    entity.operations.push(op);
    Ok(())
}

fn live_entity_mut<'a>(
    state: &'a mut StoreState,
    entity_id: &str,
    trait_id: &str,
) -> Result<&'a mut EntityRecord> {
    state
        .entities
        .get_mut(entity_id)
        .filter(|e| !e.deleted)
        .ok_or_else(|| not_found(entity_id, trait_id))
}

fn not_found(entity_id: &str, trait_id: &str) -> Error {
    Error::TraitNotFound {
        entity_id: entity_id.to_string(),
        trait_id: trait_id.to_string(),
    }
}
