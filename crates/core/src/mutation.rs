//! Mutation model
//!
//! Mutations are the unit of the append-only operation log. Each
//! [`EntityMutation`] applies exactly one [`MutationOperation`] to one
//! entity's trait set. Once accepted, the engine (never the client) assigns
//! it a unique operation id.
//!
//! A [`MutationRequest`] batches mutations, possibly across entities. Order
//! within the batch is preserved. Atomicity is per mutation: mutations are
//! applied in order and the first failure aborts the rest of the batch,
//! leaving earlier mutations applied.

use crate::entity::{Entity, Trait};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Operation applied to a single entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MutationOperation {
    /// Create or replace a trait
    PutTrait(Trait),

    /// Remove a trait
    DeleteTrait {
        /// Trait to remove
        trait_id: String,
    },

    /// Remove the entity and all its traits
    DeleteEntity,

    /// Update an existing trait, optionally guarded by its last operation id
    UpdateTrait {
        /// Trait to update
        trait_id: String,
        /// New trait content
        value: Trait,
        /// Top-level payload fields to take from `value` (empty = whole payload)
        field_mask: Vec<String>,
        /// Fail with `ConflictingWrite` unless the trait's last operation id matches
        if_last_operation_id: Option<u64>,
    },

    /// Replace a run of operations on a trait with one compacted trait
    CompactTrait {
        /// Compacted trait content
        value: Trait,
        /// Operation ids superseded by this one
        compacted_operations: Vec<u64>,
    },

    /// No-op that fails when `success` is false; exercises error paths
    Test {
        /// Whether the operation succeeds
        success: bool,
    },
}

impl MutationOperation {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            MutationOperation::PutTrait(_) => "put_trait",
            MutationOperation::DeleteTrait { .. } => "delete_trait",
            MutationOperation::DeleteEntity => "delete_entity",
            MutationOperation::UpdateTrait { .. } => "update_trait",
            MutationOperation::CompactTrait { .. } => "compact_trait",
            MutationOperation::Test { .. } => "test",
        }
    }

    /// Trait this operation targets, if any
    pub fn trait_id(&self) -> Option<&str> {
        match self {
            MutationOperation::PutTrait(t) => Some(&t.id),
            MutationOperation::DeleteTrait { trait_id } => Some(trait_id),
            MutationOperation::UpdateTrait { trait_id, .. } => Some(trait_id),
            MutationOperation::CompactTrait { value, .. } => Some(&value.id),
            MutationOperation::DeleteEntity | MutationOperation::Test { .. } => None,
        }
    }
}

/// One operation on one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMutation {
    /// Target entity
    pub entity_id: String,
    /// Operation to apply
    pub operation: MutationOperation,
}

impl EntityMutation {
    /// Create a mutation
    pub fn new(entity_id: impl Into<String>, operation: MutationOperation) -> Self {
        EntityMutation {
            entity_id: entity_id.into(),
            operation,
        }
    }

    /// Check structural validity
    ///
    /// # Errors
    ///
    /// Returns `InvalidMutation` for empty ids, an UpdateTrait whose trait id
    /// disagrees with its content, or a CompactTrait with nothing to compact.
    pub fn validate(&self) -> Result<()> {
        if self.entity_id.is_empty() {
            return Err(Error::invalid_mutation("entity id is empty"));
        }
        if let Some(trait_id) = self.operation.trait_id() {
            if trait_id.is_empty() {
                return Err(Error::invalid_mutation(format!(
                    "{} on {} has an empty trait id",
                    self.operation.kind(),
                    self.entity_id
                )));
            }
        }
        match &self.operation {
            MutationOperation::UpdateTrait {
                trait_id, value, ..
            } if value.id != *trait_id => Err(Error::invalid_mutation(format!(
                "update of trait {} carries trait {}",
                trait_id, value.id
            ))),
            MutationOperation::CompactTrait {
                compacted_operations,
                ..
            } if compacted_operations.is_empty() => Err(Error::invalid_mutation(
                "compaction must supersede at least one operation",
            )),
            _ => Ok(()),
        }
    }
}

/// Ordered batch of mutations
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MutationRequest {
    /// Mutations, applied in this order
    pub mutations: Vec<EntityMutation>,
    /// Respond only once the mutations are visible to queries
    pub wait_indexed: bool,
    /// Include the mutated entities in the result
    pub return_entities: bool,
}

impl MutationRequest {
    /// Check every mutation and that the batch is not empty
    pub fn validate(&self) -> Result<()> {
        if self.mutations.is_empty() {
            return Err(Error::invalid_mutation("request contains no mutations"));
        }
        self.mutations.iter().try_for_each(EntityMutation::validate)
    }

    /// Distinct entity ids touched by the request, in first-seen order
    pub fn entity_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for m in &self.mutations {
            if !ids.contains(&m.entity_id.as_str()) {
                ids.push(&m.entity_id);
            }
        }
        ids
    }
}

/// Engine response to a [`MutationRequest`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MutationResult {
    /// Assigned operation ids, one per submitted mutation, same order
    pub operation_ids: Vec<u64>,
    /// Mutated entities, present only if the request asked for them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<Entity>>,
}
