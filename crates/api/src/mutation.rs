//! Mutation builder
//!
//! [`MutationBuilder`] accumulates mutations against a *current* entity.
//! `create_entity` and `update_entity` retarget the builder; every trait
//! operation after a retarget applies to the new entity, so one request can
//! span several entities.
//!
//! Steps that pack a payload return `Result` and fail at once with
//! `UnregisteredType`. Steps that only need a target entity record the
//! first missing-target error and report it from [`MutationBuilder::build`].
//!
//! ```
//! use std::sync::Arc;
//! use serde::{Deserialize, Serialize};
//! use tessera_api::MutationBuilder;
//! use tessera_core::{SequentialIdGenerator, TraitType, TypeRegistry};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Note { body: String }
//! impl TraitType for Note { const TYPE_NAME: &'static str = "myapp.Note"; }
//!
//! let registry = Arc::new(TypeRegistry::new().with_type::<Note>());
//! let ids = Arc::new(SequentialIdGenerator::starting_at(1));
//! let request = MutationBuilder::new(registry, ids)
//!     .create_entity(None)
//!     .put_trait(&Note { body: "hello".into() }, None)
//!     .unwrap()
//!     .return_entities()
//!     .build()
//!     .unwrap();
//! assert_eq!(request.mutations[0].entity_id, "et1");
//! ```

use std::sync::Arc;
use tessera_core::{
    EntityMutation, Error, IdGenerator, MutationOperation, MutationRequest, Result, Trait,
    TraitType, TypeRegistry, TypedPayload,
};

/// Fluent builder of a [`MutationRequest`]
pub struct MutationBuilder {
    registry: Arc<TypeRegistry>,
    ids: Arc<dyn IdGenerator>,
    entity_id_prefix: String,
    trait_id_prefix: String,
    current: Option<String>,
    mutations: Vec<EntityMutation>,
    wait_indexed: bool,
    return_entities: bool,
    deferred: Option<Error>,
}

impl MutationBuilder {
    /// Builder generating `et`/`tr`-prefixed ids
    pub fn new(registry: Arc<TypeRegistry>, ids: Arc<dyn IdGenerator>) -> Self {
        MutationBuilder {
            registry,
            ids,
            entity_id_prefix: "et".to_string(),
            trait_id_prefix: "tr".to_string(),
            current: None,
            mutations: Vec::new(),
            wait_indexed: false,
            return_entities: false,
            deferred: None,
        }
    }

    /// Set the prefixes of generated ids
    pub fn with_prefixes(mut self, entity: impl Into<String>, trait_: impl Into<String>) -> Self {
        self.entity_id_prefix = entity.into();
        self.trait_id_prefix = trait_.into();
        self
    }

    /// Target a new entity, generating its id if none is given
    pub fn create_entity(mut self, id: Option<&str>) -> Self {
        let id = match id {
            Some(id) => id.to_string(),
            None => self.ids.generate(&self.entity_id_prefix),
        };
        self.current = Some(id);
        self
    }

    /// Target an existing entity
    pub fn update_entity(mut self, id: impl Into<String>) -> Self {
        self.current = Some(id.into());
        self
    }

    /// Entity the next operation applies to
    pub fn current_entity(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Put `value` as a trait of the current entity
    ///
    /// Generates the trait id if none is given and stamps the creation date.
    ///
    /// # Errors
    ///
    /// `InvalidMutation` without a target entity, `UnregisteredType` if `T`
    /// has no codec.
    pub fn put_trait<T: TraitType>(mut self, value: &T, trait_id: Option<&str>) -> Result<Self> {
        let entity_id = self.target()?;
        let trait_id = match trait_id {
            Some(id) => id.to_string(),
            None => self.ids.generate(&self.trait_id_prefix),
        };
        let payload = TypedPayload::pack(value, &self.registry)?;
        self.mutations.push(EntityMutation::new(
            entity_id,
            MutationOperation::PutTrait(Trait::new(trait_id, payload)),
        ));
        Ok(self)
    }

    /// Update a trait of the current entity
    ///
    /// An empty `field_mask` replaces the whole payload. With
    /// `if_last_operation_id` set, the engine rejects the update with
    /// `ConflictingWrite` if the trait changed since that operation.
    pub fn update_trait<T: TraitType>(
        mut self,
        trait_id: &str,
        value: &T,
        field_mask: &[&str],
        if_last_operation_id: Option<u64>,
    ) -> Result<Self> {
        let entity_id = self.target()?;
        let payload = TypedPayload::pack(value, &self.registry)?;
        self.mutations.push(EntityMutation::new(
            entity_id,
            MutationOperation::UpdateTrait {
                trait_id: trait_id.to_string(),
                value: Trait::new(trait_id, payload),
                field_mask: field_mask.iter().map(|f| f.to_string()).collect(),
                if_last_operation_id,
            },
        ));
        Ok(self)
    }

    /// Replace operations `compacted` on a trait with one carrying `value`
    pub fn compact_trait<T: TraitType>(
        mut self,
        trait_id: &str,
        value: &T,
        compacted: Vec<u64>,
    ) -> Result<Self> {
        let entity_id = self.target()?;
        let payload = TypedPayload::pack(value, &self.registry)?;
        self.mutations.push(EntityMutation::new(
            entity_id,
            MutationOperation::CompactTrait {
                value: Trait::new(trait_id, payload),
                compacted_operations: compacted,
            },
        ));
        Ok(self)
    }

    /// Delete a trait of the current entity
    pub fn delete_trait(self, trait_id: impl Into<String>) -> Self {
        let trait_id = trait_id.into();
        self.push(|| MutationOperation::DeleteTrait { trait_id })
    }

    /// Delete the current entity
    pub fn delete_entity(self) -> Self {
        self.push(|| MutationOperation::DeleteEntity)
    }

    /// Add a test operation that fails the request unless `success`
    pub fn test(self, success: bool) -> Self {
        self.push(|| MutationOperation::Test { success })
    }

    /// Ask the engine to return the mutated entities
    pub fn return_entities(mut self) -> Self {
        self.return_entities = true;
        self
    }

    /// Ask the engine to answer only once the mutations are queryable
    pub fn wait_indexed(mut self) -> Self {
        self.wait_indexed = true;
        self
    }

    /// Number of mutations so far
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Check if no mutation was added
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Finish the request
    ///
    /// # Errors
    ///
    /// `InvalidMutation` if an operation had no target entity, the request is
    /// empty, or a mutation is malformed.
    pub fn build(self) -> Result<MutationRequest> {
        if let Some(e) = self.deferred {
            return Err(e);
        }
        let request = MutationRequest {
            mutations: self.mutations,
            wait_indexed: self.wait_indexed,
            return_entities: self.return_entities,
        };
        request.validate()?;
        Ok(request)
    }

    fn target(&self) -> Result<String> {
        self.current.clone().ok_or_else(|| {
            Error::invalid_mutation("no target entity; call create_entity or update_entity first")
        })
    }

    fn push(mut self, operation: impl FnOnce() -> MutationOperation) -> Self {
        match self.target() {
            Ok(entity_id) => self
                .mutations
                .push(EntityMutation::new(entity_id, operation())),
            Err(e) => {
                self.deferred.get_or_insert(e);
            }
        }
        self
    }
}
