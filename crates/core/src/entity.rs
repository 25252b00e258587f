//! Entity and trait data model
//!
//! An [`Entity`] is an addressable aggregate identified by a globally unique
//! id. It holds independently addressable [`Trait`]s, each a typed fact
//! wrapped in a [`TypedPayload`].
//!
//! Clients never mutate entities in place: every change is a mutation
//! referencing the same entity/trait ids. Entities returned by queries are
//! read-only snapshots.

use crate::error::Result;
use crate::payload::{TraitType, TypeRegistry, TypedPayload};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// Typed fact attached to an entity
///
/// ## Invariants
///
/// - `id` is unique within its owning entity
/// - `creation_date` is set once, when the trait is first put
/// - `modification_date` moves on every put/update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trait {
    /// Trait id, unique within the entity
    pub id: String,
    /// Encoded value
    pub payload: TypedPayload,
    /// When the trait was first created
    pub creation_date: Timestamp,
    /// When the trait was last put or updated
    pub modification_date: Timestamp,
    /// Operation id of the last mutation applied to this trait (engine-assigned)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation_id: Option<u64>,
}

impl Trait {
    /// Create a trait stamped with the current time
    pub fn new(id: impl Into<String>, payload: TypedPayload) -> Self {
        let now = Timestamp::now();
        Trait {
            id: id.into(),
            payload,
            creation_date: now,
            modification_date: now,
            last_operation_id: None,
        }
    }

    /// Check whether the payload carries a `T`
    pub fn is<T: TraitType>(&self) -> bool {
        self.payload.is::<T>()
    }

    /// Decode the payload as `T`
    pub fn payload_as<T: TraitType>(&self, registry: &TypeRegistry) -> Result<T> {
        self.payload.unpack(registry)
    }
}

/// Addressable aggregate of traits
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Entity {
    /// Globally unique entity id
    pub id: String,
    /// Traits, in the order the engine returns them
    pub traits: Vec<Trait>,
    /// Entity was deleted; only returned by queries that include deleted entities
    #[serde(default)]
    pub deleted: bool,
}

impl Entity {
    /// Create an entity with no traits
    pub fn new(id: impl Into<String>) -> Self {
        Entity {
            id: id.into(),
            traits: Vec::new(),
            deleted: false,
        }
    }

    /// Find a trait by id
    pub fn trait_by_id(&self, trait_id: &str) -> Option<&Trait> {
        self.traits.iter().find(|t| t.id == trait_id)
    }

    /// Traits whose payload carries a `T`
    pub fn traits_of<T: TraitType>(&self) -> impl Iterator<Item = &Trait> {
        self.traits.iter().filter(|t| t.is::<T>())
    }

    /// Decode every trait carrying a `T`
    pub fn decode_traits<T: TraitType>(&self, registry: &TypeRegistry) -> Result<Vec<T>> {
        self.traits_of::<T>()
            .map(|t| t.payload_as::<T>(registry))
            .collect()
    }

    /// Highest operation id applied to any of this entity's traits
    pub fn last_operation_id(&self) -> Option<u64> {
        self.traits.iter().filter_map(|t| t.last_operation_id).max()
    }
}

/// Pointer to an entity, optionally narrowed to one of its traits
///
/// Embedded as a field inside trait payloads; reference predicates match it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Referenced entity
    pub entity_id: String,
    /// Referenced trait (None = the entity as a whole)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trait_id: Option<String>,
}

impl Reference {
    /// Reference a whole entity
    pub fn entity(entity_id: impl Into<String>) -> Self {
        Reference {
            entity_id: entity_id.into(),
            trait_id: None,
        }
    }

    /// Reference one trait of an entity
    pub fn to_trait(entity_id: impl Into<String>, trait_id: impl Into<String>) -> Self {
        Reference {
            entity_id: entity_id.into(),
            trait_id: Some(trait_id.into()),
        }
    }

    /// Read a reference out of a payload document field
    pub fn from_document(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let entity_id = obj.get("entity_id")?.as_str()?.to_string();
        let trait_id = match obj.get("trait_id") {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => Some(v.as_str()?.to_string()),
        };
        Some(Reference {
            entity_id,
            trait_id,
        })
    }

    /// Check whether this reference points at `entity_id` (and `trait_id`, if given)
    ///
    /// A query without a trait id matches references to any trait of the entity.
    pub fn points_to(&self, entity_id: &str, trait_id: Option<&str>) -> bool {
        if self.entity_id != entity_id {
            return false;
        }
        match trait_id {
            None => true,
            Some(wanted) => self.trait_id.as_deref() == Some(wanted),
        }
    }
}
