//! Core types and traits for Tessera
//!
//! This crate defines the protocol between clients and a Tessera engine:
//! - Entity, Trait, Reference: the addressable data model
//! - TypedPayload, TypeRegistry, Codec: typed trait payloads
//! - MutationOperation, MutationRequest, MutationResult: the operation log
//! - Predicate, TraitQuery, EntityQuery: the query algebra
//! - OrderingValue, Ordering, Paging: sort keys and cursor paging
//! - EntityResults: result pages with content hashes
//! - StoreEngine: the engine boundary (mutate, query, watch, cancel)
//! - IdGenerator, Timestamp, Error: ambient types

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entity;
pub mod error;
pub mod ids;
pub mod mutation;
pub mod ordering;
pub mod payload;
pub mod query;
pub mod results;
pub mod timestamp;
pub mod traits;

pub use entity::{Entity, Reference, Trait};
pub use error::{Error, Result};
pub use ids::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
pub use mutation::{EntityMutation, MutationOperation, MutationRequest, MutationResult};
pub use ordering::{sort_ordering_values, Ordering, OrderingKey, OrderingValue, Paging, SortValue};
pub use payload::{canonicalize, Codec, MsgPackCodec, TraitType, TypeRegistry, TypedPayload};
pub use query::{
    EntityQuery, FieldOperator, FieldValue, Predicate, ReferencePredicate, TraitQuery, WatchToken,
};
pub use results::{EntityResult, EntityResults, ResultSource};
pub use timestamp::Timestamp;
pub use traits::{ResultStream, StoreEngine};
