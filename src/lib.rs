//! Tessera - entity/trait store protocol with live queries
//!
//! Entities are identified containers of typed, independently addressable
//! traits. They change through an append-only operation log and are read
//! through a predicate, ordering and paging algebra that also supports
//! continuously updating live queries.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tessera::{MemoryEngine, QueryBuilder, Store, TypeRegistry};
//!
//! let registry = Arc::new(TypeRegistry::new().with_type::<Note>());
//! let store = Store::new(Arc::new(MemoryEngine::new(registry.clone())), registry);
//!
//! let request = store.mutation().create_entity(None).put_trait(&note, None)?.build()?;
//! store.mutate(request).await?;
//!
//! let mut live = store
//!     .watch(QueryBuilder::new().with_trait("myapp.Note", None).watch(42).build()?)
//!     .await?;
//! while let Some(update) = live.next().await { /* ... */ }
//! ```
//!
//! # Crates
//!
//! - `tessera-core`: data model, mutation and query types, ordering, codecs
//! - `tessera-api`: builders, store handle and live queries
//! - `tessera-engine`: in-memory reference engine
//! - `tessera-search`: tokenizer and relevance scoring for match predicates

pub use tessera_api::{
    CancelHandle, ClientConfig, LiveQuery, LiveState, LiveUpdate, MutationBuilder, QueryBuilder,
    Store, TraitQueryBuilder,
};
pub use tessera_core::*;
pub use tessera_engine::{EngineConfig, MemoryEngine, CONFIG_FILE_NAME};
