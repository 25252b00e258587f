//! Client surface for the Tessera store protocol
//!
//! This crate provides:
//! - **Builders**: [`MutationBuilder`], [`QueryBuilder`] and [`TraitQueryBuilder`]
//!   assemble validated requests; contract violations surface at `build()`
//! - **Store handle**: [`Store`] submits requests to any
//!   [`StoreEngine`](tessera_core::StoreEngine) under a request timeout
//! - **Live queries**: [`LiveQuery`] reconciles pushed result pages by hash
//!
//! ## Quick Start
//!
//! ```ignore
//! let store = Store::new(engine, registry);
//! let request = store.mutation().create_entity(None).put_trait(&note, None)?.build()?;
//! store.mutate(request).await?;
//!
//! let query = QueryBuilder::new().with_trait("myapp.Note", None).count(2).build()?;
//! let page = store.query(query).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod live;
pub mod mutation;
pub mod query;
pub mod store;

pub use config::ClientConfig;
pub use live::{CancelHandle, LiveQuery, LiveState, LiveUpdate};
pub use mutation::MutationBuilder;
pub use query::{QueryBuilder, TraitQueryBuilder};
pub use store::Store;
