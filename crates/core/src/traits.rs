//! Engine boundary
//!
//! [`StoreEngine`] is the contract between clients and whatever executes
//! mutations and queries. Requests are independent and asynchronous: a
//! client may have many in flight, each completing on its own. Live queries
//! are the one long-lived resource: a watch yields a stream of result pages
//! until it is cancelled or fails.

use crate::error::Result;
use crate::mutation::{MutationRequest, MutationResult};
use crate::query::{EntityQuery, WatchToken};
use crate::results::EntityResults;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of pushed result pages for one watched query
///
/// An `Err` item is terminal: engines end the stream after it rather than
/// silently stop pushing.
pub type ResultStream = BoxStream<'static, Result<EntityResults>>;

/// Mutation/query execution engine
///
/// Thread safety: all methods may be called concurrently (requires Send + Sync).
#[async_trait]
pub trait StoreEngine: Send + Sync {
    /// Apply a batch of mutations
    ///
    /// Returns one operation id per mutation, in submission order.
    ///
    /// # Errors
    ///
    /// Fails with the error of the first mutation that could not be applied
    /// (e.g. `ConflictingWrite`); mutations before it remain applied.
    async fn mutate(&self, request: MutationRequest) -> Result<MutationResult>;

    /// Execute a query once
    async fn query(&self, query: EntityQuery) -> Result<EntityResults>;

    /// Start a live query; `query.watch_token` must be set
    ///
    /// The first item is the current result page. A new page is pushed each
    /// time the page's content hash changes.
    async fn watch_query(&self, query: EntityQuery) -> Result<ResultStream>;

    /// Release a watch
    ///
    /// Idempotent: cancelling an unknown or already-cancelled token succeeds.
    async fn cancel_watch(&self, token: WatchToken) -> Result<()>;
}
