//! Store handle
//!
//! [`Store`] is the client's entry point: it owns the shared type registry
//! and id generator, hands out builders wired to them, and submits requests
//! to a [`StoreEngine`] under the configured request timeout.

use crate::config::ClientConfig;
use crate::live::LiveQuery;
use crate::mutation::MutationBuilder;
use crate::query::QueryBuilder;
use std::future::Future;
use std::sync::Arc;
use tessera_core::{
    Entity, EntityQuery, EntityResults, Error, IdGenerator, MutationRequest, MutationResult,
    Result, StoreEngine, TypeRegistry, UuidIdGenerator, WatchToken,
};
use tracing::{debug, warn};

/// Client handle over an engine
///
/// Cheap to clone; clones share the engine, registry and id generator.
#[derive(Clone)]
pub struct Store {
    engine: Arc<dyn StoreEngine>,
    registry: Arc<TypeRegistry>,
    ids: Arc<dyn IdGenerator>,
    config: ClientConfig,
}

impl Store {
    /// Handle with UUID ids and default configuration
    pub fn new(engine: Arc<dyn StoreEngine>, registry: Arc<TypeRegistry>) -> Self {
        Store {
            engine,
            registry,
            ids: Arc::new(UuidIdGenerator),
            config: ClientConfig::default(),
        }
    }

    /// Replace the id generator used by builders
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Replace the client configuration
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Shared type registry
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Mutation builder using this store's registry, ids and prefixes
    pub fn mutation(&self) -> MutationBuilder {
        MutationBuilder::new(self.registry.clone(), self.ids.clone()).with_prefixes(
            self.config.entity_id_prefix.clone(),
            self.config.trait_id_prefix.clone(),
        )
    }

    /// Empty query builder
    pub fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Submit a mutation request
    pub async fn mutate(&self, request: MutationRequest) -> Result<MutationResult> {
        let count = request.mutations.len();
        let result = self
            .timed("mutate", self.engine.mutate(request))
            .await
            .map_err(|e| log_failure("mutate", e))?;
        debug!(
            target: "tessera::client",
            mutations = count,
            last_operation_id = result.operation_ids.last().copied().unwrap_or(0),
            "Mutation accepted"
        );
        Ok(result)
    }

    /// Run a one-shot query
    ///
    /// # Errors
    ///
    /// `InvalidQuery` if the query carries a watch token; use [`Store::watch`].
    pub async fn query(&self, query: EntityQuery) -> Result<EntityResults> {
        if query.watch_token.is_some() {
            return Err(Error::invalid_query(
                "query has a watch token; submit it with watch()",
            ));
        }
        self.timed("query", self.engine.query(query))
            .await
            .map_err(|e| log_failure("query", e))
    }

    /// Fetch one entity by id
    pub async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        let query = QueryBuilder::new().with_id(id).build()?;
        let results = self.query(query).await?;
        Ok(results.entities.into_iter().find_map(|r| r.entity))
    }

    /// Prepare a live query without starting it
    ///
    /// # Errors
    ///
    /// `InvalidQuery` if the query has no watch token.
    pub fn live_query(&self, query: EntityQuery) -> Result<LiveQuery> {
        LiveQuery::new(self.engine.clone(), query, self.config.request_timeout())
    }

    /// Start a live query; its first update is the initial result page
    pub async fn watch(&self, query: EntityQuery) -> Result<LiveQuery> {
        let mut live = self.live_query(query)?;
        live.start().await?;
        Ok(live)
    }

    /// Release a watch by token; cancelling an inactive token succeeds
    pub async fn cancel_watch(&self, token: WatchToken) -> Result<()> {
        self.timed("cancel_watch", self.engine.cancel_watch(token)).await
    }

    async fn timed<T>(&self, op: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        with_timeout(op, self.config.request_timeout(), fut).await
    }
}

pub(crate) async fn with_timeout<T>(
    op: &str,
    timeout: std::time::Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!(
            "{} did not complete within {} ms",
            op,
            timeout.as_millis()
        ))),
    }
}

fn log_failure(op: &str, e: Error) -> Error {
    warn!(target: "tessera::client", op, error = %e, "Request failed");
    e
}
