//! In-memory reference engine
//!
//! [`MemoryEngine`] implements [`StoreEngine`] over a single in-process
//! state guarded by a `parking_lot::RwLock`. Mutations are indexed before
//! `mutate` returns, so `wait_indexed` is always satisfied.
//!
//! # Durability model
//!
//! There is no storage behind the engine. A commit checkpoint stands in
//! for durability: operations above it are reported as `Pending`, the rest
//! as `Chain`. [`MemoryEngine::commit`] moves the checkpoint to the latest
//! operation; `auto_commit` moves it after every request.

use crate::apply::apply_mutation;
use crate::config::EngineConfig;
use crate::query::execute;
use crate::store::StoreState;
use crate::watch::WatchRegistry;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tessera_core::{
    EntityQuery, EntityResults, Error, MutationRequest, MutationResult, Result, ResultStream,
    StoreEngine, TypeRegistry, WatchToken,
};
use tracing::{debug, info, warn};

/// Reference engine holding all entities in memory
pub struct MemoryEngine {
    registry: Arc<TypeRegistry>,
    config: EngineConfig,
    state: RwLock<StoreState>,
    watches: WatchRegistry,
    /// Serializes watch re-evaluation so pushes follow state order
    refresh: Mutex<()>,
}

impl MemoryEngine {
    /// Engine with default configuration
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::build(registry, EngineConfig::default())
    }

    /// Engine with explicit configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration does not validate.
    pub fn with_config(registry: Arc<TypeRegistry>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(registry, config))
    }

    fn build(registry: Arc<TypeRegistry>, config: EngineConfig) -> Self {
        info!(
            target: "tessera::engine",
            types = registry.len(),
            auto_commit = config.auto_commit,
            "Memory engine created"
        );
        MemoryEngine {
            registry,
            config,
            state: RwLock::new(StoreState::default()),
            watches: WatchRegistry::new(),
            refresh: Mutex::new(()),
        }
    }

    /// Registry used to project payloads
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Mark every applied operation durable
    ///
    /// Returns the new checkpoint. Watches whose results change source are
    /// notified.
    pub fn commit(&self) -> u64 {
        let checkpoint = {
            let mut state = self.state.write();
            state.checkpoint = state.last_operation_id();
            state.checkpoint
        };
        debug!(target: "tessera::engine", checkpoint, "Committed");
        self.refresh_watches();
        checkpoint
    }

    /// Highest operation id assigned so far (0 if none)
    pub fn last_operation_id(&self) -> u64 {
        self.state.read().last_operation_id()
    }

    /// Number of live queries currently registered
    pub fn active_watches(&self) -> usize {
        self.watches.len()
    }

    fn apply(&self, request: &MutationRequest) -> (Vec<u64>, Option<Error>) {
        let mut state = self.state.write();
        let mut operation_ids = Vec::with_capacity(request.mutations.len());
        for mutation in &request.mutations {
            match apply_mutation(&mut state, &self.registry, mutation) {
                Ok(op) => {
                    debug!(
                        target: "tessera::engine",
                        operation_id = op,
                        entity_id = %mutation.entity_id,
                        kind = mutation.operation.kind(),
                        "Mutation applied"
                    );
                    operation_ids.push(op);
                }
                Err(e) => {
                    warn!(
                        target: "tessera::engine",
                        entity_id = %mutation.entity_id,
                        kind = mutation.operation.kind(),
                        applied = operation_ids.len(),
                        error = %e,
                        "Mutation rejected, aborting rest of request"
                    );
                    return (operation_ids, Some(e));
                }
            }
        }
        if self.config.auto_commit {
            state.checkpoint = state.last_operation_id();
        }
        (operation_ids, None)
    }

    fn refresh_watches(&self) {
        if self.watches.is_empty() {
            return;
        }
        let _serial = self.refresh.lock();
        let queries = self.watches.queries();
        let evaluated: Vec<_> = {
            let state = self.state.read();
            queries
                .into_iter()
                .map(|(key, query)| (key, execute(&state, &query, &self.config)))
                .collect()
        };
        self.watches.deliver(evaluated, self.config.notify_unchanged);
    }
}

#[async_trait]
impl StoreEngine for MemoryEngine {
    async fn mutate(&self, request: MutationRequest) -> Result<MutationResult> {
        request.validate()?;

        let (operation_ids, failure) = self.apply(&request);
        if !operation_ids.is_empty() {
            self.refresh_watches();
        }
        if let Some(e) = failure {
            return Err(e);
        }

        let entities = request.return_entities.then(|| {
            let state = self.state.read();
            request
                .entity_ids()
                .into_iter()
                .filter_map(|id| state.entities.get(id).map(|e| e.snapshot()))
                .collect()
        });
        Ok(MutationResult {
            operation_ids,
            entities,
        })
    }

    async fn query(&self, query: EntityQuery) -> Result<EntityResults> {
        let results = execute(&self.state.read(), &query, &self.config)?;
        debug!(
            target: "tessera::engine",
            predicate = query.predicate.kind(),
            returned = results.len(),
            estimated = results.estimated_count,
            summary = results.summary,
            "Query executed"
        );
        Ok(results)
    }

    async fn watch_query(&self, query: EntityQuery) -> Result<ResultStream> {
        let token = query
            .watch_token
            .ok_or_else(|| Error::invalid_query("live query requires a watch token"))?;
        // Registered under the read lock so no mutation slips between the
        // initial page and the first re-evaluation
        let state = self.state.read();
        let initial = execute(&state, &query, &self.config)?;
        self.watches
            .register(token, query, initial, self.config.watch_channel_capacity)
    }

    async fn cancel_watch(&self, token: WatchToken) -> Result<()> {
        if !self.watches.cancel(token) {
            debug!(target: "tessera::engine", token, "Cancel of inactive watch ignored");
        }
        Ok(())
    }
}
