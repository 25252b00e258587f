//! Live queries
//!
//! A [`LiveQuery`] wraps one watch token's result stream and reconciles
//! pushes against the last full page it received:
//!
//! - a push with a new hash replaces the cached page ([`LiveUpdate::Changed`])
//! - a summary push with the cached hash means nothing visible changed
//!   ([`LiveUpdate::Unchanged`]); the cached page is kept
//! - an error push is terminal; the stream yields nothing afterwards
//!
//! Cancellation goes through a [`CancelHandle`], which can run while
//! another task is awaiting [`LiveQuery::next`]. A push that was already in
//! flight when the handle fired is discarded.

use crate::store::with_timeout;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tessera_core::{
    EntityQuery, EntityResults, Error, Result, ResultStream, StoreEngine, WatchToken,
};
use tracing::{debug, info};

/// Lifecycle of a live query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveState {
    /// Built, not yet submitted
    Created,
    /// Watch registered; pushes are expected
    Active,
    /// Released by the client
    Cancelled,
    /// Engine ended the stream, with or without an error
    Terminated,
}

/// One reconciled push
#[derive(Debug, Clone, PartialEq)]
pub enum LiveUpdate {
    /// Results changed; this is the new page
    Changed(EntityResults),
    /// Engine re-evaluated and found the same content
    Unchanged {
        /// Hash shared with the cached page
        hash: u64,
    },
}

/// Idempotent cancellation of one watch
#[derive(Clone)]
pub struct CancelHandle {
    engine: Arc<dyn StoreEngine>,
    token: WatchToken,
    cancelled: Arc<AtomicBool>,
    timeout: Duration,
}

impl CancelHandle {
    /// Release the watch
    ///
    /// Only the first call reaches the engine; later calls return `Ok`.
    pub async fn cancel(&self) -> Result<()> {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(target: "tessera::client", token = self.token, "Cancelling live query");
        with_timeout(
            "cancel_watch",
            self.timeout,
            self.engine.cancel_watch(self.token),
        )
        .await
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Client side of a watch
pub struct LiveQuery {
    query: EntityQuery,
    token: WatchToken,
    state: LiveState,
    stream: Option<ResultStream>,
    current: Option<EntityResults>,
    handle: CancelHandle,
}

impl LiveQuery {
    /// Prepare a live query in the `Created` state
    ///
    /// # Errors
    ///
    /// `InvalidQuery` if the query has no watch token, and any error of
    /// [`EntityQuery::validate`].
    pub fn new(
        engine: Arc<dyn StoreEngine>,
        query: EntityQuery,
        timeout: Duration,
    ) -> Result<Self> {
        let token = query
            .watch_token
            .ok_or_else(|| Error::invalid_query("live query requires a watch token"))?;
        query.validate()?;
        Ok(LiveQuery {
            query,
            token,
            state: LiveState::Created,
            stream: None,
            current: None,
            handle: CancelHandle {
                engine,
                token,
                cancelled: Arc::new(AtomicBool::new(false)),
                timeout,
            },
        })
    }

    /// Submit the watch
    ///
    /// Starting an active query is a no-op. A cancelled or terminated query
    /// cannot be restarted.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            LiveState::Active => return Ok(()),
            LiveState::Cancelled | LiveState::Terminated => {
                return Err(Error::UnknownWatch(self.token));
            }
            LiveState::Created => {}
        }
        let stream = with_timeout(
            "watch_query",
            self.handle.timeout,
            self.handle.engine.watch_query(self.query.clone()),
        )
        .await?;
        self.stream = Some(stream);
        self.state = LiveState::Active;
        debug!(target: "tessera::client", token = self.token, "Live query active");
        Ok(())
    }

    /// Wait for the next push
    ///
    /// Returns `None` once the query is cancelled or the stream has ended,
    /// and before it was started.
    pub async fn next(&mut self) -> Option<Result<LiveUpdate>> {
        if self.handle.is_cancelled() {
            self.close(LiveState::Cancelled);
            return None;
        }
        let item = self.stream.as_mut()?.next().await;
        if self.handle.is_cancelled() {
            self.close(LiveState::Cancelled);
            return None;
        }

        match item {
            None => {
                self.close(LiveState::Terminated);
                None
            }
            Some(Err(e)) => {
                self.close(LiveState::Terminated);
                Some(Err(e))
            }
            Some(Ok(results)) => Some(Ok(self.reconcile(results))),
        }
    }

    fn reconcile(&mut self, results: EntityResults) -> LiveUpdate {
        if let Some(current) = &self.current {
            if results.is_unchanged_from(current.hash) {
                return LiveUpdate::Unchanged { hash: results.hash };
            }
        }
        // Summary pages of a summary query are the content itself
        if !results.summary || self.query.summary {
            self.current = Some(results.clone());
        }
        LiveUpdate::Changed(results)
    }

    fn close(&mut self, state: LiveState) {
        self.stream = None;
        self.state = state;
    }

    /// Release the watch; safe to call more than once
    pub async fn cancel(&mut self) -> Result<()> {
        if self.state == LiveState::Created {
            self.handle.cancelled.store(true, Ordering::SeqCst);
        } else if self.state == LiveState::Active {
            self.handle.cancel().await?;
        }
        if self.state != LiveState::Terminated {
            self.close(LiveState::Cancelled);
        }
        Ok(())
    }

    /// Handle for cancelling from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> LiveState {
        self.state
    }

    /// Watch token
    pub fn token(&self) -> WatchToken {
        self.token
    }

    /// Last full page received
    pub fn results(&self) -> Option<&EntityResults> {
        self.current.as_ref()
    }

    /// Hash of the last full page received
    pub fn hash(&self) -> Option<u64> {
        self.current.as_ref().map(|r| r.hash)
    }
}
