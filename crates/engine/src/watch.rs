//! Live query registry
//!
//! Each active watch owns a bounded channel feeding the stream returned by
//! `watch_query`. After every state change the engine re-evaluates all
//! watched queries and pushes a page when its hash moved. Pushes never
//! block: a watcher whose buffer is nearly full gets a terminal
//! `Unavailable` error and is dropped.
//!
//! Lock order is state lock, then registry. The registry never calls back
//! into the store while holding one of its own entries.
//!
//! Each registration gets a fresh generation. Re-evaluated results and
//! removals carry the generation they were computed for, so a token that was
//! re-registered in between is left alone.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use tessera_core::{EntityQuery, EntityResults, Error, Result, ResultStream, WatchToken};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

type Sender = mpsc::Sender<Result<EntityResults>>;

/// One registration of a token
pub(crate) type WatchKey = (WatchToken, u64);

struct Watcher {
    generation: u64,
    query: EntityQuery,
    last_hash: u64,
    sender: Sender,
}

/// Active watches keyed by token
#[derive(Default)]
pub(crate) struct WatchRegistry {
    watchers: DashMap<WatchToken, Watcher>,
    generations: AtomicU64,
}

/// What a re-evaluation should do with one watcher
enum Push {
    Page(EntityResults),
    Fail(Error),
    Nothing,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watch and return its stream, primed with `initial`
    ///
    /// A token whose previous stream was dropped without cancelling is
    /// treated as free.
    pub fn register(
        &self,
        token: WatchToken,
        query: EntityQuery,
        initial: EntityResults,
        capacity: usize,
    ) -> Result<ResultStream> {
        let (sender, receiver) = mpsc::channel(capacity);
        let last_hash = initial.hash;
        sender
            .try_send(Ok(initial))
            .map_err(|_| Error::unavailable("watch channel rejected initial results"))?;
        let watcher = Watcher {
            generation: self.generations.fetch_add(1, Ordering::Relaxed),
            query,
            last_hash,
            sender,
        };

        match self.watchers.entry(token) {
            Entry::Occupied(mut slot) => {
                if !slot.get().sender.is_closed() {
                    return Err(Error::DuplicateWatch(token));
                }
                debug!(target: "tessera::watch", token, "Replacing abandoned watch");
                slot.insert(watcher);
            }
            Entry::Vacant(slot) => {
                slot.insert(watcher);
            }
        }
        info!(target: "tessera::watch", token, "Watch registered");
        Ok(ReceiverStream::new(receiver).boxed())
    }

    /// Remove a watch, ending its stream; returns whether it was active
    pub fn cancel(&self, token: WatchToken) -> bool {
        let removed = self.watchers.remove(&token).is_some();
        if removed {
            info!(target: "tessera::watch", token, "Watch cancelled");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    /// Snapshot of the watched queries, taken without holding entries
    pub fn queries(&self) -> Vec<(WatchKey, EntityQuery)> {
        self.watchers
            .iter()
            .map(|w| ((*w.key(), w.generation), w.query.clone()))
            .collect()
    }

    /// Deliver re-evaluated results to their watchers
    ///
    /// Changed pages are pushed in full. Unchanged pages are pushed as
    /// summaries only when `notify_unchanged` is set.
    pub fn deliver(
        &self,
        evaluated: Vec<(WatchKey, Result<EntityResults>)>,
        notify_unchanged: bool,
    ) {
        let mut finished = Vec::new();
        for ((token, generation), outcome) in evaluated {
            // Cancelled or re-registered between evaluation and delivery
            let Some(mut watcher) = self.watchers.get_mut(&token) else {
                continue;
            };
            if watcher.generation != generation {
                continue;
            }
            if watcher.sender.is_closed() {
                finished.push((token, generation));
                continue;
            }

            let push = match outcome {
                Err(e) => Push::Fail(e),
                Ok(results) if results.hash != watcher.last_hash => Push::Page(results),
                Ok(mut results) if notify_unchanged => {
                    results.summary = true;
                    results.entities.iter_mut().for_each(|r| r.entity = None);
                    Push::Page(results)
                }
                Ok(_) => Push::Nothing,
            };

            match push {
                Push::Nothing => {}
                Push::Fail(e) => {
                    warn!(target: "tessera::watch", token, error = %e, "Watch query failed");
                    terminate(&watcher.sender, token, e);
                    finished.push((token, generation));
                }
                Push::Page(_) if watcher.sender.capacity() <= 1 => {
                    warn!(target: "tessera::watch", token, "Watch consumer lagging, dropping watch");
                    terminate(
                        &watcher.sender,
                        token,
                        Error::unavailable("live query consumer is lagging"),
                    );
                    finished.push((token, generation));
                }
                Push::Page(results) => {
                    let hash = results.hash;
                    if watcher.sender.try_send(Ok(results)).is_ok() {
                        debug!(target: "tessera::watch", token, hash, "Pushed live results");
                        watcher.last_hash = hash;
                    } else {
                        finished.push((token, generation));
                    }
                }
            }
        }
        for (token, generation) in finished {
            let removed = self
                .watchers
                .remove_if(&token, |_, w| w.generation == generation)
                .is_some();
            if removed {
                debug!(target: "tessera::watch", token, "Watch dropped");
            }
        }
    }
}

/// Send the last item of a watch's stream
fn terminate(sender: &Sender, token: WatchToken, error: Error) {
    if let Err(e) = sender.try_send(Err(error)) {
        warn!(
            target: "tessera::watch",
            token,
            reason = %e,
            "Terminal watch error not delivered"
        );
    }
}
