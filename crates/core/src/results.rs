//! Query result envelope
//!
//! Results are read-only snapshots. Each page carries a content `hash` so a
//! caller holding a previous page can tell "nothing changed" apart from new
//! content: when the query's `result_hash` matches, engines answer with a
//! summary (no bodies) carrying the same hash.

use crate::entity::Entity;
use crate::ordering::{OrderingValue, Paging};
use serde::{Deserialize, Serialize};

/// Where a matching entity was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResultSource {
    /// Engine did not say
    #[default]
    Unknown,
    /// Not-yet-durable tail of the operation log
    Pending,
    /// Durable store
    Chain,
}

/// One matching entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityResult {
    /// Entity body; None in summary results
    pub entity: Option<Entity>,
    /// Source of the match
    pub source: ResultSource,
    /// Sort key of this result (never a sentinel)
    pub ordering_value: OrderingValue,
}

impl EntityResult {
    /// Id of the entity, if the body is present
    pub fn entity_id(&self) -> Option<&str> {
        self.entity.as_ref().map(|e| e.id.as_str())
    }
}

/// Page of query results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityResults {
    /// Results in sort order
    pub entities: Vec<EntityResult>,
    /// Bodies omitted (summary query, or unchanged hash)
    pub summary: bool,
    /// Total matches before paging
    pub estimated_count: u64,
    /// Page that was served
    pub current_page: Paging,
    /// Request for the following page; None when there are no more results
    pub next_page: Option<Paging>,
    /// Content hash of this page
    pub hash: u64,
}

impl EntityResults {
    /// Number of results on this page
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the page is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Ordering value of the last result, the cursor for the next page
    pub fn last_ordering_value(&self) -> Option<OrderingValue> {
        self.entities.last().map(|r| r.ordering_value.clone())
    }

    /// Ids of returned entity bodies, in order
    pub fn entity_ids(&self) -> Vec<&str> {
        self.entities.iter().filter_map(EntityResult::entity_id).collect()
    }

    /// Check whether this page repeats content the caller already holds
    pub fn is_unchanged_from(&self, previous_hash: u64) -> bool {
        self.summary && self.hash == previous_hash
    }
}
