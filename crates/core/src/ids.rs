//! Identifier generation
//!
//! Entity and trait ids are strings. When the caller does not supply one, the
//! builders ask an injected [`IdGenerator`] for a fresh id carrying a
//! distinguishing prefix (e.g. `et` for entities, `tr` for traits).

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of unique string identifiers
///
/// Implementations must return ids that are globally unique within the
/// store's id space. Thread safety: callable concurrently.
pub trait IdGenerator: Send + Sync {
    /// Generate a new id starting with `prefix`
    fn generate(&self, prefix: &str) -> String;
}

/// Random (UUID v4) id generator
///
/// Produces `"{prefix}{uuid}"` with the UUID in simple (hyphenless) form.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self, prefix: &str) -> String {
        format!("{}{}", prefix, Uuid::new_v4().simple())
    }
}

/// Deterministic id generator
///
/// Produces `"{prefix}{n}"` with `n` counting up from a start value.
/// Unique only within one generator instance; meant for tests and replay.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Create a generator whose first id ends in `start`
    pub fn starting_at(start: u64) -> Self {
        SequentialIdGenerator {
            next: AtomicU64::new(start),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self, prefix: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", prefix, n)
    }
}
