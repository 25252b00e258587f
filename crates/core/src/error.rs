//! Error types for the Tessera store protocol
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Propagation
//!
//! - Builder contract violations (`InvalidQuery`, `InvalidOrdering`, `InvalidMutation`)
//!   are raised when the request is built, never by the engine.
//! - Type registry errors (`UnregisteredType`, `DecodeError`) are raised at pack/unpack time.
//! - Engine errors fail the specific request they belong to. A watch that fails ends its
//!   stream with one terminal error item.

use thiserror::Error;

/// Result type alias for Tessera operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Tessera store protocol
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Query is malformed (no predicate, several predicates, bad paging)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Ordering values that cannot be compared (mixed variants, sentinel as result value)
    #[error("Invalid ordering: {0}")]
    InvalidOrdering(String),

    /// Mutation request is malformed (no target entity, empty batch, bad compaction)
    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),

    /// Type tag has no codec in the registry
    #[error("Unregistered type: {0}")]
    UnregisteredType(String),

    /// Payload bytes do not parse under the resolved codec
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Value could not be encoded by its codec
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// UpdateTrait precondition failed: the trait's last operation id differs
    #[error(
        "Conflicting write on {entity_id}/{trait_id}: expected last operation {expected}, found {}",
        actual.map(|a| a.to_string()).unwrap_or_else(|| "none".to_string())
    )]
    ConflictingWrite {
        /// Entity the update targeted
        entity_id: String,
        /// Trait the update targeted
        trait_id: String,
        /// Operation id the caller expected
        expected: u64,
        /// Operation id actually found (None if the trait does not exist)
        actual: Option<u64>,
    },

    /// Trait does not exist on the entity
    #[error("Trait not found: {entity_id}/{trait_id}")]
    TraitNotFound {
        /// Entity that was looked up
        entity_id: String,
        /// Missing trait id
        trait_id: String,
    },

    /// Watch token is not active
    #[error("Unknown watch token: {0}")]
    UnknownWatch(u64),

    /// Watch token is already active on this engine
    #[error("Watch token already active: {0}")]
    DuplicateWatch(u64),

    /// Test operation or predicate requested a failure
    #[error("Test failure: {0}")]
    TestFailure(String),

    /// Configuration file could not be read, parsed or validated
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Engine cannot serve the request (transport, durability, resource exhaustion)
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// Request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),
}

impl Error {
    /// Create an InvalidQuery error
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Error::InvalidQuery(message.into())
    }

    /// Create an InvalidOrdering error
    pub fn invalid_ordering(message: impl Into<String>) -> Self {
        Error::InvalidOrdering(message.into())
    }

    /// Create an InvalidMutation error
    pub fn invalid_mutation(message: impl Into<String>) -> Self {
        Error::InvalidMutation(message.into())
    }

    /// Create an InvalidConfig error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig(message.into())
    }

    /// Create an Unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Error::Unavailable(message.into())
    }

    /// Check if this is an optimistic concurrency failure
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::ConflictingWrite { .. })
    }

    /// Check if retrying the same request may succeed
    ///
    /// Only transport/durability failures are retryable. Contract violations
    /// and conflicts fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Unavailable(_) | Error::Timeout(_))
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::DecodeError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_query() {
        let err = Error::invalid_query("no predicate");
        let msg = err.to_string();
        assert!(msg.contains("Invalid query"));
        assert!(msg.contains("no predicate"));
    }

    #[test]
    fn test_error_display_conflicting_write() {
        let err = Error::ConflictingWrite {
            entity_id: "et1".to_string(),
            trait_id: "tr1".to_string(),
            expected: 42,
            actual: Some(43),
        };
        let msg = err.to_string();
        assert!(msg.contains("Conflicting write"));
        assert!(msg.contains("42"));
        assert!(msg.contains("43"));
    }

    #[test]
    fn test_error_display_conflicting_write_missing_trait() {
        let err = Error::ConflictingWrite {
            entity_id: "et1".to_string(),
            trait_id: "tr1".to_string(),
            expected: 7,
            actual: None,
        };
        assert!(err.to_string().contains("none"));
    }

    #[test]
    fn test_error_from_decode() {
        let invalid = [0xc1u8];
        let result: Result<String> = rmp_serde::from_slice(&invalid).map_err(|e| e.into());
        assert!(matches!(result, Err(Error::DecodeError(_))));
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::Timeout("mutate".into()).is_retryable());
        assert!(Error::unavailable("down").is_retryable());
        assert!(!Error::invalid_query("x").is_retryable());

        let conflict = Error::ConflictingWrite {
            entity_id: "e".into(),
            trait_id: "t".into(),
            expected: 1,
            actual: Some(2),
        };
        assert!(conflict.is_conflict());
        assert!(!conflict.is_retryable());
    }

    #[test]
    fn test_error_pattern_matching() {
        let err = Error::UnknownWatch(42);
        match err {
            Error::UnknownWatch(token) => assert_eq!(token, 42),
            _ => panic!("Wrong error variant"),
        }
    }
}
