//! Protocol Conformance Suite
//!
//! Drives a [`Store`](tessera::Store) over the in-memory engine and checks
//! the observable contract any engine must honor.
//!
//! ## Test Groups
//!
//! - **mutation_contract**: operation ids, put/get round trip, preconditions
//! - **paging_contract**: page bounds, cursor continuation, idempotence
//! - **live_query_contract**: push on change, unchanged summaries, cancellation
//! - **payload_contract**: type tags and codec behavior
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test protocol_conformance
//! cargo test --test protocol_conformance live_query
//! ```

mod test_utils;

mod live_query_contract;
mod mutation_contract;
mod paging_contract;
mod payload_contract;
