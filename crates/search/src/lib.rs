//! Text search for Tessera match predicates
//!
//! This crate provides:
//! - Tokenizer that splits prose and identifiers into terms
//! - Text extraction from trait documents
//! - Scorer trait, ScorerContext corpus statistics and the BM25LiteScorer default
//!
//! # Usage
//!
//! ```
//! use tessera_search::{BM25LiteScorer, Scorer, ScorerContext, TextDoc};
//!
//! let docs = vec![TextDoc::new("buy milk"), TextDoc::new("call mom")];
//! let ctx = ScorerContext::from_docs(docs.iter());
//! let scorer = BM25LiteScorer::default();
//! assert!(scorer.score(&docs[0], "milk", &ctx) > 0.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod scorer;
pub mod text;
pub mod tokenizer;

pub use scorer::{BM25LiteScorer, Scorer, ScorerContext, TextDoc};
pub use text::document_text;
pub use tokenizer::{tokenize, tokenize_unique};
