//! Relevance scoring for match predicates
//!
//! This module provides:
//! - `TextDoc`: the text view of one candidate (an entity or a single trait)
//! - `ScorerContext`: corpus statistics (document frequencies, average length)
//! - `Scorer` trait and the default `BM25LiteScorer`
//!
//! Scores are only meaningful relative to other scores from the same
//! context; engines use them as `Float` ordering values.

use crate::tokenizer::{tokenize, tokenize_unique};
use std::collections::HashMap;

// ============================================================================
// TextDoc
// ============================================================================

/// Tokenized text of one candidate
#[derive(Debug, Clone, Default)]
pub struct TextDoc {
    terms: Vec<String>,
}

impl TextDoc {
    /// Tokenize `body`
    pub fn new(body: &str) -> Self {
        TextDoc {
            terms: tokenize(body),
        }
    }

    /// Number of terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Check if the document has no terms
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn term_counts(&self) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for term in &self.terms {
            *counts.entry(term.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

// ============================================================================
// ScorerContext
// ============================================================================

/// Corpus-level statistics needed by BM25
#[derive(Debug, Clone, Default)]
pub struct ScorerContext {
    /// Total documents in the corpus
    pub total_docs: usize,
    /// Number of documents containing each term
    pub doc_freqs: HashMap<String, usize>,
    /// Average document length in terms
    pub avg_doc_len: f32,
}

impl ScorerContext {
    /// Build statistics over a set of candidate documents
    pub fn from_docs<'a>(docs: impl IntoIterator<Item = &'a TextDoc>) -> Self {
        let mut ctx = ScorerContext::default();
        let mut total_len = 0usize;
        for doc in docs {
            ctx.total_docs += 1;
            total_len += doc.len();
            let mut seen = std::collections::HashSet::new();
            for term in &doc.terms {
                if seen.insert(term.as_str()) {
                    *ctx.doc_freqs.entry(term.clone()).or_insert(0) += 1;
                }
            }
        }
        if ctx.total_docs > 0 {
            ctx.avg_doc_len = total_len as f32 / ctx.total_docs as f32;
        }
        ctx
    }

    /// Smoothed inverse document frequency
    ///
    /// IDF(t) = ln((N - df + 0.5) / (df + 0.5) + 1)
    pub fn idf(&self, term: &str) -> f32 {
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f32;
        let n = self.total_docs as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }
}

// ============================================================================
// Scorer
// ============================================================================

/// Pluggable scoring interface
///
/// Returns a score where higher = more relevant and 0.0 = no match.
pub trait Scorer: Send + Sync {
    /// Score a document against a query
    fn score(&self, doc: &TextDoc, query: &str, ctx: &ScorerContext) -> f32;

    /// Name for debugging and logging
    fn name(&self) -> &str;
}

/// BM25-inspired scorer
///
/// For each query term t:
/// score += IDF(t) * (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * dl/avgdl))
#[derive(Debug, Clone)]
pub struct BM25LiteScorer {
    k1: f32,
    b: f32,
}

impl Default for BM25LiteScorer {
    fn default() -> Self {
        BM25LiteScorer { k1: 1.2, b: 0.75 }
    }
}

impl BM25LiteScorer {
    /// Create a scorer with custom parameters
    pub fn new(k1: f32, b: f32) -> Self {
        BM25LiteScorer { k1, b }
    }
}

impl Scorer for BM25LiteScorer {
    fn score(&self, doc: &TextDoc, query: &str, ctx: &ScorerContext) -> f32 {
        let query_terms = tokenize_unique(query);
        if query_terms.is_empty() || doc.is_empty() {
            return 0.0;
        }

        let counts = doc.term_counts();
        let doc_len = doc.len() as f32;
        let avg_len = ctx.avg_doc_len.max(1.0);

        let mut score = 0.0;
        for term in &query_terms {
            let tf = counts.get(term.as_str()).copied().unwrap_or(0) as f32;
            if tf == 0.0 {
                continue;
            }
            let tf_component =
                (tf * (self.k1 + 1.0)) / (tf + self.k1 * (1.0 - self.b + self.b * doc_len / avg_len));
            score += ctx.idf(term) * tf_component;
        }
        score
    }

    fn name(&self) -> &str {
        "bm25-lite"
    }
}
