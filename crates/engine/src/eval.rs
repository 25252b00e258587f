//! Predicate evaluation
//!
//! Predicates are evaluated against the projected trait documents kept in
//! the store. A trait whose payload type is unregistered has no document:
//! it still satisfies type-only trait predicates but never matches text,
//! field or reference predicates.

use crate::store::{EntityRecord, TraitRecord};
use serde_json::Value;
use std::collections::HashSet;
use tessera_core::{canonicalize, Predicate, Reference, ReferencePredicate, TraitQuery};
use tessera_search::{document_text, BM25LiteScorer, Scorer, ScorerContext, TextDoc};

/// Entity selected by a predicate
#[derive(Debug)]
pub(crate) struct Candidate<'a> {
    pub entity: &'a EntityRecord,
    /// Relevance, for text matches
    pub score: Option<f64>,
    /// Traits that satisfied a trait predicate, in entity order
    pub matched: Vec<&'a TraitRecord>,
}

impl<'a> Candidate<'a> {
    fn plain(entity: &'a EntityRecord) -> Self {
        Candidate {
            entity,
            score: None,
            matched: Vec::new(),
        }
    }
}

/// Select the entities of `scope` that satisfy `predicate`
///
/// `Predicate::Test` selects nothing; the caller decides whether it fails.
pub(crate) fn select<'a>(
    predicate: &Predicate,
    scope: Vec<&'a EntityRecord>,
) -> Vec<Candidate<'a>> {
    match predicate {
        Predicate::Match(text) => match_entities(text, scope),
        Predicate::Trait { trait_name, query } => match_traits(trait_name, query.as_ref(), scope),
        Predicate::Ids(ids) => {
            let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
            scope
                .into_iter()
                .filter(|e| wanted.contains(e.id.as_str()))
                .map(Candidate::plain)
                .collect()
        }
        Predicate::Reference(target) => scope
            .into_iter()
            .filter(|e| {
                e.traits.iter().any(|t| match &t.document {
                    Some(Value::Object(fields)) => {
                        fields.values().any(|v| references(v, target))
                    }
                    _ => false,
                })
            })
            .map(Candidate::plain)
            .collect(),
        Predicate::Operations(ops) => {
            let wanted: HashSet<u64> = ops.iter().copied().collect();
            scope
                .into_iter()
                .filter(|e| e.operations.iter().any(|o| wanted.contains(o)))
                .map(Candidate::plain)
                .collect()
        }
        Predicate::All => scope.into_iter().map(Candidate::plain).collect(),
        Predicate::Test { .. } => Vec::new(),
    }
}

fn match_entities<'a>(text: &str, scope: Vec<&'a EntityRecord>) -> Vec<Candidate<'a>> {
    let docs: Vec<TextDoc> = scope
        .iter()
        .map(|e| {
            let body: Vec<String> = e
                .traits
                .iter()
                .filter_map(|t| t.document.as_ref())
                .map(document_text)
                .collect();
            TextDoc::new(&body.join(" "))
        })
        .collect();
    let ctx = ScorerContext::from_docs(docs.iter());
    let scorer = BM25LiteScorer::default();

    scope
        .into_iter()
        .zip(docs.iter())
        .filter_map(|(entity, doc)| {
            let score = scorer.score(doc, text, &ctx);
            (score > 0.0).then(|| Candidate {
                entity,
                score: Some(score as f64),
                matched: Vec::new(),
            })
        })
        .collect()
}

fn match_traits<'a>(
    trait_name: &str,
    query: Option<&TraitQuery>,
    scope: Vec<&'a EntityRecord>,
) -> Vec<Candidate<'a>> {
    let type_tag = canonicalize(trait_name);
    let typed: Vec<(&'a EntityRecord, Vec<&'a TraitRecord>)> = scope
        .into_iter()
        .filter_map(|e| {
            let traits: Vec<&TraitRecord> = e
                .traits
                .iter()
                .filter(|t| t.value.payload.type_tag() == type_tag)
                .collect();
            (!traits.is_empty()).then_some((e, traits))
        })
        .collect();

    match query {
        None => typed
            .into_iter()
            .map(|(entity, matched)| Candidate {
                entity,
                score: None,
                matched,
            })
            .collect(),
        Some(TraitQuery::Match(text)) => match_trait_text(text, typed),
        Some(TraitQuery::Field {
            field,
            value,
            operator,
        }) => filter_traits(typed, |doc| {
            doc.get(field)
                .and_then(|f| value.compare_field(f))
                .is_some_and(|ord| operator.accepts(ord))
        }),
        Some(TraitQuery::Reference { field, reference }) => filter_traits(typed, |doc| {
            doc.get(field).is_some_and(|f| references(f, reference))
        }),
    }
}

/// Score each trait of the type on its own; an entity scores as its best trait
fn match_trait_text<'a>(
    text: &str,
    typed: Vec<(&'a EntityRecord, Vec<&'a TraitRecord>)>,
) -> Vec<Candidate<'a>> {
    let docs: Vec<Vec<TextDoc>> = typed
        .iter()
        .map(|(_, traits)| {
            traits
                .iter()
                .map(|t| TextDoc::new(&t.document.as_ref().map(document_text).unwrap_or_default()))
                .collect()
        })
        .collect();
    let ctx = ScorerContext::from_docs(docs.iter().flatten());
    let scorer = BM25LiteScorer::default();

    typed
        .into_iter()
        .zip(docs.iter())
        .filter_map(|((entity, traits), trait_docs)| {
            let mut best = 0.0f32;
            let mut matched = Vec::new();
            for (record, doc) in traits.into_iter().zip(trait_docs) {
                let score = scorer.score(doc, text, &ctx);
                if score > 0.0 {
                    best = best.max(score);
                    matched.push(record);
                }
            }
            (!matched.is_empty()).then(|| Candidate {
                entity,
                score: Some(best as f64),
                matched,
            })
        })
        .collect()
}

fn filter_traits<'a>(
    typed: Vec<(&'a EntityRecord, Vec<&'a TraitRecord>)>,
    accept: impl Fn(&Value) -> bool,
) -> Vec<Candidate<'a>> {
    typed
        .into_iter()
        .filter_map(|(entity, traits)| {
            let matched: Vec<&TraitRecord> = traits
                .into_iter()
                .filter(|t| t.document.as_ref().is_some_and(&accept))
                .collect();
            (!matched.is_empty()).then_some(Candidate {
                entity,
                score: None,
                matched,
            })
        })
        .collect()
}

/// Check whether a document value (a reference or an array of them) points at the target
fn references(value: &Value, target: &ReferencePredicate) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|v| references(v, target)),
        other => Reference::from_document(other)
            .is_some_and(|r| r.points_to(&target.entity_id, target.trait_id.as_deref())),
    }
}
