//! Query execution
//!
//! Evaluation runs in fixed steps:
//!
//! 1. Validate the query and select candidates with [`crate::eval::select`]
//! 2. Give each candidate an ordering value for the effective ordering
//! 3. Sort, then cut the page with the paging cursors
//! 4. Hash the page; answer with a summary if the caller already holds it

use crate::config::EngineConfig;
use crate::eval::{select, Candidate};
use crate::hash::PageHasher;
use crate::store::StoreState;
use serde_json::Value;
use std::cmp::Ordering as CmpOrdering;
use tessera_core::{
    EntityQuery, EntityResult, EntityResults, Error, OrderingKey, OrderingValue, Paging,
    Predicate, Result, ResultSource, SortValue, Timestamp,
};

/// Evaluate `query` against `state`
pub(crate) fn execute(
    state: &StoreState,
    query: &EntityQuery,
    config: &EngineConfig,
) -> Result<EntityResults> {
    query.validate()?;
    if let Predicate::Test { success: false } = query.predicate {
        return Err(Error::TestFailure("test predicate requested failure".into()));
    }

    let ordering = query.effective_ordering();
    let candidates = select(
        &query.predicate,
        state.visible(query.include_deleted).collect(),
    );

    let mut ranked = rank(candidates, &ordering.key)?;
    ranked.sort_by(|a, b| {
        a.1.compare(&b.1, ordering.ascending)
            .unwrap_or(CmpOrdering::Equal)
    });
    let estimated_count = ranked.len() as u64;

    let count = query
        .paging
        .effective_count(config.default_page_size, config.max_page_size);
    let mut page = Vec::with_capacity(count as usize + 1);
    for (candidate, value) in ranked {
        if query.paging.admits(&value, ordering.ascending)? {
            page.push((candidate, value));
            if page.len() > count as usize {
                break;
            }
        }
    }
    let has_more = page.len() > count as usize;
    page.truncate(count as usize);

    let mut hasher = PageHasher::new();
    let mut entities = Vec::with_capacity(page.len());
    for (candidate, ordering_value) in page {
        let source = if candidate.entity.last_operation_id() > state.checkpoint {
            ResultSource::Pending
        } else {
            ResultSource::Chain
        };
        let entity = candidate.entity.snapshot();
        hasher.add(&entity, source, &ordering_value);
        entities.push(EntityResult {
            entity: Some(entity),
            source,
            ordering_value,
        });
    }
    let hash = hasher.finish();

    let summary = query.summary || query.result_hash == Some(hash);
    if summary {
        entities.iter_mut().for_each(|r| r.entity = None);
    }

    let current_page = Paging {
        count,
        ..query.paging.clone()
    };
    let next_page = match (has_more, entities.last()) {
        (true, Some(last)) => Some(Paging {
            after_ordering_value: Some(last.ordering_value.clone()),
            before_ordering_value: query.paging.before_ordering_value.clone(),
            count,
        }),
        _ => None,
    };

    Ok(EntityResults {
        entities,
        summary,
        estimated_count,
        current_page,
        next_page,
        hash,
    })
}

/// Attach ordering values
///
/// Every candidate is kept. Candidates without the ordered field carry
/// `Absent`; a field holding values of more than one kind is `InvalidOrdering`.
fn rank<'a>(
    candidates: Vec<Candidate<'a>>,
    key: &OrderingKey,
) -> Result<Vec<(Candidate<'a>, OrderingValue)>> {
    let mut ranked = Vec::with_capacity(candidates.len());
    let mut kind: Option<&'static str> = None;
    for c in candidates {
        let op = c.entity.last_operation_id();
        let value = match key {
            OrderingKey::Score => SortValue::Float(c.score.unwrap_or_default()),
            OrderingKey::OperationId => SortValue::Uint64(op),
            OrderingKey::Field(name) => {
                let value = field_value(&c, name)?;
                if value != SortValue::Absent {
                    match kind {
                        Some(seen) if seen != value.kind() => {
                            return Err(Error::invalid_ordering(format!(
                                "field {:?} holds both {} and {} values",
                                name,
                                seen,
                                value.kind()
                            )));
                        }
                        _ => kind = Some(value.kind()),
                    }
                }
                value
            }
        };
        ranked.push((
            c,
            OrderingValue {
                value,
                operation_id: op,
            },
        ));
    }
    Ok(ranked)
}

/// Sort value of a field on the first matched trait that has one
///
/// `creation_date` and `modification_date` fall back to the trait's own dates
/// when the payload has no such field. Null counts as missing.
fn field_value(candidate: &Candidate<'_>, name: &str) -> Result<SortValue> {
    for t in &candidate.matched {
        let field = t
            .document
            .as_ref()
            .and_then(|d| d.get(name))
            .filter(|v| !v.is_null());
        if let Some(field) = field {
            return sort_value(name, field);
        }
        match name {
            "creation_date" => return Ok(SortValue::Date(t.value.creation_date)),
            "modification_date" => return Ok(SortValue::Date(t.value.modification_date)),
            _ => {}
        }
    }
    Ok(SortValue::Absent)
}

/// Numbers always sort as floats, so a cursor keeps its kind as data grows
fn sort_value(name: &str, field: &Value) -> Result<SortValue> {
    let unsortable = |what: &str| {
        Error::invalid_ordering(format!("field {:?} holds {}, which cannot be sorted", name, what))
    };
    match field {
        Value::Number(n) => n
            .as_f64()
            .map(SortValue::Float)
            .ok_or_else(|| unsortable("a number outside f64 range")),
        Value::String(s) => Ok(SortValue::String(s.clone())),
        Value::Object(_) => serde_json::from_value::<Timestamp>(field.clone())
            .map(SortValue::Date)
            .map_err(|_| unsortable("an object")),
        Value::Bool(_) => Err(unsortable("a boolean")),
        Value::Array(_) => Err(unsortable("an array")),
        Value::Null => Ok(SortValue::Absent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::apply_mutation;
    use serde::{Deserialize, Serialize};
    use tessera_core::{
        EntityMutation, MutationOperation, Ordering, Trait, TraitType, TypeRegistry,
        TypedPayload,
    };

    #[derive(Debug, Serialize, Deserialize)]
    struct Score {
        player: String,
        points: i64,
    }

    impl TraitType for Score {
        const TYPE_NAME: &'static str = "game.Score";
    }

    /// Trait whose single field may hold anything
    #[derive(Debug, Serialize, Deserialize)]
    struct Loose {
        key: Value,
    }

    impl TraitType for Loose {
        const TYPE_NAME: &'static str = "game.Loose";
    }

    fn registry() -> TypeRegistry {
        TypeRegistry::new().with_type::<Score>().with_type::<Loose>()
    }

    fn put<T: TraitType>(state: &mut StoreState, entity: &str, value: &T) {
        let registry = registry();
        let t = Trait::new("t", TypedPayload::pack(value, &registry).unwrap());
        let m = EntityMutation::new(entity, MutationOperation::PutTrait(t));
        apply_mutation(state, &registry, &m).unwrap();
    }

    fn put_score(state: &mut StoreState, player: &str, points: i64) {
        let value = Score {
            player: player.to_string(),
            points,
        };
        put(state, player, &value);
    }

    fn seeded(points: &[(&str, i64)]) -> StoreState {
        let mut state = StoreState::default();
        for (player, p) in points {
            put_score(&mut state, player, *p);
        }
        state
    }

    fn seeded_loose(keys: Vec<(&str, Value)>) -> StoreState {
        let mut state = StoreState::default();
        for (entity, key) in keys {
            put(&mut state, entity, &Loose { key });
        }
        state
    }

    fn ordered(trait_name: &str, field: &str, ascending: bool) -> EntityQuery {
        let mut query = EntityQuery::new(Predicate::Trait {
            trait_name: trait_name.into(),
            query: None,
        });
        query.ordering = Some(Ordering::field(field, ascending));
        query
    }

    fn scores() -> EntityQuery {
        EntityQuery::new(Predicate::Trait {
            trait_name: "game.Score".into(),
            query: None,
        })
    }

    fn ids(results: &EntityResults) -> Vec<&str> {
        results.entity_ids()
    }

    #[test]
    fn test_default_ordering_is_latest_first() {
        let state = seeded(&[("a", 1), ("b", 2), ("c", 3)]);
        let results = execute(&state, &scores(), &EngineConfig::default()).unwrap();
        assert_eq!(ids(&results), vec!["c", "b", "a"]);
        assert_eq!(results.estimated_count, 3);
        assert!(results.next_page.is_none());
        assert!(results
            .entities
            .iter()
            .all(|r| r.source == ResultSource::Pending));
    }

    #[test]
    fn test_field_ordering_with_negative_values() {
        let state = seeded(&[("a", 5), ("b", -2), ("c", 10)]);
        let mut query = scores();
        query.ordering = Some(Ordering::field("points", true));
        let results = execute(&state, &query, &EngineConfig::default()).unwrap();
        assert_eq!(ids(&results), vec!["b", "a", "c"]);
        assert!(matches!(
            results.entities[0].ordering_value.value,
            SortValue::Float(_)
        ));
    }

    #[test]
    fn test_string_field_ordering() {
        let state = seeded(&[("b", 1), ("c", 2), ("a", 3)]);
        let query = ordered("game.Score", "player", true);
        let results = execute(&state, &query, &EngineConfig::default()).unwrap();
        assert_eq!(ids(&results), vec!["a", "b", "c"]);
        assert_eq!(results.estimated_count, 3);
        assert_eq!(
            results.entities[0].ordering_value.value,
            SortValue::String("a".into())
        );

        let query = ordered("game.Score", "player", false);
        let results = execute(&state, &query, &EngineConfig::default()).unwrap();
        assert_eq!(ids(&results), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_missing_field_sorts_last() {
        let state = seeded_loose(vec![
            ("a", Value::from(2)),
            ("b", Value::Null),
            ("c", Value::from(1)),
        ]);
        let config = EngineConfig::default();

        let asc = execute(&state, &ordered("game.Loose", "key", true), &config).unwrap();
        assert_eq!(ids(&asc), vec!["c", "a", "b"]);
        assert_eq!(asc.entities[2].ordering_value.value, SortValue::Absent);

        let desc = execute(&state, &ordered("game.Loose", "key", false), &config).unwrap();
        assert_eq!(ids(&desc), vec!["a", "c", "b"]);

        let none = execute(&state, &ordered("game.Loose", "nope", true), &config).unwrap();
        assert_eq!(ids(&none), vec!["a", "b", "c"]);
        assert_eq!(none.estimated_count, 3);
    }

    #[test]
    fn test_absent_results_page_through() {
        let state = seeded_loose(vec![
            ("a", Value::Null),
            ("b", Value::from(5)),
            ("c", Value::Null),
        ]);
        let config = EngineConfig::default();
        let mut query = ordered("game.Loose", "key", true);
        query.paging = Paging::new(2);

        let first = execute(&state, &query, &config).unwrap();
        assert_eq!(ids(&first), vec!["b", "a"]);
        let second = execute(&state, &query.with_paging(first.next_page.unwrap()), &config)
            .unwrap();
        assert_eq!(ids(&second), vec!["c"]);
    }

    #[test]
    fn test_mixed_field_kinds_rejected() {
        let state = seeded_loose(vec![("a", Value::from(1)), ("b", Value::from("x"))]);
        assert!(matches!(
            execute(&state, &ordered("game.Loose", "key", true), &EngineConfig::default()),
            Err(Error::InvalidOrdering(_))
        ));

        let state = seeded_loose(vec![("a", Value::Bool(true))]);
        assert!(matches!(
            execute(&state, &ordered("game.Loose", "key", true), &EngineConfig::default()),
            Err(Error::InvalidOrdering(_))
        ));
    }

    #[test]
    fn test_cursor_survives_appended_negative_value() {
        let mut state = seeded(&[("a", 1), ("b", 2)]);
        let config = EngineConfig::default();
        let mut query = ordered("game.Score", "points", true);
        query.paging = Paging::new(1);

        let first = execute(&state, &query, &config).unwrap();
        assert_eq!(ids(&first), vec!["a"]);
        let next = first.next_page.unwrap();
        assert!(matches!(
            next.after_ordering_value.as_ref().unwrap().value,
            SortValue::Float(_)
        ));

        put_score(&mut state, "c", -5);
        let second = execute(&state, &query.with_paging(next), &config).unwrap();
        assert_eq!(ids(&second), vec!["b"]);
        assert_eq!(second.estimated_count, 3);
    }

    #[test]
    fn test_paging_walks_all_results_once() {
        let state = seeded(&[("a", 1), ("b", 2), ("c", 3), ("d", 4), ("e", 5)]);
        let config = EngineConfig::default();
        let mut query = scores();
        query.paging = Paging::new(2);

        let mut seen = Vec::new();
        loop {
            let page = execute(&state, &query, &config).unwrap();
            assert!(page.len() <= 2);
            seen.extend(page.entity_ids().into_iter().map(String::from));
            match page.next_page {
                Some(next) => query = query.with_paging(next),
                None => break,
            }
        }
        assert_eq!(seen, vec!["e", "d", "c", "b", "a"]);
    }

    #[test]
    fn test_result_hash_turns_into_summary() {
        let state = seeded(&[("a", 1)]);
        let config = EngineConfig::default();
        let first = execute(&state, &scores(), &config).unwrap();
        assert!(!first.summary);

        let mut again = scores();
        again.result_hash = Some(first.hash);
        let second = execute(&state, &again, &config).unwrap();
        assert!(second.summary);
        assert!(second.is_unchanged_from(first.hash));
        assert!(second.entities[0].entity.is_none());
        assert_eq!(second.entities[0].ordering_value, first.entities[0].ordering_value);
    }

    #[test]
    fn test_checkpoint_marks_chain() {
        let mut state = seeded(&[("a", 1), ("b", 2)]);
        state.checkpoint = 1;
        let results = execute(&state, &scores(), &EngineConfig::default()).unwrap();
        let sources: Vec<_> = results.entities.iter().map(|r| r.source).collect();
        assert_eq!(sources, vec![ResultSource::Pending, ResultSource::Chain]);
    }

    #[test]
    fn test_test_predicate() {
        let state = seeded(&[("a", 1)]);
        let config = EngineConfig::default();
        let ok = EntityQuery::new(Predicate::Test { success: true });
        assert!(execute(&state, &ok, &config).unwrap().is_empty());
        let fail = EntityQuery::new(Predicate::Test { success: false });
        assert!(matches!(
            execute(&state, &fail, &config),
            Err(Error::TestFailure(_))
        ));
    }

    #[test]
    fn test_page_size_capped() {
        let state = seeded(&[("a", 1), ("b", 2), ("c", 3)]);
        let config = EngineConfig {
            default_page_size: 1,
            max_page_size: 2,
            ..EngineConfig::default()
        };
        let mut query = scores();
        assert_eq!(execute(&state, &query, &config).unwrap().len(), 1);
        query.paging = Paging::new(50);
        let results = execute(&state, &query, &config).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results.current_page.count, 2);
    }
}
