//! Predicate algebra and entity queries
//!
//! An [`EntityQuery`] carries exactly one [`Predicate`], which the type
//! system enforces. Predicates select entities directly (ids, references,
//! operations, text) or through one of their traits, optionally narrowed by
//! a [`TraitQuery`] over that trait's fields.
//!
//! Field comparisons take an explicit [`FieldValue`] variant: a value is a
//! string, a signed or unsigned integer, or a date, never "whichever parses".

use crate::error::{Error, Result};
use crate::ordering::{Ordering, OrderingKey, Paging, SortValue};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;

/// Client-chosen id of a live query, unique per active watch on a connection
pub type WatchToken = u64;

// ============================================================================
// Trait sub-queries
// ============================================================================

/// Comparison operator for field predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldOperator {
    /// field == value
    Equal,
    /// field > value
    Gt,
    /// field >= value
    Gte,
    /// field < value
    Lt,
    /// field <= value
    Lte,
}

impl FieldOperator {
    /// Check whether `field.cmp(value)` satisfies the operator
    pub fn accepts(&self, field_vs_value: CmpOrdering) -> bool {
        match self {
            FieldOperator::Equal => field_vs_value == CmpOrdering::Equal,
            FieldOperator::Gt => field_vs_value == CmpOrdering::Greater,
            FieldOperator::Gte => field_vs_value != CmpOrdering::Less,
            FieldOperator::Lt => field_vs_value == CmpOrdering::Less,
            FieldOperator::Lte => field_vs_value != CmpOrdering::Greater,
        }
    }
}

/// Typed operand of a field predicate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldValue {
    /// String, compared lexicographically
    String(String),
    /// Signed integer
    Int64(i64),
    /// Unsigned integer
    Uint64(u64),
    /// Date, compared chronologically
    Date(Timestamp),
}

impl FieldValue {
    /// Compare a payload document field against this value
    ///
    /// Returns `field.cmp(self)`, or `None` when the field is missing or of
    /// another type.
    pub fn compare_field(&self, field: &serde_json::Value) -> Option<CmpOrdering> {
        match self {
            FieldValue::String(v) => field.as_str().map(|f| f.cmp(v.as_str())),
            FieldValue::Int64(v) => field.as_i64().map(|f| f.cmp(v)),
            FieldValue::Uint64(v) => field.as_u64().map(|f| f.cmp(v)),
            FieldValue::Date(v) => serde_json::from_value::<Timestamp>(field.clone())
                .ok()
                .map(|f| f.cmp(v)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int64(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Uint64(v)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(v: Timestamp) -> Self {
        FieldValue::Date(v)
    }
}

/// Reference lookup: entities/traits pointing at `entity_id` (and `trait_id`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferencePredicate {
    /// Referenced entity
    pub entity_id: String,
    /// Referenced trait; None matches references to any trait of the entity
    pub trait_id: Option<String>,
}

/// Predicate over one trait's fields
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraitQuery {
    /// Full-text match over the trait's string fields
    Match(String),
    /// Typed field comparison
    Field {
        /// Top-level field name
        field: String,
        /// Operand
        value: FieldValue,
        /// Operator
        operator: FieldOperator,
    },
    /// Field holding a reference to the given entity/trait
    Reference {
        /// Top-level field name
        field: String,
        /// Reference target
        reference: ReferencePredicate,
    },
}

impl TraitQuery {
    fn validate(&self) -> Result<()> {
        match self {
            TraitQuery::Match(text) if text.trim().is_empty() => {
                Err(Error::invalid_query("trait match query is empty"))
            }
            TraitQuery::Field { field, .. } | TraitQuery::Reference { field, .. }
                if field.is_empty() =>
            {
                Err(Error::invalid_query("trait query field name is empty"))
            }
            TraitQuery::Reference { reference, .. } if reference.entity_id.is_empty() => {
                Err(Error::invalid_query("reference predicate has no entity id"))
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Predicate
// ============================================================================

/// Entity-level predicate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Predicate {
    /// Full-text match over all traits
    Match(String),
    /// Entities with a trait of this type, optionally matching a sub-query
    Trait {
        /// Canonical trait type name
        trait_name: String,
        /// Sub-query over the trait's fields
        query: Option<TraitQuery>,
    },
    /// Entities with one of these ids
    Ids(Vec<String>),
    /// Entities with a trait field referencing the target
    Reference(ReferencePredicate),
    /// Entities touched by one of these operations
    Operations(Vec<u64>),
    /// Every entity
    All,
    /// Matches nothing on success, fails the query otherwise
    Test {
        /// Whether the query succeeds
        success: bool,
    },
}

impl Predicate {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Predicate::Match(_) => "match",
            Predicate::Trait { .. } => "trait",
            Predicate::Ids(_) => "ids",
            Predicate::Reference(_) => "reference",
            Predicate::Operations(_) => "operations",
            Predicate::All => "all",
            Predicate::Test { .. } => "test",
        }
    }

    /// Check whether results of this predicate carry a relevance score
    pub fn is_text_match(&self) -> bool {
        matches!(
            self,
            Predicate::Match(_)
                | Predicate::Trait {
                    query: Some(TraitQuery::Match(_)),
                    ..
                }
        )
    }

    /// Default sort order when the query names none
    ///
    /// Text matches sort by descending relevance; everything else by
    /// descending operation id (most recently changed first).
    pub fn default_ordering(&self) -> Ordering {
        if self.is_text_match() {
            Ordering::score(false)
        } else {
            Ordering::operation_id(false)
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Predicate::Match(text) if text.trim().is_empty() => {
                Err(Error::invalid_query("match query is empty"))
            }
            Predicate::Trait { trait_name, .. } if trait_name.is_empty() => {
                Err(Error::invalid_query("trait predicate has no type name"))
            }
            Predicate::Trait {
                query: Some(query), ..
            } => query.validate(),
            Predicate::Ids(ids) if ids.is_empty() => {
                Err(Error::invalid_query("ids predicate has no ids"))
            }
            Predicate::Reference(reference) if reference.entity_id.is_empty() => {
                Err(Error::invalid_query("reference predicate has no entity id"))
            }
            Predicate::Operations(ops) if ops.is_empty() => {
                Err(Error::invalid_query("operations predicate has no operation ids"))
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// EntityQuery
// ============================================================================

/// Query over the entity store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityQuery {
    /// The single predicate
    pub predicate: Predicate,
    /// Page request
    pub paging: Paging,
    /// Sort order; None = engine default for the predicate
    pub ordering: Option<Ordering>,
    /// Return ordering values and sources only, no entity bodies
    pub summary: bool,
    /// Set for live queries
    pub watch_token: Option<WatchToken>,
    /// Hash of results the caller already holds; unchanged results come back as a summary
    pub result_hash: Option<u64>,
    /// Include deleted entities
    pub include_deleted: bool,
}

impl EntityQuery {
    /// Query with default paging and ordering
    pub fn new(predicate: Predicate) -> Self {
        EntityQuery {
            predicate,
            paging: Paging::default(),
            ordering: None,
            summary: false,
            watch_token: None,
            result_hash: None,
            include_deleted: false,
        }
    }

    /// Sort order in effect (explicit or predicate default)
    pub fn effective_ordering(&self) -> Ordering {
        self.ordering
            .clone()
            .unwrap_or_else(|| self.predicate.default_ordering())
    }

    /// Check the query's internal consistency
    ///
    /// # Errors
    ///
    /// - `InvalidQuery` for empty predicate operands, or field ordering
    ///   without a trait predicate
    /// - `InvalidOrdering` for paging cursors of the wrong variant for the
    ///   ordering, or of different variants from each other
    pub fn validate(&self) -> Result<()> {
        self.predicate.validate()?;

        let ordering = self.effective_ordering();
        if ordering.key == OrderingKey::Score && !self.predicate.is_text_match() {
            return Err(Error::invalid_ordering(
                "score ordering requires a match predicate",
            ));
        }
        if let OrderingKey::Field(name) = &ordering.key {
            if name.is_empty() {
                return Err(Error::invalid_query("ordering field name is empty"));
            }
            if !matches!(self.predicate, Predicate::Trait { .. }) {
                return Err(Error::invalid_query(
                    "field ordering requires a trait predicate",
                ));
            }
        }

        let cursors = [
            self.paging.after_ordering_value.as_ref(),
            self.paging.before_ordering_value.as_ref(),
        ];
        let mut bounded = cursors.into_iter().flatten().filter(|c| !c.is_sentinel());
        if let Some(first) = bounded.next() {
            let expected_ok = match (&ordering.key, &first.value) {
                (OrderingKey::Score, SortValue::Float(_)) => true,
                (OrderingKey::OperationId, SortValue::Uint64(_)) => true,
                (OrderingKey::Field(_), _) => true,
                _ => false,
            };
            if !expected_ok {
                return Err(Error::invalid_ordering(format!(
                    "paging cursor {:?} does not match ordering {:?}",
                    first.value, ordering.key
                )));
            }
            for other in bounded {
                first.compare(other, ordering.ascending)?;
            }
        }
        Ok(())
    }

    /// Same query, pointed at the next page after `paging`
    pub fn with_paging(&self, paging: Paging) -> Self {
        EntityQuery {
            paging,
            ..self.clone()
        }
    }
}
