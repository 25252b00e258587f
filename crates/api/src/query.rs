//! Query builders
//!
//! [`QueryBuilder`] enforces the one-predicate rule when the query is
//! built: calling zero or two predicate constructors is `InvalidQuery`
//! before anything reaches an engine. [`TraitQueryBuilder`] does the same
//! for trait sub-queries.
//!
//! ```
//! use tessera_api::{QueryBuilder, TraitQueryBuilder};
//!
//! let sub = TraitQueryBuilder::new().refers_to("author", "et42", None).build().unwrap();
//! let query = QueryBuilder::new()
//!     .with_trait("myapp.Note", Some(sub))
//!     .count(2)
//!     .order_by_field("created", true)
//!     .build()
//!     .unwrap();
//! assert_eq!(query.paging.count, 2);
//! ```

use tessera_core::{
    EntityQuery, Error, FieldOperator, FieldValue, Ordering, OrderingValue, Paging, Predicate,
    ReferencePredicate, Result, TraitQuery, WatchToken,
};

// ============================================================================
// QueryBuilder
// ============================================================================

/// Fluent builder of an [`EntityQuery`]
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    predicates: Vec<Predicate>,
    paging: Paging,
    ordering: Option<Ordering>,
    summary: bool,
    watch_token: Option<WatchToken>,
    result_hash: Option<u64>,
    include_deleted: bool,
}

impl QueryBuilder {
    /// Empty builder; exactly one predicate constructor must follow
    pub fn new() -> Self {
        Self::default()
    }

    fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Entities with a trait of `type_name`, optionally narrowed by a sub-query
    pub fn with_trait(self, type_name: impl Into<String>, query: Option<TraitQuery>) -> Self {
        self.predicate(Predicate::Trait {
            trait_name: type_name.into(),
            query,
        })
    }

    /// Full-text match over all traits
    pub fn matching(self, text: impl Into<String>) -> Self {
        self.predicate(Predicate::Match(text.into()))
    }

    /// The entity with this id
    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.predicate(Predicate::Ids(vec![id.into()]))
    }

    /// Entities with any of these ids
    pub fn with_ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.predicate(Predicate::Ids(ids.into_iter().map(Into::into).collect()))
    }

    /// Entities holding a reference to `entity_id` (and `trait_id`, if given)
    pub fn referring_to(self, entity_id: impl Into<String>, trait_id: Option<&str>) -> Self {
        self.predicate(Predicate::Reference(ReferencePredicate {
            entity_id: entity_id.into(),
            trait_id: trait_id.map(str::to_string),
        }))
    }

    /// Entities touched by any of these operations
    pub fn with_operations(self, operation_ids: Vec<u64>) -> Self {
        self.predicate(Predicate::Operations(operation_ids))
    }

    /// Every entity
    pub fn all(self) -> Self {
        self.predicate(Predicate::All)
    }

    /// Test predicate: matches nothing, fails the query unless `success`
    pub fn test(self, success: bool) -> Self {
        self.predicate(Predicate::Test { success })
    }

    /// Page size (0 = engine default)
    pub fn count(mut self, n: u32) -> Self {
        self.paging.count = n;
        self
    }

    /// Only results strictly after `value` in sort order
    pub fn after(mut self, value: OrderingValue) -> Self {
        self.paging.after_ordering_value = Some(value);
        self
    }

    /// Only results strictly before `value` in sort order
    pub fn before(mut self, value: OrderingValue) -> Self {
        self.paging.before_ordering_value = Some(value);
        self
    }

    /// Replace the whole page request, e.g. with a previous `next_page`
    pub fn paging(mut self, paging: Paging) -> Self {
        self.paging = paging;
        self
    }

    /// Sort by a field of the matched trait
    pub fn order_by_field(mut self, name: impl Into<String>, ascending: bool) -> Self {
        self.ordering = Some(Ordering::field(name, ascending));
        self
    }

    /// Sort by relevance (match predicates only)
    pub fn order_by_score(mut self, ascending: bool) -> Self {
        self.ordering = Some(Ordering::score(ascending));
        self
    }

    /// Sort by the entities' last operation id
    pub fn order_by_operation_id(mut self, ascending: bool) -> Self {
        self.ordering = Some(Ordering::operation_id(ascending));
        self
    }

    /// Return ordering values only, no entity bodies
    pub fn summary(mut self) -> Self {
        self.summary = true;
        self
    }

    /// Mark as a live query under `token`
    pub fn watch(mut self, token: WatchToken) -> Self {
        self.watch_token = Some(token);
        self
    }

    /// Hash of results already held; an unchanged page comes back as a summary
    pub fn result_hash(mut self, hash: u64) -> Self {
        self.result_hash = Some(hash);
        self
    }

    /// Include deleted entities
    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Finish the query
    ///
    /// # Errors
    ///
    /// `InvalidQuery` unless exactly one predicate was set, and any error of
    /// [`EntityQuery::validate`].
    pub fn build(mut self) -> Result<EntityQuery> {
        if self.predicates.len() != 1 {
            return Err(Error::invalid_query(format!(
                "query needs exactly one predicate, got {}",
                self.predicates.len()
            )));
        }
        let predicate = self.predicates.remove(0);
        let query = EntityQuery {
            predicate,
            paging: self.paging,
            ordering: self.ordering,
            summary: self.summary,
            watch_token: self.watch_token,
            result_hash: self.result_hash,
            include_deleted: self.include_deleted,
        };
        query.validate()?;
        Ok(query)
    }
}

// ============================================================================
// TraitQueryBuilder
// ============================================================================

/// Builder of a [`TraitQuery`]
///
/// Field comparisons take a [`FieldValue`], so the caller always states
/// whether a value is a string, a signed or unsigned integer, or a date.
#[derive(Debug, Clone, Default)]
pub struct TraitQueryBuilder {
    queries: Vec<TraitQuery>,
}

impl TraitQueryBuilder {
    /// Empty builder; exactly one constructor must follow
    pub fn new() -> Self {
        Self::default()
    }

    /// Field `field` references `entity_id` (and `trait_id`, if given)
    pub fn refers_to(
        mut self,
        field: impl Into<String>,
        entity_id: impl Into<String>,
        trait_id: Option<&str>,
    ) -> Self {
        self.queries.push(TraitQuery::Reference {
            field: field.into(),
            reference: ReferencePredicate {
                entity_id: entity_id.into(),
                trait_id: trait_id.map(str::to_string),
            },
        });
        self
    }

    /// Full-text match over the trait's string fields
    pub fn matching(mut self, text: impl Into<String>) -> Self {
        self.queries.push(TraitQuery::Match(text.into()));
        self
    }

    /// Compare field `field` against `value`
    pub fn field(
        mut self,
        field: impl Into<String>,
        value: impl Into<FieldValue>,
        operator: FieldOperator,
    ) -> Self {
        self.queries.push(TraitQuery::Field {
            field: field.into(),
            value: value.into(),
            operator,
        });
        self
    }

    /// Shorthand for an `Equal` comparison
    pub fn equals(self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.field(field, value, FieldOperator::Equal)
    }

    /// Finish the sub-query
    pub fn build(mut self) -> Result<TraitQuery> {
        match self.queries.len() {
            1 => Ok(self.queries.remove(0)),
            n => Err(Error::invalid_query(format!(
                "trait query needs exactly one condition, got {}",
                n
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{OrderingKey, Timestamp};

    #[test]
    fn test_exactly_one_predicate() {
        assert!(matches!(
            QueryBuilder::new().count(2).build(),
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            QueryBuilder::new().matching("milk").with_id("e1").build(),
            Err(Error::InvalidQuery(_))
        ));
        assert!(QueryBuilder::new().with_id("e1").build().is_ok());
    }

    #[test]
    fn test_with_trait_count_and_order() {
        let query = QueryBuilder::new()
            .with_trait("myapp.Note", None)
            .count(2)
            .order_by_field("title", true)
            .build()
            .unwrap();
        assert_eq!(query.paging.count, 2);
        assert_eq!(
            query.ordering.unwrap().key,
            OrderingKey::Field("title".into())
        );
    }

    #[test]
    fn test_contract_violations_raised_at_build() {
        // Field ordering needs a trait predicate
        assert!(QueryBuilder::new()
            .all()
            .order_by_field("title", true)
            .build()
            .is_err());
        // Score ordering needs a text match
        assert!(matches!(
            QueryBuilder::new().with_id("e1").order_by_score(false).build(),
            Err(Error::InvalidOrdering(_))
        ));
        // Cursors of different variants
        assert!(matches!(
            QueryBuilder::new()
                .with_trait("myapp.Note", None)
                .order_by_field("n", true)
                .after(OrderingValue::uint64(1, 1))
                .before(OrderingValue::float(9.0, 1))
                .build(),
            Err(Error::InvalidOrdering(_))
        ));
    }

    #[test]
    fn test_live_flags() {
        let query = QueryBuilder::new()
            .all()
            .watch(42)
            .result_hash(7)
            .summary()
            .include_deleted()
            .build()
            .unwrap();
        assert_eq!(query.watch_token, Some(42));
        assert_eq!(query.result_hash, Some(7));
        assert!(query.summary && query.include_deleted);
    }

    #[test]
    fn test_trait_query_builder() {
        assert!(TraitQueryBuilder::new().build().is_err());
        assert!(TraitQueryBuilder::new()
            .matching("a")
            .equals("b", 1u64)
            .build()
            .is_err());

        let reference = TraitQueryBuilder::new()
            .refers_to("author", "et1", Some("tr1"))
            .build()
            .unwrap();
        assert!(matches!(reference, TraitQuery::Reference { .. }));

        let dated = TraitQueryBuilder::new()
            .field("due", Timestamp::from_millis(1_000), FieldOperator::Lt)
            .build()
            .unwrap();
        match dated {
            TraitQuery::Field { value, .. } => assert!(matches!(value, FieldValue::Date(_))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_next_page_round_trip() {
        let first = QueryBuilder::new().all().count(2).build().unwrap();
        let next = Paging::new(2).after(OrderingValue::uint64(5, 5));
        let second = QueryBuilder::new().all().paging(next.clone()).build().unwrap();
        assert_eq!(second, first.with_paging(next));
    }
}
