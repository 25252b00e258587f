//! Ordering and cursor paging
//!
//! Every query result carries an [`OrderingValue`]: a typed primary sort key
//! plus the operation id used as a deterministic tie-breaker. The same type
//! bounds a page: [`Paging`] selects results strictly after
//! `after_ordering_value` and strictly before `before_ordering_value` in the
//! query's sort order, so continuation stays consistent when data is appended
//! between page requests.
//!
//! ## Comparison
//!
//! [`OrderingValue::compare`] under a direction:
//!
//! 1. `Min` sorts lowest and `Max` highest; the direction flips the whole
//!    primary comparison, sentinels included.
//! 2. Same-variant primary values compare numerically (`Date` chronologically,
//!    `String` by bytes). Mixing `Float`/`Uint64`/`Date`/`String` is
//!    `InvalidOrdering`.
//! 3. `Absent` (a result without the ordered field) sorts after every value in
//!    either direction, but before the closing sentinel.
//! 4. Equal primary values fall back to operation id, always ascending.
//!
//! Sentinels only ever bound a page; they are never a result's own value.

use crate::error::{Error, Result};
use crate::timestamp::Timestamp;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;

// ============================================================================
// Ordering selector
// ============================================================================

/// Sort key a query orders by
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderingKey {
    /// Relevance score of a text match
    Score,
    /// Last operation id of the entity
    OperationId,
    /// Named field of the matched trait
    Field(String),
}

/// Sort key plus direction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ordering {
    /// What to sort by
    pub key: OrderingKey,
    /// Ascending (true) or descending (false)
    pub ascending: bool,
}

impl Ordering {
    /// Order by relevance score
    pub fn score(ascending: bool) -> Self {
        Ordering {
            key: OrderingKey::Score,
            ascending,
        }
    }

    /// Order by operation id
    pub fn operation_id(ascending: bool) -> Self {
        Ordering {
            key: OrderingKey::OperationId,
            ascending,
        }
    }

    /// Order by a trait field
    pub fn field(name: impl Into<String>, ascending: bool) -> Self {
        Ordering {
            key: OrderingKey::Field(name.into()),
            ascending,
        }
    }
}

// ============================================================================
// OrderingValue
// ============================================================================

/// Primary sort value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortValue {
    /// Floating point (relevance scores, numeric fields)
    Float(f64),
    /// Unsigned integer (operation ids)
    Uint64(u64),
    /// Point in time
    Date(Timestamp),
    /// Text field
    String(String),
    /// Result has no value for the ordered field
    Absent,
    /// Lower sentinel: no lower bound
    Min,
    /// Upper sentinel: no upper bound
    Max,
}

impl SortValue {
    /// Short name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            SortValue::Float(_) => "float",
            SortValue::Uint64(_) => "uint64",
            SortValue::Date(_) => "date",
            SortValue::String(_) => "string",
            SortValue::Absent => "absent",
            SortValue::Min => "min",
            SortValue::Max => "max",
        }
    }

    /// Natural (ascending) order of two primary values
    fn cmp_primary(&self, other: &SortValue) -> Result<CmpOrdering> {
        match (self, other) {
            (SortValue::Min, SortValue::Min) | (SortValue::Max, SortValue::Max) => {
                Ok(CmpOrdering::Equal)
            }
            (SortValue::Min, _) | (_, SortValue::Max) => Ok(CmpOrdering::Less),
            (_, SortValue::Min) | (SortValue::Max, _) => Ok(CmpOrdering::Greater),
            (SortValue::Float(a), SortValue::Float(b)) => Ok(a.total_cmp(b)),
            (SortValue::Uint64(a), SortValue::Uint64(b)) => Ok(a.cmp(b)),
            (SortValue::Date(a), SortValue::Date(b)) => Ok(a.cmp(b)),
            (SortValue::String(a), SortValue::String(b)) => Ok(a.cmp(b)),
            (a, b) => Err(Error::invalid_ordering(format!(
                "cannot compare {} with {}",
                a.kind(),
                b.kind()
            ))),
        }
    }

    /// Directed order of `Absent` against a non-absent value
    fn absent_against(other: &SortValue, ascending: bool) -> CmpOrdering {
        match (other, ascending) {
            (SortValue::Max, true) | (SortValue::Min, false) => CmpOrdering::Less,
            _ => CmpOrdering::Greater,
        }
    }
}

/// Typed sort key of a result, also used as a page boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderingValue {
    /// Primary value
    pub value: SortValue,
    /// Tie-breaker on equal primary values
    pub operation_id: u64,
}

impl OrderingValue {
    /// Float-keyed value
    pub fn float(value: f64, operation_id: u64) -> Self {
        OrderingValue {
            value: SortValue::Float(value),
            operation_id,
        }
    }

    /// Integer-keyed value
    pub fn uint64(value: u64, operation_id: u64) -> Self {
        OrderingValue {
            value: SortValue::Uint64(value),
            operation_id,
        }
    }

    /// Date-keyed value
    pub fn date(value: Timestamp, operation_id: u64) -> Self {
        OrderingValue {
            value: SortValue::Date(value),
            operation_id,
        }
    }

    /// String-keyed value
    pub fn string(value: impl Into<String>, operation_id: u64) -> Self {
        OrderingValue {
            value: SortValue::String(value.into()),
            operation_id,
        }
    }

    /// Value of a result without the ordered field
    pub fn absent(operation_id: u64) -> Self {
        OrderingValue {
            value: SortValue::Absent,
            operation_id,
        }
    }

    /// Lower sentinel
    pub fn min() -> Self {
        OrderingValue {
            value: SortValue::Min,
            operation_id: 0,
        }
    }

    /// Upper sentinel
    pub fn max() -> Self {
        OrderingValue {
            value: SortValue::Max,
            operation_id: 0,
        }
    }

    /// Check if this is a `Min`/`Max` sentinel
    pub fn is_sentinel(&self) -> bool {
        matches!(self.value, SortValue::Min | SortValue::Max)
    }

    /// Compare two values under a direction
    ///
    /// # Errors
    ///
    /// Returns `InvalidOrdering` when the primary values are of different
    /// non-sentinel variants.
    pub fn compare(&self, other: &OrderingValue, ascending: bool) -> Result<CmpOrdering> {
        let primary = match (&self.value, &other.value) {
            (SortValue::Absent, SortValue::Absent) => CmpOrdering::Equal,
            (SortValue::Absent, v) => SortValue::absent_against(v, ascending),
            (v, SortValue::Absent) => SortValue::absent_against(v, ascending).reverse(),
            (a, b) => {
                let primary = a.cmp_primary(b)?;
                if ascending {
                    primary
                } else {
                    primary.reverse()
                }
            }
        };
        Ok(primary.then(self.operation_id.cmp(&other.operation_id)))
    }

    /// Check that this value may be carried by a result
    pub fn validate_as_result(&self) -> Result<()> {
        if self.is_sentinel() {
            return Err(Error::invalid_ordering(format!(
                "{} sentinel cannot be a result ordering value",
                self.value.kind()
            )));
        }
        Ok(())
    }
}

/// Sort ordering values in place under a direction
///
/// # Errors
///
/// Returns `InvalidOrdering` if any two values cannot be compared; the
/// slice is left unchanged in that case.
pub fn sort_ordering_values(values: &mut [OrderingValue], ascending: bool) -> Result<()> {
    if let Some(pivot) = values.iter().find(|v| !v.is_sentinel()) {
        for v in values.iter() {
            pivot.compare(v, ascending)?;
        }
    }
    values.sort_by(|a, b| a.compare(b, ascending).unwrap_or(CmpOrdering::Equal));
    Ok(())
}

// ============================================================================
// Paging
// ============================================================================

/// Cursor-based page request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Paging {
    /// Only results strictly after this value (in sort order)
    pub after_ordering_value: Option<OrderingValue>,
    /// Only results strictly before this value (in sort order)
    pub before_ordering_value: Option<OrderingValue>,
    /// Requested page size; 0 = engine default
    pub count: u32,
}

impl Paging {
    /// First page of `count` results
    pub fn new(count: u32) -> Self {
        Paging {
            count,
            ..Default::default()
        }
    }

    /// Builder: set the lower cursor
    pub fn after(mut self, value: OrderingValue) -> Self {
        self.after_ordering_value = Some(value);
        self
    }

    /// Builder: set the upper cursor
    pub fn before(mut self, value: OrderingValue) -> Self {
        self.before_ordering_value = Some(value);
        self
    }

    /// Page size to use, given the engine's default and maximum
    pub fn effective_count(&self, default: u32, max: u32) -> u32 {
        let requested = if self.count == 0 { default } else { self.count };
        requested.min(max)
    }

    /// Check whether a result value falls inside this page's bounds
    ///
    /// # Errors
    ///
    /// Returns `InvalidOrdering` if a boundary's variant does not match the value's.
    pub fn admits(&self, value: &OrderingValue, ascending: bool) -> Result<bool> {
        if let Some(after) = &self.after_ordering_value {
            if value.compare(after, ascending)? != CmpOrdering::Greater {
                return Ok(false);
            }
        }
        if let Some(before) = &self.before_ordering_value {
            if value.compare(before, ascending)? != CmpOrdering::Less {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Encode this page request as an opaque URL-safe token
    pub fn to_token(&self) -> Result<String> {
        let bytes = rmp_serde::to_vec_named(self)?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Decode a token produced by [`Paging::to_token`]
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` if the token is not valid base64 or not a paging cursor.
    pub fn from_token(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| Error::invalid_query(format!("malformed paging token: {}", e)))?;
        rmp_serde::from_slice(&bytes)
            .map_err(|e| Error::invalid_query(format!("malformed paging token: {}", e)))
    }
}
