//! Result page content hash
//!
//! xxh3-64 over everything a client can observe in a page: per result the
//! entity id, tombstone flag, source and ordering value, and per trait its
//! id, type tag, payload bytes, modification date and last operation id.
//! Two evaluations of a query over unchanged data hash equal; any visible
//! change to the page changes the hash.

use tessera_core::{Entity, OrderingValue, ResultSource, SortValue};
use xxhash_rust::xxh3::Xxh3;

/// Incremental page hasher
pub(crate) struct PageHasher {
    inner: Xxh3,
}

impl PageHasher {
    pub fn new() -> Self {
        PageHasher { inner: Xxh3::new() }
    }

    pub fn add(&mut self, entity: &Entity, source: ResultSource, ordering: &OrderingValue) {
        self.str(&entity.id);
        self.inner.update(&[entity.deleted as u8, source_byte(source)]);
        self.ordering(ordering);
        self.u64(entity.traits.len() as u64);
        for t in &entity.traits {
            self.str(&t.id);
            self.str(t.payload.type_tag());
            self.u64(t.payload.bytes().len() as u64);
            self.inner.update(t.payload.bytes());
            self.inner.update(&t.modification_date.seconds().to_le_bytes());
            self.inner.update(&t.modification_date.nanos().to_le_bytes());
            self.u64(t.last_operation_id.unwrap_or(0));
        }
    }

    pub fn finish(self) -> u64 {
        self.inner.digest()
    }

    /// Length-prefixed so adjacent strings cannot run together
    fn str(&mut self, s: &str) {
        self.u64(s.len() as u64);
        self.inner.update(s.as_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.inner.update(&v.to_le_bytes());
    }

    fn ordering(&mut self, ordering: &OrderingValue) {
        match &ordering.value {
            SortValue::Float(f) => {
                self.inner.update(&[0]);
                self.u64(f.to_bits());
            }
            SortValue::Uint64(v) => {
                self.inner.update(&[1]);
                self.u64(*v);
            }
            SortValue::Date(ts) => {
                self.inner.update(&[2]);
                self.inner.update(&ts.seconds().to_le_bytes());
                self.inner.update(&ts.nanos().to_le_bytes());
            }
            SortValue::Min => self.inner.update(&[3]),
            SortValue::Max => self.inner.update(&[4]),
            SortValue::String(s) => {
                self.inner.update(&[5]);
                self.str(s);
            }
            SortValue::Absent => self.inner.update(&[6]),
        }
        self.u64(ordering.operation_id);
    }
}

fn source_byte(source: ResultSource) -> u8 {
    match source {
        ResultSource::Unknown => 0,
        ResultSource::Pending => 1,
        ResultSource::Chain => 2,
    }
}
