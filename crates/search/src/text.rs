//! Text extraction from trait documents
//!
//! Trait payloads are projected into JSON documents by their codec. Match
//! predicates search every string leaf of those documents; numbers, keys
//! and booleans are not text.

use serde_json::Value;

/// Concatenate every string leaf of a document, separated by spaces
pub fn document_text(document: &Value) -> String {
    let mut out = String::new();
    collect(document, &mut out);
    out
}

fn collect(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(s);
        }
        Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect(v, out)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
