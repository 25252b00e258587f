//! Tokenizer for match predicates
//!
//! Trait documents hold prose and identifiers side by side: titles, dotted
//! type names, generated ids, camelCase enum values. Terms are cut so that
//! each of these matches by its parts:
//!
//! - any non-alphanumeric character ends a term (`myapp.Note` → `myapp`, `note`)
//! - a lowercase-to-uppercase step ends a term (`dueDate` → `due`, `date`)
//! - letters and digits stay together (`et42` stays one term)
//! - terms are lowercased; terms under 2 characters are dropped
//!
//! Queries and trait documents go through the same tokenizer, so a query
//! term matches a document term exactly.

const MIN_TERM_CHARS: usize = 2;

/// Tokenize text into searchable terms
///
/// # Example
///
/// ```
/// use tessera_search::tokenizer::tokenize;
///
/// let tokens = tokenize("Buy milk, eggs & bread!");
/// assert_eq!(tokens, vec!["buy", "milk", "eggs", "bread"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut term = String::new();
    let mut after_lowercase = false;
    for c in text.chars() {
        if !c.is_alphanumeric() {
            end_term(&mut term, &mut terms);
            after_lowercase = false;
            continue;
        }
        if after_lowercase && c.is_uppercase() {
            end_term(&mut term, &mut terms);
        }
        after_lowercase = c.is_lowercase();
        term.extend(c.to_lowercase());
    }
    end_term(&mut term, &mut terms);
    terms
}

fn end_term(term: &mut String, terms: &mut Vec<String>) {
    if term.chars().count() >= MIN_TERM_CHARS {
        terms.push(std::mem::take(term));
    } else {
        term.clear();
    }
}

/// Tokenize and deduplicate, keeping first-seen order
///
/// # Example
///
/// ```
/// use tessera_search::tokenizer::tokenize_unique;
///
/// let tokens = tokenize_unique("note NOTE notes");
/// assert_eq!(tokens, vec!["note", "notes"]);
/// ```
pub fn tokenize_unique(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_basic() {
        assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
    }

    #[test]
    fn test_tokenize_filters_short() {
        assert_eq!(tokenize("I am a note"), vec!["am", "note"]);
    }

    #[test]
    fn test_tokenize_counts_chars_not_bytes() {
        // "é" is one character (two bytes) and is dropped
        assert_eq!(tokenize("é café"), vec!["café"]);
    }

    #[test]
    fn test_identifiers_split_into_parts() {
        assert_eq!(tokenize("myapp.Note"), vec!["myapp", "note"]);
        assert_eq!(tokenize("dueDate"), vec!["due", "date"]);
        assert_eq!(tokenize("HTTPServer"), vec!["httpserver"]);
        assert_eq!(tokenize("ref:et42/tr7"), vec!["ref", "et42", "tr7"]);
    }

    #[test]
    fn test_query_and_document_agree() {
        let document = tokenize("shoppingList: buy oat milk");
        for term in tokenize("Shopping LIST") {
            assert!(document.contains(&term), "missing {}", term);
        }
    }

    #[test]
    fn test_tokenize_empty_and_punctuation() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("...---...").is_empty());
    }

    #[test]
    fn test_tokenize_unique_preserves_order() {
        assert_eq!(
            tokenize_unique("apple banana apple cherry"),
            vec!["apple", "banana", "cherry"]
        );
    }
}
