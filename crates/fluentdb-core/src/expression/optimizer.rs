//! Placeholder deduplication and compaction.
//!
//! Runs in two passes. Dedup collapses placeholders that stand for the same
//! attribute name, or for structurally equal values, onto the first one seen.
//! Compaction then renames the survivors to `#n0, #n1, ..` and
//! `:v0, :v1, ..` in first-occurrence order. Compaction has to come second:
//! renaming first would hide duplicates from the dedup pass.

use std::collections::HashMap;

use fluentdb_model::AttributeValue;
use fluentdb_model::types::{ExpressionAttributeNames, ExpressionAttributeValues};

use super::compiled::CompiledExpression;

/// Deduplicate and compact the placeholders of a single expression.
#[must_use]
pub fn optimize(expr: CompiledExpression) -> CompiledExpression {
    let (mut texts, names, values) = optimize_texts(vec![expr.text], expr.names, expr.values);
    CompiledExpression {
        text: texts.pop().unwrap_or_default(),
        names,
        values,
    }
}

/// Optimize several expression texts that share one pair of placeholder maps.
///
/// Entries no text refers to are dropped.
pub(crate) fn optimize_texts(
    texts: Vec<String>,
    names: ExpressionAttributeNames,
    values: ExpressionAttributeValues,
) -> (
    Vec<String>,
    ExpressionAttributeNames,
    ExpressionAttributeValues,
) {
    let (texts, names, values) = dedup(texts, names, values);
    compact(texts, names, values)
}

fn dedup(
    texts: Vec<String>,
    names: ExpressionAttributeNames,
    values: ExpressionAttributeValues,
) -> (
    Vec<String>,
    ExpressionAttributeNames,
    ExpressionAttributeValues,
) {
    let mut renames: HashMap<String, String> = HashMap::new();
    {
        let mut first_name: HashMap<&str, &str> = HashMap::new();
        let mut first_value: HashMap<&AttributeValue, &str> = HashMap::new();
        for text in &texts {
            for token in tokens(text) {
                if renames.contains_key(token) {
                    continue;
                }
                let canonical = if let Some(name) = names.get(token) {
                    *first_name.entry(name.as_str()).or_insert(token)
                } else if let Some(value) = values.get(token) {
                    *first_value.entry(value).or_insert(token)
                } else {
                    continue;
                };
                renames.insert(token.to_owned(), canonical.to_owned());
            }
        }
    }

    let texts = texts.iter().map(|t| rewrite(t, &renames)).collect();
    let is_canonical = |k: &String| renames.get(k) == Some(k);
    let names = names.into_iter().filter(|(k, _)| is_canonical(k)).collect();
    let values = values.into_iter().filter(|(k, _)| is_canonical(k)).collect();
    (texts, names, values)
}

fn compact(
    texts: Vec<String>,
    names: ExpressionAttributeNames,
    values: ExpressionAttributeValues,
) -> (
    Vec<String>,
    ExpressionAttributeNames,
    ExpressionAttributeValues,
) {
    let mut renames: HashMap<String, String> = HashMap::new();
    let (mut next_name, mut next_value) = (0usize, 0usize);
    for text in &texts {
        for token in tokens(text) {
            if renames.contains_key(token) {
                continue;
            }
            if names.contains_key(token) {
                renames.insert(token.to_owned(), format!("#n{next_name}"));
                next_name += 1;
            } else if values.contains_key(token) {
                renames.insert(token.to_owned(), format!(":v{next_value}"));
                next_value += 1;
            }
        }
    }

    let texts = texts.iter().map(|t| rewrite(t, &renames)).collect();
    let names = names
        .into_iter()
        .filter_map(|(k, v)| renames.get(&k).map(|nk| (nk.clone(), v)))
        .collect();
    let values = values
        .into_iter()
        .filter_map(|(k, v)| renames.get(&k).map(|nk| (nk.clone(), v)))
        .collect();
    (texts, names, values)
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Split `text` into literal runs (`Err`) and whole placeholder tokens (`Ok`).
fn segments(text: &str) -> Vec<Result<&str, &str>> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let (mut start, mut i) = (0, 0);
    while i < bytes.len() {
        let sigil = matches!(bytes[i], b'#' | b':');
        if sigil && bytes.get(i + 1).copied().is_some_and(is_token_byte) {
            if start < i {
                out.push(Err(&text[start..i]));
            }
            let mut end = i + 1;
            while end < bytes.len() && is_token_byte(bytes[end]) {
                end += 1;
            }
            out.push(Ok(&text[i..end]));
            start = end;
            i = end;
        } else {
            i += 1;
        }
    }
    if start < bytes.len() {
        out.push(Err(&text[start..]));
    }
    out
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    segments(text).into_iter().filter_map(Result::ok)
}

fn rewrite(text: &str, renames: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in segments(text) {
        match segment {
            Ok(token) => out.push_str(renames.get(token).map_or(token, String::as_str)),
            Err(literal) => out.push_str(literal),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(text: &str, names: &[(&str, &str)], values: &[(&str, &str)]) -> CompiledExpression {
        CompiledExpression {
            text: text.to_owned(),
            names: names
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            values: values
                .iter()
                .map(|(k, v)| ((*k).to_owned(), AttributeValue::from(*v)))
                .collect(),
        }
    }

    #[test]
    fn test_should_merge_duplicate_names_and_values() {
        let input = expr(
            "#a=:b AND #c=:d",
            &[("#a", "status"), ("#c", "status")],
            &[(":b", "on"), (":d", "on")],
        );
        let out = optimize(input);
        assert_eq!(out.text, "#n0=:v0 AND #n0=:v0");
        assert_eq!(out.names.len(), 1);
        assert_eq!(out.values.len(), 1);
        assert_eq!(out.names["#n0"], "status");
        assert_eq!(out.values[":v0"], AttributeValue::from("on"));
    }

    #[test]
    fn test_should_compact_in_first_occurrence_order() {
        let input = expr(
            "#k_c=:k_d AND #k_a=:k_b",
            &[("#k_a", "x"), ("#k_c", "y")],
            &[(":k_b", "1"), (":k_d", "2")],
        );
        let out = optimize(input);
        assert_eq!(out.text, "#n0=:v0 AND #n1=:v1");
        assert_eq!(out.names["#n0"], "y");
        assert_eq!(out.names["#n1"], "x");
    }

    #[test]
    fn test_should_be_idempotent() {
        let input = expr(
            "(#a=:b OR #c<>:d) AND size(#e[0].#a)>:f",
            &[("#a", "p"), ("#c", "q"), ("#e", "p")],
            &[(":b", "1"), (":d", "1"), (":f", "3")],
        );
        let once = optimize(input);
        let twice = optimize(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.text, "(#n0=:v0 OR #n1<>:v0) AND size(#n0[0].#n0)>:v1");
    }

    #[test]
    fn test_should_drop_unused_entries() {
        let input = expr("#a", &[("#a", "x"), ("#z", "unused")], &[(":q", "v")]);
        let out = optimize(input);
        assert_eq!(out.names.len(), 1);
        assert!(out.values.is_empty());
    }

    #[test]
    fn test_should_not_split_longer_tokens() {
        let input = expr(
            "#a=:a AND #ab=:ab",
            &[("#a", "x"), ("#ab", "y")],
            &[(":a", "1"), (":ab", "2")],
        );
        let out = optimize(input);
        assert_eq!(out.text, "#n0=:v0 AND #n1=:v1");
    }

    fn values_expr(text: &str, values: Vec<(&str, AttributeValue)>) -> CompiledExpression {
        CompiledExpression {
            text: text.to_owned(),
            names: ExpressionAttributeNames::new(),
            values: values.into_iter().map(|(k, v)| (k.to_owned(), v)).collect(),
        }
    }

    #[test]
    fn test_should_merge_maps_built_in_different_order() {
        let mut first = HashMap::new();
        first.insert("a".to_owned(), AttributeValue::from(1));
        first.insert("b".to_owned(), AttributeValue::from(2));
        let mut second = HashMap::new();
        second.insert("b".to_owned(), AttributeValue::from(2));
        second.insert("a".to_owned(), AttributeValue::from(1));
        let input = values_expr(
            ":x=:y",
            vec![(":x", AttributeValue::M(first)), (":y", AttributeValue::M(second))],
        );
        let out = optimize(input);
        assert_eq!(out.text, ":v0=:v0");
        assert_eq!(out.values.len(), 1);
    }

    #[test]
    fn test_should_merge_sets_regardless_of_element_order() {
        let input = values_expr(
            ":x=:y AND :z=:w",
            vec![
                (":x", AttributeValue::string_set(["a", "b"])),
                (":y", AttributeValue::string_set(["b", "a"])),
                (":z", AttributeValue::number_set([1, 2])),
                (":w", AttributeValue::number_set([2, 1])),
            ],
        );
        let out = optimize(input);
        assert_eq!(out.text, ":v0=:v0 AND :v1=:v1");
        assert_eq!(out.values.len(), 2);
    }

    #[test]
    fn test_should_share_placeholders_across_texts() {
        let names: ExpressionAttributeNames = [
            ("#key_a".to_owned(), "pk".to_owned()),
            ("#filter_a".to_owned(), "pk".to_owned()),
        ]
        .into();
        let values: ExpressionAttributeValues = [
            (":key_b".to_owned(), AttributeValue::from("u1")),
            (":filter_b".to_owned(), AttributeValue::from("u1")),
        ]
        .into();
        let (texts, names, values) = optimize_texts(
            vec!["#key_a=:key_b".to_owned(), "#filter_a<>:filter_b".to_owned()],
            names,
            values,
        );
        assert_eq!(texts, vec!["#n0=:v0", "#n0<>:v0"]);
        assert_eq!(names.len(), 1);
        assert_eq!(values.len(), 1);
    }
}
