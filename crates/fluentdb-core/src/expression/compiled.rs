//! Compiled expressions and the placeholder serializer that produces them.

use fluentdb_model::AttributeValue;
use fluentdb_model::types::{ExpressionAttributeNames, ExpressionAttributeValues};

use super::optimizer;
use super::path::{PathElement, parse};
use super::placeholder::PlaceholderGenerator;
use crate::error::ClientResult;

/// The kind of an expression within one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionKind {
    /// `KeyConditionExpression`.
    KeyCondition,
    /// `ConditionExpression`.
    Condition,
    /// `FilterExpression`.
    Filter,
    /// `UpdateExpression`.
    Update,
    /// `ProjectionExpression`.
    Projection,
}

impl ExpressionKind {
    /// Placeholder prefix for this kind, keeping passes collision-free when
    /// they are merged onto one request.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::KeyCondition => "key_",
            Self::Condition => "cond_",
            Self::Filter => "filter_",
            Self::Update => "upd_",
            Self::Projection => "proj_",
        }
    }
}

/// An expression string plus its placeholder maps.
///
/// Every placeholder in `text` has exactly one entry in `names` (for `#`
/// tokens) or `values` (for `:` tokens).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledExpression {
    /// The expression text.
    pub text: String,
    /// `#placeholder` to attribute name.
    pub names: ExpressionAttributeNames,
    /// `:placeholder` to attribute value.
    pub values: ExpressionAttributeValues,
}

impl CompiledExpression {
    /// Whether the expression has no text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Turns paths and values into placeholders while an expression is rendered.
#[derive(Debug)]
pub struct ExpressionSerializer {
    generator: PlaceholderGenerator,
    names: ExpressionAttributeNames,
    values: ExpressionAttributeValues,
}

impl ExpressionSerializer {
    /// Create a serializer with a fresh generator under `prefix`.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            generator: PlaceholderGenerator::new(prefix),
            names: ExpressionAttributeNames::new(),
            values: ExpressionAttributeValues::new(),
        }
    }

    /// Render `path` with one name placeholder per attribute name.
    pub fn attribute_path(&mut self, path: &str) -> ClientResult<String> {
        let mut out = String::new();
        for elem in parse(path)? {
            match elem {
                PathElement::AttributeName(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    let placeholder = format!("#{}", self.generator.next_token());
                    out.push_str(&placeholder);
                    self.names.insert(placeholder, name);
                }
                PathElement::ListIndex(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
            }
        }
        Ok(out)
    }

    /// Render `value` as a value placeholder.
    pub fn value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":{}", self.generator.next_token());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    /// Drop all state and restart the sequence.
    pub fn reset(&mut self) {
        self.generator.reset();
        self.names.clear();
        self.values.clear();
    }

    /// Pair the rendered `text` with the placeholders issued for it.
    #[must_use]
    pub fn finish(self, text: String) -> CompiledExpression {
        CompiledExpression {
            text,
            names: self.names,
            values: self.values,
        }
    }
}

/// All expressions of one request, sharing a single pair of placeholder maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionBundle {
    texts: Vec<(ExpressionKind, String)>,
    /// Shared `ExpressionAttributeNames`.
    pub names: ExpressionAttributeNames,
    /// Shared `ExpressionAttributeValues`.
    pub values: ExpressionAttributeValues,
}

impl ExpressionBundle {
    /// Add a compiled expression. Empty expressions are skipped.
    ///
    /// Each kind is expected once per request; its prefix keeps the merged
    /// placeholders distinct.
    pub fn insert(&mut self, kind: ExpressionKind, expr: CompiledExpression) {
        if expr.is_empty() {
            return;
        }
        self.names.extend(expr.names);
        self.values.extend(expr.values);
        self.texts.retain(|(k, _)| *k != kind);
        self.texts.push((kind, expr.text));
    }

    /// The text of one expression kind.
    #[must_use]
    pub fn text(&self, kind: ExpressionKind) -> Option<&str> {
        self.texts
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, text)| text.as_str())
    }

    /// Owned text of one expression kind.
    #[must_use]
    pub fn take(&mut self, kind: ExpressionKind) -> Option<String> {
        let pos = self.texts.iter().position(|(k, _)| *k == kind)?;
        Some(self.texts.remove(pos).1)
    }

    /// Deduplicate and compact placeholders across every expression at once.
    #[must_use]
    pub fn optimize(self) -> Self {
        let (kinds, texts): (Vec<_>, Vec<_>) = self.texts.into_iter().unzip();
        let (texts, names, values) = optimizer::optimize_texts(texts, self.names, self.values);
        Self {
            texts: kinds.into_iter().zip(texts).collect(),
            names,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_serialize_path_deterministically_after_reset() {
        let mut serializer = ExpressionSerializer::new("p_");
        let first = serializer.attribute_path("a.b").unwrap();
        let first_names = serializer.names.clone();
        serializer.reset();
        let second = serializer.attribute_path("a.b").unwrap();
        assert_eq!(first, "#p_a.#p_b");
        assert_eq!(first, second);
        assert_eq!(first_names, serializer.names);
    }

    #[test]
    fn test_should_keep_list_indexes_inline() {
        let mut serializer = ExpressionSerializer::new("");
        let text = serializer.attribute_path("list[2].x").unwrap();
        assert_eq!(text, "#a[2].#b");
        let expr = serializer.finish(text);
        assert_eq!(expr.names["#a"], "list");
        assert_eq!(expr.names["#b"], "x");
    }

    #[test]
    fn test_should_skip_empty_expressions_in_bundle() {
        let mut bundle = ExpressionBundle::default();
        bundle.insert(ExpressionKind::Filter, CompiledExpression::default());
        assert!(bundle.text(ExpressionKind::Filter).is_none());
        assert!(bundle.names.is_empty());
    }
}
