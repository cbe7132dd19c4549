//! Multi-item reads: `Query` and `Scan`.

use fluentdb_model::input::{QueryInput, ScanInput};
use fluentdb_model::types::{Key, ReturnConsumedCapacity, Select};

use super::{BundleBuilder, Compile, HasConsistentRead};
use crate::error::{ClientError, ClientResult};
use crate::expression::{Condition, ExpressionKind};
use crate::paginate::PageOptions;

/// Read items sharing a partition key, following continuation tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    index: Option<String>,
    key_condition: Condition,
    filter: Option<Condition>,
    projection: Vec<String>,
    scan_index_forward: Option<bool>,
    select: Option<Select>,
    consistent_read: Option<bool>,
    return_consumed_capacity: Option<ReturnConsumedCapacity>,
    start_key: Key,
    paging: PageOptions,
}

impl Query {
    /// Query `table` for items matching `key_condition`.
    pub fn new(table: impl Into<String>, key_condition: Condition) -> Self {
        Self {
            table: table.into(),
            index: None,
            key_condition,
            filter: None,
            projection: Vec::new(),
            scan_index_forward: None,
            select: None,
            consistent_read: None,
            return_consumed_capacity: None,
            start_key: Key::new(),
            paging: PageOptions::default(),
        }
    }

    /// Query a secondary index instead of the table.
    #[must_use]
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Drop items not matching `filter` after they are read. Repeated calls
    /// are combined with `AND`.
    #[must_use]
    pub fn filter(mut self, filter: Condition) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    /// Only return these attribute paths.
    #[must_use]
    pub fn project<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Return items in descending sort key order.
    #[must_use]
    pub fn descending(mut self) -> Self {
        self.scan_index_forward = Some(false);
        self
    }

    /// Which attributes to return.
    #[must_use]
    pub fn select(mut self, select: Select) -> Self {
        self.select = Some(select);
        self
    }

    /// Report consumed capacity.
    #[must_use]
    pub fn return_consumed_capacity(mut self, level: ReturnConsumedCapacity) -> Self {
        self.return_consumed_capacity = Some(level);
        self
    }

    /// Stop once `limit` items have been collected.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.paging.limit = Some(limit);
        self
    }

    /// Items evaluated per request.
    #[must_use]
    pub fn page_size(mut self, size: i32) -> Self {
        self.paging.page_size = Some(size);
        self
    }

    /// Resume from a continuation key returned by an earlier read.
    #[must_use]
    pub fn start_from(mut self, key: Key) -> Self {
        self.start_key = key;
        self
    }

    /// Fetch a single page and hand its continuation key back.
    #[must_use]
    pub fn no_recursion(mut self) -> Self {
        self.paging.recursive = false;
        self
    }

    pub(crate) fn page_options(&self) -> &PageOptions {
        &self.paging
    }
}

impl HasConsistentRead for Query {
    fn consistent_read_slot(&mut self) -> &mut Option<bool> {
        &mut self.consistent_read
    }
}

impl Compile for Query {
    type Input = QueryInput;

    /// The first page request. `Limit` is left to the paginator.
    fn compile(&self) -> ClientResult<QueryInput> {
        let mut bundle = BundleBuilder::default()
            .condition(ExpressionKind::KeyCondition, Some(&self.key_condition))?
            .condition(ExpressionKind::Filter, self.filter.as_ref())?
            .projection(&self.projection)?
            .finish();
        let key_condition_expression = bundle.take(ExpressionKind::KeyCondition);
        if key_condition_expression.is_none() {
            return Err(ClientError::Validation(
                "query has no key condition".to_owned(),
            ));
        }
        Ok(QueryInput {
            table_name: self.table.clone(),
            index_name: self.index.clone(),
            key_condition_expression,
            filter_expression: bundle.take(ExpressionKind::Filter),
            projection_expression: bundle.take(ExpressionKind::Projection),
            expression_attribute_names: bundle.names,
            expression_attribute_values: bundle.values,
            scan_index_forward: self.scan_index_forward,
            limit: None,
            exclusive_start_key: self.start_key.clone(),
            select: self.select,
            consistent_read: self.consistent_read,
            return_consumed_capacity: self.return_consumed_capacity,
        })
    }
}

/// Read every item of a table or index, optionally in parallel segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    table: String,
    index: Option<String>,
    filter: Option<Condition>,
    projection: Vec<String>,
    select: Option<Select>,
    consistent_read: Option<bool>,
    return_consumed_capacity: Option<ReturnConsumedCapacity>,
    start_key: Key,
    paging: PageOptions,
}

impl Scan {
    /// Scan `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            index: None,
            filter: None,
            projection: Vec::new(),
            select: None,
            consistent_read: None,
            return_consumed_capacity: None,
            start_key: Key::new(),
            paging: PageOptions::default(),
        }
    }

    /// Scan a secondary index instead of the table.
    #[must_use]
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Drop items not matching `filter`. Repeated calls are combined with
    /// `AND`.
    #[must_use]
    pub fn filter(mut self, filter: Condition) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    /// Only return these attribute paths.
    #[must_use]
    pub fn project<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Which attributes to return.
    #[must_use]
    pub fn select(mut self, select: Select) -> Self {
        self.select = Some(select);
        self
    }

    /// Report consumed capacity.
    #[must_use]
    pub fn return_consumed_capacity(mut self, level: ReturnConsumedCapacity) -> Self {
        self.return_consumed_capacity = Some(level);
        self
    }

    /// Stop once `limit` items have been collected across all segments.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.paging.limit = Some(limit);
        self
    }

    /// Items evaluated per request.
    #[must_use]
    pub fn page_size(mut self, size: i32) -> Self {
        self.paging.page_size = Some(size);
        self
    }

    /// Number of parallel segments.
    #[must_use]
    pub fn segments(mut self, segments: u32) -> Self {
        self.paging.segments = Some(segments);
        self
    }

    /// Resume a single-segment scan from a continuation key.
    #[must_use]
    pub fn start_from(mut self, key: Key) -> Self {
        self.start_key = key;
        self
    }

    /// Fetch a single page per segment and hand continuation keys back.
    #[must_use]
    pub fn no_recursion(mut self) -> Self {
        self.paging.recursive = false;
        self
    }

    pub(crate) fn page_options(&self) -> &PageOptions {
        &self.paging
    }
}

impl HasConsistentRead for Scan {
    fn consistent_read_slot(&mut self) -> &mut Option<bool> {
        &mut self.consistent_read
    }
}

impl Compile for Scan {
    type Input = ScanInput;

    /// The request shared by every segment. `Limit` and the segment fields
    /// are left to the paginator.
    fn compile(&self) -> ClientResult<ScanInput> {
        let mut bundle = BundleBuilder::default()
            .condition(ExpressionKind::Filter, self.filter.as_ref())?
            .projection(&self.projection)?
            .finish();
        Ok(ScanInput {
            table_name: self.table.clone(),
            index_name: self.index.clone(),
            filter_expression: bundle.take(ExpressionKind::Filter),
            projection_expression: bundle.take(ExpressionKind::Projection),
            expression_attribute_names: bundle.names,
            expression_attribute_values: bundle.values,
            limit: None,
            exclusive_start_key: self.start_key.clone(),
            segment: None,
            total_segments: None,
            select: self.select,
            consistent_read: self.consistent_read,
            return_consumed_capacity: self.return_consumed_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::condition::{and, begins_with, equals, greater_than};

    #[test]
    fn test_should_merge_key_condition_and_filter_placeholders() {
        let input = Query::new("orders", equals("pk", "u1"))
            .filter(equals("pk", "u1"))
            .project(["total"])
            .descending()
            .compile()
            .unwrap();
        assert_eq!(input.key_condition_expression.as_deref(), Some("#n0=:v0"));
        assert_eq!(input.filter_expression.as_deref(), Some("#n0=:v0"));
        assert_eq!(input.projection_expression.as_deref(), Some("#n1"));
        assert_eq!(input.expression_attribute_names.len(), 2);
        assert_eq!(input.expression_attribute_values.len(), 1);
        assert_eq!(input.scan_index_forward, Some(false));
        assert!(input.limit.is_none());
    }

    #[test]
    fn test_should_compile_sort_key_condition() {
        let input = Query::new(
            "orders",
            and([equals("pk", "u1"), begins_with("sk", "2024-")]),
        )
        .compile()
        .unwrap();
        assert_eq!(
            input.key_condition_expression.as_deref(),
            Some("#n0=:v0 AND begins_with(#n1, :v1)")
        );
    }

    #[test]
    fn test_should_reject_empty_key_condition() {
        let err = Query::new("orders", and([])).compile().unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn test_should_record_paging_options() {
        let scan = Scan::new("events")
            .filter(greater_than("size", 3))
            .limit(10)
            .segments(4)
            .no_recursion();
        let options = scan.page_options();
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.segments, Some(4));
        assert!(!options.recursive);
        let input = scan.compile().unwrap();
        assert_eq!(input.filter_expression.as_deref(), Some("#n0>:v0"));
        assert!(input.segment.is_none());
    }

    #[test]
    fn test_should_compile_bare_scan_without_expressions() {
        let input = Scan::new("events").compile().unwrap();
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json, serde_json::json!({"TableName": "events"}));
    }
}
