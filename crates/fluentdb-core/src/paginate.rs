//! Query and Scan pagination.
//!
//! A page loop submits one request at a time, following the continuation key
//! until it runs out, the caller's result limit is reached, or recursion is
//! disabled. Scans may fan out into parallel segments, each with its own
//! loop; their results are concatenated in segment order.

use async_trait::async_trait;
use fluentdb_model::DynamoDBOperation;
use fluentdb_model::input::{QueryInput, ScanInput};
use fluentdb_model::output::{QueryOutput, ScanOutput};
use fluentdb_model::types::{ConsumedCapacity, Item, Key};
use futures::future::try_join_all;
use serde::Serialize;
use tracing::debug;

use crate::batch::merge_capacity;
use crate::client::DynamoDBClient;
use crate::error::ClientResult;
use crate::retry::RetryExecutor;

/// Multiplier base for filtered Scan over-fetch.
const OVER_FETCH_BASE: i64 = 5;

/// How a Query or Scan is paged.
#[derive(Debug, Clone, PartialEq)]
pub struct PageOptions {
    /// Stop once this many items have been collected.
    pub limit: Option<usize>,
    /// Wire `Limit` per request, overriding the derived one.
    pub page_size: Option<i32>,
    /// Follow continuation keys.
    pub recursive: bool,
    /// Parallel Scan segments. Ignored by Query.
    pub segments: Option<u32>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            limit: None,
            page_size: None,
            recursive: true,
            segments: None,
        }
    }
}

/// Accumulated result of a paged read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    /// Items in the order they were read.
    pub items: Vec<Item>,
    /// Items matched, after client-side truncation.
    pub count: usize,
    /// Items evaluated by the provider before filtering.
    pub scanned_count: usize,
    /// Where to resume, when the read stopped early without recursion.
    pub last_evaluated_key: Option<Key>,
    /// Per-segment continuation keys of a parallel Scan without recursion,
    /// indexed by segment.
    pub segment_keys: Vec<Option<Key>>,
    /// Capacity consumed, one entry per table.
    pub consumed_capacity: Vec<ConsumedCapacity>,
}

impl PageResult {
    fn truncate(&mut self, limit: usize) {
        self.items.truncate(limit);
        self.count = self.items.len();
    }

    fn absorb(&mut self, page: Page) {
        self.items.extend(page.items);
        self.count += usize::try_from(page.count).unwrap_or_default();
        self.scanned_count += usize::try_from(page.scanned_count).unwrap_or_default();
        if let Some(capacity) = page.consumed_capacity {
            merge_capacity(&mut self.consumed_capacity, capacity);
        }
    }
}

/// One page of either operation.
#[derive(Debug)]
struct Page {
    items: Vec<Item>,
    count: i32,
    scanned_count: i32,
    last_evaluated_key: Key,
    consumed_capacity: Option<ConsumedCapacity>,
}

impl From<QueryOutput> for Page {
    fn from(out: QueryOutput) -> Self {
        Self {
            items: out.items,
            count: out.count,
            scanned_count: out.scanned_count,
            last_evaluated_key: out.last_evaluated_key,
            consumed_capacity: out.consumed_capacity,
        }
    }
}

impl From<ScanOutput> for Page {
    fn from(out: ScanOutput) -> Self {
        Self {
            items: out.items,
            count: out.count,
            scanned_count: out.scanned_count,
            last_evaluated_key: out.last_evaluated_key,
            consumed_capacity: out.consumed_capacity,
        }
    }
}

/// A request that can be resubmitted from a continuation key.
#[async_trait]
trait Paged: Serialize + Clone + Send + Sync {
    const OPERATION: DynamoDBOperation;

    fn table(&self) -> &str;

    fn set_start_key(&mut self, key: Key);

    async fn send(self, client: &dyn DynamoDBClient) -> ClientResult<Page>;
}

#[async_trait]
impl Paged for QueryInput {
    const OPERATION: DynamoDBOperation = DynamoDBOperation::Query;

    fn table(&self) -> &str {
        &self.table_name
    }

    fn set_start_key(&mut self, key: Key) {
        self.exclusive_start_key = key;
    }

    async fn send(self, client: &dyn DynamoDBClient) -> ClientResult<Page> {
        client.query(self).await.map(Page::from)
    }
}

#[async_trait]
impl Paged for ScanInput {
    const OPERATION: DynamoDBOperation = DynamoDBOperation::Scan;

    fn table(&self) -> &str {
        &self.table_name
    }

    fn set_start_key(&mut self, key: Key) {
        self.exclusive_start_key = key;
    }

    async fn send(self, client: &dyn DynamoDBClient) -> ClientResult<Page> {
        client.scan(self).await.map(Page::from)
    }
}

/// Drives paged reads through the retry executor.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Paginator<'a> {
    client: &'a dyn DynamoDBClient,
    executor: &'a RetryExecutor,
}

impl<'a> Paginator<'a> {
    pub(crate) fn new(client: &'a dyn DynamoDBClient, executor: &'a RetryExecutor) -> Self {
        Self { client, executor }
    }

    pub(crate) async fn query(
        self,
        mut input: QueryInput,
        options: &PageOptions,
    ) -> ClientResult<PageResult> {
        if options.limit == Some(0) {
            return Ok(PageResult::default());
        }
        input.limit = options.page_size.or_else(|| options.limit.map(clamp_limit));
        self.drain(input, options.limit, options.recursive).await
    }

    /// Run a Scan, fanning out when more than one segment is in effect.
    ///
    /// `default_segments` applies when the options do not name a count. With
    /// a result limit the count is capped at `ceil(limit / 5)` and the limit
    /// is split evenly across segments.
    pub(crate) async fn scan(
        self,
        mut input: ScanInput,
        options: &PageOptions,
        default_segments: u32,
    ) -> ClientResult<PageResult> {
        if options.limit == Some(0) {
            return Ok(PageResult::default());
        }
        let segments = effective_segments(options, default_segments);
        let per_segment = options
            .limit
            .map(|limit| limit.div_ceil(usize::try_from(segments).unwrap_or(1)));
        input.limit = options
            .page_size
            .or_else(|| per_segment.map(clamp_limit))
            .map(|limit| match input.filter_expression.as_deref() {
                Some(filter) => over_fetch(limit, filter_complexity(filter)),
                None => limit,
            });

        if segments == 1 {
            let mut result = self.drain(input, per_segment, options.recursive).await?;
            if !options.recursive {
                result.segment_keys = vec![result.last_evaluated_key.clone()];
            }
            return Ok(result);
        }

        let total = i32::try_from(segments).unwrap_or(i32::MAX);
        input.total_segments = Some(total);
        input.exclusive_start_key.clear();
        let loops = (0..total).map(|segment| {
            let mut input = input.clone();
            input.segment = Some(segment);
            self.drain(input, per_segment, options.recursive)
        });
        let parts = try_join_all(loops).await?;

        let mut merged = PageResult::default();
        for part in parts {
            merged.items.extend(part.items);
            merged.count += part.count;
            merged.scanned_count += part.scanned_count;
            for capacity in part.consumed_capacity {
                merge_capacity(&mut merged.consumed_capacity, capacity);
            }
            if !options.recursive {
                merged.segment_keys.push(part.last_evaluated_key);
            }
        }
        if let Some(limit) = options.limit {
            if merged.items.len() > limit {
                merged.truncate(limit);
            }
        }
        Ok(merged)
    }

    async fn drain<P: Paged>(
        self,
        mut input: P,
        limit: Option<usize>,
        recursive: bool,
    ) -> ClientResult<PageResult> {
        let client = self.client;
        let mut result = PageResult::default();
        let mut pages = 0u32;
        loop {
            let page = self
                .executor
                .execute(P::OPERATION, || input.clone().send(client))
                .await
                .map_err(|err| err.with_request(P::OPERATION, &input))?;
            pages += 1;
            let next =
                (!page.last_evaluated_key.is_empty()).then(|| page.last_evaluated_key.clone());
            debug!(
                operation = %P::OPERATION,
                table = input.table(),
                page = pages,
                items = page.items.len(),
                more = next.is_some(),
                "page received"
            );
            result.absorb(page);

            if let Some(limit) = limit {
                if result.items.len() >= limit {
                    result.truncate(limit);
                    if !recursive {
                        result.last_evaluated_key = next;
                    }
                    break;
                }
            }
            match next {
                Some(key) if recursive => input.set_start_key(key),
                next => {
                    result.last_evaluated_key = next;
                    break;
                }
            }
        }
        Ok(result)
    }
}

fn clamp_limit(limit: usize) -> i32 {
    i32::try_from(limit).unwrap_or(i32::MAX)
}

/// Segment count after applying the default and the limit-based cap.
fn effective_segments(options: &PageOptions, default_segments: u32) -> u32 {
    let requested = options.segments.unwrap_or(default_segments).max(1);
    match options.limit {
        Some(limit) => {
            let cap = u32::try_from(limit.div_ceil(5)).unwrap_or(u32::MAX).max(1);
            requested.min(cap)
        }
        None => requested,
    }
}

/// `1 +` the boolean connectives in a compiled filter, not counting the
/// `AND` of each `BETWEEN`.
fn filter_complexity(filter: &str) -> u32 {
    let (mut connectives, mut betweens) = (0u32, 0u32);
    for token in filter.split(|c: char| c.is_whitespace() || c == '(' || c == ')') {
        match token {
            "AND" | "OR" | "NOT" => connectives += 1,
            "BETWEEN" => betweens += 1,
            _ => {}
        }
    }
    1 + connectives.saturating_sub(betweens)
}

fn over_fetch(limit: i32, complexity: u32) -> i32 {
    OVER_FETCH_BASE
        .checked_pow(complexity)
        .and_then(|factor| i64::from(limit).checked_mul(factor))
        .map_or(i32::MAX, |wire| i32::try_from(wire).unwrap_or(i32::MAX))
}

#[cfg(test)]
mod tests {
    use fluentdb_model::AttributeValue;
    use serde_json::json;

    use super::*;
    use crate::config::RetryPolicy;
    use crate::test_support::{MockClient, init_tracing, item};

    fn table(n: usize) -> Vec<Item> {
        (0..n).map(|i| item(&format!("u{i}"))).collect()
    }

    fn executor() -> RetryExecutor {
        RetryExecutor::new(RetryPolicy::default(), 1.0).unwrap()
    }

    fn query_input() -> QueryInput {
        QueryInput {
            table_name: "t".to_owned(),
            key_condition_expression: Some("#n0=:v0".to_owned()),
            ..QueryInput::default()
        }
    }

    fn scan_input() -> ScanInput {
        ScanInput {
            table_name: "t".to_owned(),
            ..ScanInput::default()
        }
    }

    #[tokio::test]
    async fn test_should_follow_continuation_keys() {
        init_tracing();
        let client = MockClient::with_table(table(7));
        let executor = executor();
        let options = PageOptions {
            page_size: Some(3),
            ..PageOptions::default()
        };
        let result = Paginator::new(&client, &executor)
            .query(query_input(), &options)
            .await
            .unwrap();
        assert_eq!(result.items.len(), 7);
        assert_eq!(result.count, 7);
        assert!(result.last_evaluated_key.is_none());
        let requests = client.requests(DynamoDBOperation::Query);
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0]["Limit"], 3);
        assert!(requests[0].get("ExclusiveStartKey").is_none());
        assert_eq!(
            requests[1]["ExclusiveStartKey"],
            json!({"__offset": {"N": "3"}})
        );
    }

    #[tokio::test]
    async fn test_should_truncate_to_limit_and_drop_token() {
        let client = MockClient::with_table(table(7));
        let executor = executor();
        let options = PageOptions {
            limit: Some(5),
            page_size: Some(3),
            ..PageOptions::default()
        };
        let result = Paginator::new(&client, &executor)
            .query(query_input(), &options)
            .await
            .unwrap();
        assert_eq!(result.items.len(), 5);
        assert_eq!(result.count, 5);
        assert!(result.last_evaluated_key.is_none());
        assert_eq!(client.calls(DynamoDBOperation::Query), 2);
    }

    #[tokio::test]
    async fn test_should_keep_token_without_recursion() {
        let client = MockClient::with_table(table(7));
        let executor = executor();
        let options = PageOptions {
            limit: Some(2),
            page_size: Some(3),
            recursive: false,
            ..PageOptions::default()
        };
        let result = Paginator::new(&client, &executor)
            .query(query_input(), &options)
            .await
            .unwrap();
        assert_eq!(result.items.len(), 2);
        assert_eq!(
            result.last_evaluated_key,
            Some(Key::from([(
                "__offset".to_owned(),
                AttributeValue::from(3)
            )]))
        );
        assert_eq!(client.calls(DynamoDBOperation::Query), 1);
    }

    #[tokio::test]
    async fn test_should_not_call_for_zero_limit() {
        let client = MockClient::with_table(table(3));
        let executor = executor();
        let options = PageOptions {
            limit: Some(0),
            ..PageOptions::default()
        };
        let result = Paginator::new(&client, &executor)
            .scan(scan_input(), &options, 10)
            .await
            .unwrap();
        assert!(result.items.is_empty());
        assert_eq!(client.calls(DynamoDBOperation::Scan), 0);
    }

    #[tokio::test]
    async fn test_should_cap_segments_and_split_limit() {
        let client = MockClient::with_table(table(40));
        let executor = executor();
        let options = PageOptions {
            limit: Some(10),
            ..PageOptions::default()
        };
        let result = Paginator::new(&client, &executor)
            .scan(scan_input(), &options, 10)
            .await
            .unwrap();
        assert!(result.items.len() <= 10);
        assert_eq!(result.items.len(), 10);
        let mut requests = client.requests(DynamoDBOperation::Scan);
        requests.sort_by_key(|r| r["Segment"].as_i64());
        assert_eq!(requests.len(), 2);
        for (segment, request) in requests.iter().enumerate() {
            assert_eq!(request["Segment"], segment);
            assert_eq!(request["TotalSegments"], 2);
            assert_eq!(request["Limit"], 5);
        }
    }

    #[tokio::test]
    async fn test_should_concatenate_segments_in_order() {
        let client = MockClient::with_table(table(6));
        let executor = executor();
        let options = PageOptions {
            segments: Some(2),
            ..PageOptions::default()
        };
        let result = Paginator::new(&client, &executor)
            .scan(scan_input(), &options, 10)
            .await
            .unwrap();
        let order: Vec<_> = result.items.iter().map(|i| i["pk"].clone()).collect();
        let expected: Vec<_> = ["u0", "u2", "u4", "u1", "u3", "u5"]
            .into_iter()
            .map(AttributeValue::from)
            .collect();
        assert_eq!(order, expected);
        assert_eq!(result.count, 6);
    }

    #[tokio::test]
    async fn test_should_truncate_merged_segments_to_limit() {
        let client = MockClient::with_table(table(20));
        let executor = executor();
        let options = PageOptions {
            limit: Some(7),
            segments: Some(2),
            ..PageOptions::default()
        };
        let result = Paginator::new(&client, &executor)
            .scan(scan_input(), &options, 10)
            .await
            .unwrap();
        let requests = client.requests(DynamoDBOperation::Scan);
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r["Limit"] == 4));
        assert!(result.items.len() <= 7);
        assert_eq!(result.items.len(), 7);
        assert_eq!(result.count, 7);
        let order: Vec<_> = result.items.iter().map(|i| i["pk"].clone()).collect();
        let expected: Vec<_> = ["u0", "u2", "u4", "u6", "u1", "u3", "u5"]
            .into_iter()
            .map(AttributeValue::from)
            .collect();
        assert_eq!(order, expected);
    }

    #[tokio::test]
    async fn test_should_over_fetch_for_filtered_scan() {
        let client = MockClient::with_table(table(30));
        let executor = executor();
        let input = ScanInput {
            filter_expression: Some("#n0=:v0 AND #n1 BETWEEN :v1 AND :v2".to_owned()),
            ..scan_input()
        };
        let options = PageOptions {
            limit: Some(4),
            ..PageOptions::default()
        };
        let result = Paginator::new(&client, &executor)
            .scan(input, &options, 10)
            .await
            .unwrap();
        assert_eq!(result.items.len(), 4);
        assert_eq!(result.count, 4);
        let requests = client.requests(DynamoDBOperation::Scan);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["Limit"], 100);
        assert!(requests[0].get("Segment").is_none());
    }

    #[tokio::test]
    async fn test_should_report_segment_keys_without_recursion() {
        let client = MockClient::with_table(table(20));
        let executor = executor();
        let options = PageOptions {
            page_size: Some(3),
            recursive: false,
            segments: Some(2),
            ..PageOptions::default()
        };
        let result = Paginator::new(&client, &executor)
            .scan(scan_input(), &options, 10)
            .await
            .unwrap();
        assert_eq!(result.items.len(), 6);
        assert_eq!(result.segment_keys.len(), 2);
        assert!(result.segment_keys.iter().all(Option::is_some));
        assert!(result.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn test_should_merge_capacity_across_pages() {
        let client = MockClient::default();
        let capacity = ConsumedCapacity {
            table_name: Some("t".to_owned()),
            capacity_units: Some(1.5),
            ..ConsumedCapacity::default()
        };
        client.push_ok(
            DynamoDBOperation::Query,
            QueryOutput {
                items: vec![item("a")],
                count: 1,
                scanned_count: 2,
                last_evaluated_key: item("a"),
                consumed_capacity: Some(capacity.clone()),
            },
        );
        client.push_ok(
            DynamoDBOperation::Query,
            QueryOutput {
                items: vec![item("b")],
                count: 1,
                scanned_count: 1,
                last_evaluated_key: Key::new(),
                consumed_capacity: Some(capacity),
            },
        );
        let executor = executor();
        let result = Paginator::new(&client, &executor)
            .query(query_input(), &PageOptions::default())
            .await
            .unwrap();
        assert_eq!(result.count, 2);
        assert_eq!(result.scanned_count, 3);
        assert_eq!(result.consumed_capacity.len(), 1);
        assert_eq!(result.consumed_capacity[0].capacity_units, Some(3.0));
    }

    #[test]
    fn test_should_count_filter_complexity() {
        assert_eq!(filter_complexity("#n0=:v0"), 1);
        assert_eq!(filter_complexity("#n0=:v0 AND #n1 BETWEEN :v1 AND :v2"), 2);
        assert_eq!(filter_complexity("NOT (#n0=:v0 OR #n1=:v1)"), 3);
    }

    #[test]
    fn test_should_saturate_over_fetch() {
        assert_eq!(over_fetch(4, 2), 100);
        assert_eq!(over_fetch(1000, 30), i32::MAX);
    }

    #[test]
    fn test_should_default_segments_from_config() {
        let options = PageOptions::default();
        assert_eq!(effective_segments(&options, 10), 10);
        let options = PageOptions {
            limit: Some(3),
            segments: Some(8),
            ..PageOptions::default()
        };
        assert_eq!(effective_segments(&options, 10), 1);
    }
}
