//! Test helpers: tracing setup and a scripted in-memory client.

use std::collections::{HashMap, VecDeque};
use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use fluentdb_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    QueryInput, ScanInput, TransactGetItemsInput, TransactWriteItemsInput, UpdateItemInput,
};
use fluentdb_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, PutItemOutput,
    QueryOutput, ScanOutput, TransactGetItemsOutput, TransactWriteItemsOutput, UpdateItemOutput,
};
use fluentdb_model::types::ItemResponse;
use fluentdb_model::{AttributeValue, DynamoDBOperation, Item, Key};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::DynamoDBClient;
use crate::error::{ClientError, ClientResult};

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub(crate) fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Continuation key attribute used by the in-memory pager.
const OFFSET_KEY: &str = "__offset";

#[derive(Debug)]
struct Scripted {
    delay: Duration,
    result: ClientResult<Value>,
}

#[derive(Debug, Default)]
struct MockState {
    requests: Vec<(DynamoDBOperation, Value)>,
    responses: HashMap<DynamoDBOperation, VecDeque<Scripted>>,
    table: Vec<Item>,
}

/// A client that records every request and replays scripted responses.
///
/// With nothing scripted it falls back to an in-memory table: `Query` and
/// `Scan` page through the table (honouring `Limit`, `Segment` and
/// `TotalSegments`), batch and transactional gets echo the requested keys,
/// and writes succeed with an empty output.
#[derive(Debug, Default)]
pub(crate) struct MockClient {
    state: Mutex<MockState>,
}

impl MockClient {
    pub(crate) fn with_table(items: Vec<Item>) -> Self {
        let client = Self::default();
        client.state.lock().table = items;
        client
    }

    pub(crate) fn push_ok<O: Serialize>(&self, op: DynamoDBOperation, output: O) {
        self.push(op, Duration::ZERO, Ok(serde_json::to_value(output).unwrap()));
    }

    pub(crate) fn push_err(&self, op: DynamoDBOperation, err: ClientError) {
        self.push(op, Duration::ZERO, Err(err));
    }

    pub(crate) fn push_delayed_ok<O: Serialize>(
        &self,
        op: DynamoDBOperation,
        delay: Duration,
        output: O,
    ) {
        self.push(op, delay, Ok(serde_json::to_value(output).unwrap()));
    }

    fn push(&self, op: DynamoDBOperation, delay: Duration, result: ClientResult<Value>) {
        self.state
            .lock()
            .responses
            .entry(op)
            .or_default()
            .push_back(Scripted { delay, result });
    }

    /// Wire requests recorded for `op`, in arrival order.
    pub(crate) fn requests(&self, op: DynamoDBOperation) -> Vec<Value> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|(o, _)| *o == op)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub(crate) fn calls(&self, op: DynamoDBOperation) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|(o, _)| *o == op)
            .count()
    }

    async fn respond<I, O>(&self, op: DynamoDBOperation, input: &I, fallback: O) -> ClientResult<O>
    where
        I: Serialize + Sync,
        O: DeserializeOwned + Send,
    {
        let scripted = {
            let mut state = self.state.lock();
            state
                .requests
                .push((op, serde_json::to_value(input).unwrap()));
            state.responses.get_mut(&op).and_then(VecDeque::pop_front)
        };
        let Some(scripted) = scripted else {
            return Ok(fallback);
        };
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        scripted
            .result
            .map(|value| serde_json::from_value(value).unwrap())
    }

    fn page(
        &self,
        start: &Key,
        limit: Option<i32>,
        segment: Option<(i32, i32)>,
    ) -> (Vec<Item>, Key) {
        let state = self.state.lock();
        let rows: Vec<&Item> = match segment {
            Some((segment, total)) => state
                .table
                .iter()
                .enumerate()
                .filter(|(i, _)| i32::try_from(*i).unwrap() % total == segment)
                .map(|(_, item)| item)
                .collect(),
            None => state.table.iter().collect(),
        };
        let offset: usize = start
            .get(OFFSET_KEY)
            .and_then(AttributeValue::as_n)
            .map_or(0, |n| n.parse().unwrap());
        let end = limit.map_or(rows.len(), |l| {
            (offset + usize::try_from(l).unwrap()).min(rows.len())
        });
        let items = rows[offset..end].iter().map(|item| (*item).clone()).collect();
        let next = if end < rows.len() {
            Key::from([(OFFSET_KEY.to_owned(), AttributeValue::from(end))])
        } else {
            Key::new()
        };
        (items, next)
    }
}

fn count(items: &[Item]) -> i32 {
    i32::try_from(items.len()).unwrap()
}

#[async_trait]
impl DynamoDBClient for MockClient {
    async fn get_item(&self, input: GetItemInput) -> ClientResult<GetItemOutput> {
        self.respond(DynamoDBOperation::GetItem, &input, GetItemOutput::default())
            .await
    }

    async fn put_item(&self, input: PutItemInput) -> ClientResult<PutItemOutput> {
        self.respond(DynamoDBOperation::PutItem, &input, PutItemOutput::default())
            .await
    }

    async fn update_item(&self, input: UpdateItemInput) -> ClientResult<UpdateItemOutput> {
        self.respond(DynamoDBOperation::UpdateItem, &input, UpdateItemOutput::default())
            .await
    }

    async fn delete_item(&self, input: DeleteItemInput) -> ClientResult<DeleteItemOutput> {
        self.respond(DynamoDBOperation::DeleteItem, &input, DeleteItemOutput::default())
            .await
    }

    async fn query(&self, input: QueryInput) -> ClientResult<QueryOutput> {
        let (items, last_evaluated_key) = self.page(&input.exclusive_start_key, input.limit, None);
        let fallback = QueryOutput {
            count: count(&items),
            scanned_count: count(&items),
            items,
            last_evaluated_key,
            consumed_capacity: None,
        };
        self.respond(DynamoDBOperation::Query, &input, fallback).await
    }

    async fn scan(&self, input: ScanInput) -> ClientResult<ScanOutput> {
        let segment = input.segment.zip(input.total_segments);
        let (items, last_evaluated_key) =
            self.page(&input.exclusive_start_key, input.limit, segment);
        let fallback = ScanOutput {
            count: count(&items),
            scanned_count: count(&items),
            items,
            last_evaluated_key,
            consumed_capacity: None,
        };
        self.respond(DynamoDBOperation::Scan, &input, fallback).await
    }

    async fn batch_get_item(&self, input: BatchGetItemInput) -> ClientResult<BatchGetItemOutput> {
        let responses = input
            .request_items
            .iter()
            .map(|(table, keys)| (table.clone(), keys.keys.clone()))
            .collect();
        let fallback = BatchGetItemOutput {
            responses,
            ..Default::default()
        };
        self.respond(DynamoDBOperation::BatchGetItem, &input, fallback)
            .await
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> ClientResult<BatchWriteItemOutput> {
        self.respond(
            DynamoDBOperation::BatchWriteItem,
            &input,
            BatchWriteItemOutput::default(),
        )
        .await
    }

    async fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> ClientResult<TransactWriteItemsOutput> {
        self.respond(
            DynamoDBOperation::TransactWriteItems,
            &input,
            TransactWriteItemsOutput::default(),
        )
        .await
    }

    async fn transact_get_items(
        &self,
        input: TransactGetItemsInput,
    ) -> ClientResult<TransactGetItemsOutput> {
        let responses = input
            .transact_items
            .iter()
            .map(|item| ItemResponse {
                item: Some(item.get.key.clone()),
            })
            .collect();
        let fallback = TransactGetItemsOutput {
            responses,
            ..Default::default()
        };
        self.respond(DynamoDBOperation::TransactGetItems, &input, fallback)
            .await
    }
}

/// An item with a single string attribute `pk`.
pub(crate) fn item(pk: &str) -> Item {
    Item::from([("pk".to_owned(), AttributeValue::from(pk))])
}
