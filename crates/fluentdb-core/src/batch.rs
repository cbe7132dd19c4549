//! Batch orchestration.
//!
//! A batch request larger than the provider accepts is split into chunks of
//! at most [`WRITE_LIMIT`] writes or [`GET_LIMIT`] keys per table. Chunks run
//! concurrently. Within a chunk, whatever the provider reports as
//! unprocessed is resubmitted after a backoff delay until nothing remains or
//! the delays run out. Outputs are merged in chunk order, and batch-get
//! items are put back into the order of the keys that requested them.

use std::collections::HashMap;

use async_trait::async_trait;
use backon::BackoffBuilder;
use fluentdb_model::DynamoDBOperation;
use fluentdb_model::input::{BatchGetItemInput, BatchWriteItemInput};
use fluentdb_model::output::{BatchGetItemOutput, BatchWriteItemOutput};
use fluentdb_model::types::{ConsumedCapacity, Item, Key, KeysAndAttributes};
use futures::future::try_join_all;
use serde::Serialize;
use tracing::debug;

use crate::client::DynamoDBClient;
use crate::error::{ClientError, ClientResult};
use crate::retry::RetryExecutor;

/// Most writes per `BatchWriteItem` request.
pub const WRITE_LIMIT: usize = 25;

/// Most keys per `BatchGetItem` request.
pub const GET_LIMIT: usize = 100;

/// Add `capacity` to the entry for its table, or append a new entry.
pub(crate) fn merge_capacity(acc: &mut Vec<ConsumedCapacity>, capacity: ConsumedCapacity) {
    match acc.iter_mut().find(|c| c.table_name == capacity.table_name) {
        Some(existing) => existing.absorb(&capacity),
        None => acc.push(capacity),
    }
}

/// Index of the first key whose attributes all appear unchanged in `item`.
fn key_position(keys: &[Key], item: &Item) -> usize {
    keys.iter()
        .position(|key| key.iter().all(|(name, value)| item.get(name) == Some(value)))
        .unwrap_or(usize::MAX)
}

fn sorted_tables<V>(items: &HashMap<String, V>) -> Vec<(&String, &V)> {
    let mut tables: Vec<_> = items.iter().collect();
    tables.sort_by(|a, b| a.0.cmp(b.0));
    tables
}

/// A batch request that can be chunked and resubmitted.
#[async_trait]
trait Batched: Serialize + Clone + Send + Sync + Sized {
    type Output: Default + Send;

    const OPERATION: DynamoDBOperation;

    /// Split into provider-sized requests, ordered by table name then input
    /// position.
    fn split(&self) -> Vec<Self>;

    /// Entries carried by this request.
    fn entries(&self) -> usize;

    /// A request for whatever `output` left unprocessed.
    fn remainder(&self, output: &mut Self::Output) -> Self;

    fn merge(acc: &mut Self::Output, output: Self::Output);

    /// Reorder a finished chunk's output to follow this request.
    fn restore_order(&self, _output: &mut Self::Output) {}

    async fn send(self, client: &dyn DynamoDBClient) -> ClientResult<Self::Output>;
}

#[async_trait]
impl Batched for BatchWriteItemInput {
    type Output = BatchWriteItemOutput;

    const OPERATION: DynamoDBOperation = DynamoDBOperation::BatchWriteItem;

    fn split(&self) -> Vec<Self> {
        sorted_tables(&self.request_items)
            .into_iter()
            .flat_map(|(table, writes)| {
                writes.chunks(WRITE_LIMIT).map(move |chunk| Self {
                    request_items: HashMap::from([(table.clone(), chunk.to_vec())]),
                    return_consumed_capacity: self.return_consumed_capacity,
                    return_item_collection_metrics: self.return_item_collection_metrics,
                })
            })
            .collect()
    }

    fn entries(&self) -> usize {
        self.request_items.values().map(Vec::len).sum()
    }

    fn remainder(&self, output: &mut BatchWriteItemOutput) -> Self {
        Self {
            request_items: std::mem::take(&mut output.unprocessed_items),
            ..self.clone()
        }
    }

    fn merge(acc: &mut BatchWriteItemOutput, output: BatchWriteItemOutput) {
        for (table, metrics) in output.item_collection_metrics {
            acc.item_collection_metrics
                .entry(table)
                .or_default()
                .extend(metrics);
        }
        for capacity in output.consumed_capacity {
            merge_capacity(&mut acc.consumed_capacity, capacity);
        }
    }

    async fn send(self, client: &dyn DynamoDBClient) -> ClientResult<BatchWriteItemOutput> {
        client.batch_write_item(self).await
    }
}

#[async_trait]
impl Batched for BatchGetItemInput {
    type Output = BatchGetItemOutput;

    const OPERATION: DynamoDBOperation = DynamoDBOperation::BatchGetItem;

    fn split(&self) -> Vec<Self> {
        sorted_tables(&self.request_items)
            .into_iter()
            .flat_map(|(table, request)| {
                request.keys.chunks(GET_LIMIT).map(move |chunk| Self {
                    request_items: HashMap::from([(
                        table.clone(),
                        KeysAndAttributes {
                            keys: chunk.to_vec(),
                            ..request.clone()
                        },
                    )]),
                    return_consumed_capacity: self.return_consumed_capacity,
                })
            })
            .collect()
    }

    fn entries(&self) -> usize {
        self.request_items.values().map(|r| r.keys.len()).sum()
    }

    fn remainder(&self, output: &mut BatchGetItemOutput) -> Self {
        Self {
            request_items: std::mem::take(&mut output.unprocessed_keys),
            ..self.clone()
        }
    }

    fn merge(acc: &mut BatchGetItemOutput, output: BatchGetItemOutput) {
        for (table, items) in output.responses {
            acc.responses.entry(table).or_default().extend(items);
        }
        for capacity in output.consumed_capacity {
            merge_capacity(&mut acc.consumed_capacity, capacity);
        }
    }

    fn restore_order(&self, output: &mut BatchGetItemOutput) {
        for (table, items) in &mut output.responses {
            if let Some(request) = self.request_items.get(table) {
                // Stable: items matching no key keep their relative order at the end.
                items.sort_by_cached_key(|item| key_position(&request.keys, item));
            }
        }
    }

    async fn send(self, client: &dyn DynamoDBClient) -> ClientResult<BatchGetItemOutput> {
        client.batch_get_item(self).await
    }
}

/// Splits, runs and merges batch requests.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BatchOrchestrator<'a> {
    client: &'a dyn DynamoDBClient,
    executor: &'a RetryExecutor,
}

impl<'a> BatchOrchestrator<'a> {
    pub(crate) fn new(client: &'a dyn DynamoDBClient, executor: &'a RetryExecutor) -> Self {
        Self { client, executor }
    }

    pub(crate) async fn write(
        self,
        input: BatchWriteItemInput,
    ) -> ClientResult<BatchWriteItemOutput> {
        self.run(input).await
    }

    pub(crate) async fn get(self, input: BatchGetItemInput) -> ClientResult<BatchGetItemOutput> {
        self.run(input).await
    }

    async fn run<B: Batched>(self, input: B) -> ClientResult<B::Output> {
        let chunks = input.split();
        debug!(
            operation = %B::OPERATION,
            entries = input.entries(),
            chunks = chunks.len(),
            "running batch"
        );
        let outputs =
            try_join_all(chunks.into_iter().map(|chunk| self.run_chunk(chunk))).await?;
        let mut merged = B::Output::default();
        for output in outputs {
            B::merge(&mut merged, output);
        }
        Ok(merged)
    }

    /// Submit one chunk, then its remainders, until nothing is left.
    async fn run_chunk<B: Batched>(self, chunk: B) -> ClientResult<B::Output> {
        let client = self.client;
        let mut request = chunk.clone();
        let mut delays = self.executor.backoff().build();
        let mut merged = B::Output::default();
        let mut submissions = 0u32;
        loop {
            submissions += 1;
            let mut output = self
                .executor
                .execute(B::OPERATION, || request.clone().send(client))
                .await
                .map_err(|err| err.with_request(B::OPERATION, &request))?;
            let remainder = request.remainder(&mut output);
            B::merge(&mut merged, output);

            let remaining = remainder.entries();
            if remaining == 0 {
                chunk.restore_order(&mut merged);
                return Ok(merged);
            }
            let Some(delay) = delays.next() else {
                return Err(ClientError::UnprocessedRemainder {
                    operation: B::OPERATION,
                    remaining,
                    attempts: submissions,
                });
            };
            debug!(
                operation = %B::OPERATION,
                remaining,
                submission = submissions,
                ?delay,
                "resubmitting unprocessed entries"
            );
            tokio::time::sleep(delay).await;
            request = remainder;
        }
    }
}
