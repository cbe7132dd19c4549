//! The store facade.

use std::future::Future;
use std::sync::Arc;

use fluentdb_model::DynamoDBOperation;
use fluentdb_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, PutItemOutput,
    TransactGetItemsOutput, TransactWriteItemsOutput, UpdateItemOutput,
};
use serde::Serialize;

use crate::batch::BatchOrchestrator;
use crate::client::DynamoDBClient;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::ops::{
    BatchGet, BatchWrite, Compile, Delete, Get, Put, Query, Scan, TransactGet, TransactWrite,
    Update,
};
use crate::paginate::{PageResult, Paginator};
use crate::retry::{RetryExecutor, RetryStats};

/// Compiles operation descriptions and executes them against a client.
///
/// Every call is validated and compiled before anything is sent. Single-item
/// operations and transactions run through the retry executor; batches and
/// paged reads go through their orchestrators, which use the same executor
/// for each request they send.
#[derive(Debug, Clone)]
pub struct Store {
    client: Arc<dyn DynamoDBClient>,
    config: ClientConfig,
    executor: RetryExecutor,
}

impl Store {
    /// A store with default configuration.
    pub fn new(client: Arc<dyn DynamoDBClient>) -> Self {
        Self {
            client,
            config: ClientConfig::default(),
            executor: RetryExecutor::default(),
        }
    }

    /// A store with explicit configuration.
    pub fn with_config(
        client: Arc<dyn DynamoDBClient>,
        config: ClientConfig,
    ) -> ClientResult<Self> {
        config.validate()?;
        let executor = RetryExecutor::new(config.retry.clone(), config.patience)?;
        Ok(Self {
            client,
            config,
            executor,
        })
    }

    /// A store configured from `FLUENTDB_*` environment variables.
    pub fn from_env(client: Arc<dyn DynamoDBClient>) -> ClientResult<Self> {
        Self::with_config(client, ClientConfig::from_env()?)
    }

    /// Scale every attempt deadline of this handle by `ratio`.
    ///
    /// Values above 1 tolerate slower responses before an attempt is
    /// abandoned. Non-positive ratios are rejected.
    pub fn relax_latencies(mut self, ratio: f64) -> ClientResult<Self> {
        self.executor.set_patience(ratio)?;
        self.config.patience = ratio;
        Ok(self)
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Retry activity of this handle and its clones.
    #[must_use]
    pub fn retry_stats(&self) -> &RetryStats {
        self.executor.stats()
    }

    /// Read one item.
    pub async fn get(&self, get: Get) -> ClientResult<GetItemOutput> {
        let client = self.client.as_ref();
        self.send(DynamoDBOperation::GetItem, get.compile()?, |input| {
            client.get_item(input)
        })
        .await
    }

    /// Create or replace one item.
    pub async fn put(&self, put: Put) -> ClientResult<PutItemOutput> {
        let client = self.client.as_ref();
        self.send(DynamoDBOperation::PutItem, put.compile()?, |input| {
            client.put_item(input)
        })
        .await
    }

    /// Modify one item.
    pub async fn update(&self, update: Update) -> ClientResult<UpdateItemOutput> {
        let client = self.client.as_ref();
        self.send(DynamoDBOperation::UpdateItem, update.compile()?, |input| {
            client.update_item(input)
        })
        .await
    }

    /// Delete one item.
    pub async fn delete(&self, delete: Delete) -> ClientResult<DeleteItemOutput> {
        let client = self.client.as_ref();
        self.send(DynamoDBOperation::DeleteItem, delete.compile()?, |input| {
            client.delete_item(input)
        })
        .await
    }

    /// Run a Query across as many pages as its options allow.
    pub async fn query(&self, query: Query) -> ClientResult<PageResult> {
        let input = query.compile()?;
        Paginator::new(self.client.as_ref(), &self.executor)
            .query(input, query.page_options())
            .await
    }

    /// Run a Scan, in parallel segments when configured.
    pub async fn scan(&self, scan: Scan) -> ClientResult<PageResult> {
        let input = scan.compile()?;
        Paginator::new(self.client.as_ref(), &self.executor)
            .scan(input, scan.page_options(), self.config.scan_segments)
            .await
    }

    /// Read many items, chunked and retried until every key is processed.
    pub async fn batch_get(&self, batch: BatchGet) -> ClientResult<BatchGetItemOutput> {
        let input = batch.compile()?;
        BatchOrchestrator::new(self.client.as_ref(), &self.executor)
            .get(input)
            .await
    }

    /// Write many items, chunked and retried until every write is processed.
    pub async fn batch_write(&self, batch: BatchWrite) -> ClientResult<BatchWriteItemOutput> {
        let input = batch.compile()?;
        BatchOrchestrator::new(self.client.as_ref(), &self.executor)
            .write(input)
            .await
    }

    /// Apply a set of writes atomically.
    pub async fn transact_write(
        &self,
        tx: TransactWrite,
    ) -> ClientResult<TransactWriteItemsOutput> {
        let client = self.client.as_ref();
        self.send(DynamoDBOperation::TransactWriteItems, tx.compile()?, |input| {
            client.transact_write_items(input)
        })
        .await
    }

    /// Read a set of items as one consistent snapshot.
    pub async fn transact_get(&self, tx: TransactGet) -> ClientResult<TransactGetItemsOutput> {
        let client = self.client.as_ref();
        self.send(DynamoDBOperation::TransactGetItems, tx.compile()?, |input| {
            client.transact_get_items(input)
        })
        .await
    }

    async fn send<I, T, F, Fut>(
        &self,
        operation: DynamoDBOperation,
        input: I,
        call: F,
    ) -> ClientResult<T>
    where
        I: Serialize + Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        self.executor
            .execute(operation, || call(input.clone()))
            .await
            .map_err(|err| err.with_request(operation, &input))
    }
}
