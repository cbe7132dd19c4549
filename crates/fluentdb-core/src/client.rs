//! The underlying store client.
//!
//! Implementations own transport, signing and endpoint selection. They accept
//! a fully built wire input and return the wire output. Failures must map
//! onto [`ClientError`] so they can be classified for retry: provider
//! rejections as [`ClientError::Service`], and connectivity problems as
//! [`ClientError::Transport`].

use std::fmt;

use async_trait::async_trait;
use fluentdb_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    QueryInput, ScanInput, TransactGetItemsInput, TransactWriteItemsInput, UpdateItemInput,
};
use fluentdb_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, PutItemOutput,
    QueryOutput, ScanOutput, TransactGetItemsOutput, TransactWriteItemsOutput, UpdateItemOutput,
};

use crate::error::ClientResult;

/// A client that sends wire requests to a DynamoDB-compatible service.
#[async_trait]
pub trait DynamoDBClient: fmt::Debug + Send + Sync {
    /// Send a `GetItem` request.
    async fn get_item(&self, input: GetItemInput) -> ClientResult<GetItemOutput>;

    /// Send a `PutItem` request.
    async fn put_item(&self, input: PutItemInput) -> ClientResult<PutItemOutput>;

    /// Send an `UpdateItem` request.
    async fn update_item(&self, input: UpdateItemInput) -> ClientResult<UpdateItemOutput>;

    /// Send a `DeleteItem` request.
    async fn delete_item(&self, input: DeleteItemInput) -> ClientResult<DeleteItemOutput>;

    /// Send one page of a `Query`.
    async fn query(&self, input: QueryInput) -> ClientResult<QueryOutput>;

    /// Send one page of a `Scan`.
    async fn scan(&self, input: ScanInput) -> ClientResult<ScanOutput>;

    /// Send a `BatchGetItem` request.
    async fn batch_get_item(&self, input: BatchGetItemInput) -> ClientResult<BatchGetItemOutput>;

    /// Send a `BatchWriteItem` request.
    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> ClientResult<BatchWriteItemOutput>;

    /// Send a `TransactWriteItems` request.
    async fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> ClientResult<TransactWriteItemsOutput>;

    /// Send a `TransactGetItems` request.
    async fn transact_get_items(
        &self,
        input: TransactGetItemsInput,
    ) -> ClientResult<TransactGetItemsOutput>;
}
