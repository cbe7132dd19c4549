//! Expression compilation and resilient execution for DynamoDB-style stores.
//!
//! Operations are described as plain values ([`Get`], [`Put`], [`Update`],
//! [`Query`], [`BatchWrite`], ...), compiled into wire requests with
//! deduplicated placeholders, and executed by a [`Store`] through an injected
//! [`DynamoDBClient`] with bounded retries, batch chunking and pagination.
#![allow(missing_docs, clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod expression;
pub mod marshal;
pub mod ops;
pub mod paginate;
pub mod retry;
pub mod store;

#[cfg(test)]
mod test_support;

pub use client::DynamoDBClient;
pub use config::{ClientConfig, RetryPolicy};
pub use error::{ClientError, ClientResult};
pub use expression::condition::{
    and, attribute_exists, attribute_not_exists, attribute_type, begins_with, between, contains,
    equals, greater_than, greater_than_or_equal, is_in, less_than, less_than_or_equal, not,
    not_equals, or, size,
};
pub use expression::{AttributeType, Condition, UpdateOperation};
pub use ops::{
    BatchGet, BatchWrite, ConditionCheck, Delete, Get, HasCondition, HasConsistentRead,
    HasReturnValues, HasUpdateOps, Put, Query, Scan, TransactGet, TransactItem, TransactWrite,
    Update,
};
pub use paginate::{PageOptions, PageResult};
pub use store::Store;
