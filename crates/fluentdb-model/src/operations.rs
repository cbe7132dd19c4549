//! DynamoDB operation enum.

use std::fmt;

/// The item-level operations the client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamoDBOperation {
    // Single item
    /// Get an item by primary key.
    GetItem,
    /// Put (insert or replace) an item.
    PutItem,
    /// Update an item.
    UpdateItem,
    /// Delete an item by primary key.
    DeleteItem,

    // Multi-page reads
    /// Query items by key condition.
    Query,
    /// Scan a table or index.
    Scan,

    // Batches
    /// Batch get items from multiple tables.
    BatchGetItem,
    /// Batch put/delete items in multiple tables.
    BatchWriteItem,

    // Transactions
    /// Transactional write of up to 100 items.
    TransactWriteItems,
    /// Transactional read of up to 100 items.
    TransactGetItems,
}

impl DynamoDBOperation {
    /// Returns the operation name used in the `X-Amz-Target` header.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetItem => "GetItem",
            Self::PutItem => "PutItem",
            Self::UpdateItem => "UpdateItem",
            Self::DeleteItem => "DeleteItem",
            Self::Query => "Query",
            Self::Scan => "Scan",
            Self::BatchGetItem => "BatchGetItem",
            Self::BatchWriteItem => "BatchWriteItem",
            Self::TransactWriteItems => "TransactWriteItems",
            Self::TransactGetItems => "TransactGetItems",
        }
    }

    /// Returns `true` for operations that only read data.
    #[must_use]
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Self::GetItem | Self::Query | Self::Scan | Self::BatchGetItem | Self::TransactGetItems
        )
    }
}

impl fmt::Display for DynamoDBOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
