//! All-or-nothing transactions.

use fluentdb_model::input::{TransactGetItemsInput, TransactWriteItemsInput};
use fluentdb_model::types::{
    self as wire, ReturnConsumedCapacity, ReturnItemCollectionMetrics, TransactGetItem,
    TransactWriteItem,
};

use super::{Compile, ConditionCheck, Delete, Get, Put, Update};
use crate::error::{ClientError, ClientResult};

/// Most items one transaction may contain.
pub const MAX_TRANSACT_ITEMS: usize = 100;

fn check_item_count(kind: &str, count: usize) -> ClientResult<()> {
    if count == 0 {
        return Err(ClientError::Validation(format!("{kind} has no items")));
    }
    if count > MAX_TRANSACT_ITEMS {
        return Err(ClientError::Validation(format!(
            "{kind} has {count} items, at most {MAX_TRANSACT_ITEMS} are allowed"
        )));
    }
    Ok(())
}

/// One write in a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactItem {
    /// A condition that must hold; nothing is written.
    Check(ConditionCheck),
    /// Create or replace an item.
    Put(Put),
    /// Delete an item.
    Delete(Delete),
    /// Modify an item.
    Update(Update),
}

impl TransactItem {
    fn to_wire(&self) -> ClientResult<TransactWriteItem> {
        let mut out = TransactWriteItem::default();
        match self {
            Self::Check(check) => out.condition_check = Some(check.to_transact()?),
            Self::Put(put) => out.put = Some(put.to_transact()?),
            Self::Delete(delete) => out.delete = Some(delete.to_transact()?),
            Self::Update(update) => out.update = Some(update.to_transact()?),
        }
        Ok(out)
    }
}

impl From<ConditionCheck> for TransactItem {
    fn from(check: ConditionCheck) -> Self {
        Self::Check(check)
    }
}

impl From<Put> for TransactItem {
    fn from(put: Put) -> Self {
        Self::Put(put)
    }
}

impl From<Delete> for TransactItem {
    fn from(delete: Delete) -> Self {
        Self::Delete(delete)
    }
}

impl From<Update> for TransactItem {
    fn from(update: Update) -> Self {
        Self::Update(update)
    }
}

/// A set of writes that succeed or fail together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactWrite {
    items: Vec<TransactItem>,
    client_request_token: Option<String>,
    return_consumed_capacity: Option<ReturnConsumedCapacity>,
    return_item_collection_metrics: Option<ReturnItemCollectionMetrics>,
}

impl TransactWrite {
    /// An empty transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a write.
    #[must_use]
    pub fn with(mut self, item: impl Into<TransactItem>) -> Self {
        self.items.push(item.into());
        self
    }

    /// Idempotency token for safe client-side resubmission.
    #[must_use]
    pub fn client_request_token(mut self, token: impl Into<String>) -> Self {
        self.client_request_token = Some(token.into());
        self
    }

    /// Report consumed capacity.
    #[must_use]
    pub fn return_consumed_capacity(mut self, level: ReturnConsumedCapacity) -> Self {
        self.return_consumed_capacity = Some(level);
        self
    }

    /// Report item collection metrics.
    #[must_use]
    pub fn return_item_collection_metrics(mut self, level: ReturnItemCollectionMetrics) -> Self {
        self.return_item_collection_metrics = Some(level);
        self
    }
}

impl Compile for TransactWrite {
    type Input = TransactWriteItemsInput;

    fn compile(&self) -> ClientResult<TransactWriteItemsInput> {
        check_item_count("transact write", self.items.len())?;
        let transact_items = self
            .items
            .iter()
            .map(TransactItem::to_wire)
            .collect::<ClientResult<Vec<_>>>()?;
        Ok(TransactWriteItemsInput {
            transact_items,
            client_request_token: self.client_request_token.clone(),
            return_consumed_capacity: self.return_consumed_capacity,
            return_item_collection_metrics: self.return_item_collection_metrics,
        })
    }
}

/// A consistent snapshot read of several items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactGet {
    items: Vec<Get>,
    return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

impl TransactGet {
    /// An empty transactional read.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a read. Consistency and capacity settings of `get` are ignored.
    #[must_use]
    pub fn with(mut self, get: Get) -> Self {
        self.items.push(get);
        self
    }

    /// Report consumed capacity.
    #[must_use]
    pub fn return_consumed_capacity(mut self, level: ReturnConsumedCapacity) -> Self {
        self.return_consumed_capacity = Some(level);
        self
    }
}

impl Compile for TransactGet {
    type Input = TransactGetItemsInput;

    fn compile(&self) -> ClientResult<TransactGetItemsInput> {
        check_item_count("transact get", self.items.len())?;
        let transact_items = self
            .items
            .iter()
            .map(|get| get.to_transact().map(|get: wire::Get| TransactGetItem { get }))
            .collect::<ClientResult<Vec<_>>>()?;
        Ok(TransactGetItemsInput {
            transact_items,
            return_consumed_capacity: self.return_consumed_capacity,
        })
    }
}
