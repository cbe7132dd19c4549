//! Batch reads and writes against one table.
//!
//! These compile to a single oversized request; the batch orchestrator
//! splits it into provider-sized chunks.

use std::collections::HashMap;

use fluentdb_model::input::{BatchGetItemInput, BatchWriteItemInput};
use fluentdb_model::types::{
    Item, Key, KeysAndAttributes, ReturnConsumedCapacity, ReturnItemCollectionMetrics,
    WriteRequest,
};

use super::{BundleBuilder, Compile, HasConsistentRead, validate_key};
use crate::error::{ClientError, ClientResult};
use crate::expression::ExpressionKind;

/// Read many items by key.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchGet {
    table: String,
    keys: Vec<Key>,
    projection: Vec<String>,
    consistent_read: Option<bool>,
    return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

impl BatchGet {
    /// Get the items with `keys` from `table`.
    pub fn new(table: impl Into<String>, keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            table: table.into(),
            keys: keys.into_iter().collect(),
            projection: Vec::new(),
            consistent_read: None,
            return_consumed_capacity: None,
        }
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

    /// Report consumed capacity.
    #[must_use]
    pub fn return_consumed_capacity(mut self, level: ReturnConsumedCapacity) -> Self {
        self.return_consumed_capacity = Some(level);
        self
    }
}

impl HasConsistentRead for BatchGet {
    fn consistent_read_slot(&mut self) -> &mut Option<bool> {
        &mut self.consistent_read
    }
}

impl Compile for BatchGet {
    type Input = BatchGetItemInput;

    fn compile(&self) -> ClientResult<BatchGetItemInput> {
        for key in &self.keys {
            validate_key(key)?;
        }
        let mut request_items = HashMap::new();
        if !self.keys.is_empty() {
            let mut bundle = BundleBuilder::default()
                .projection(&self.projection)?
                .finish();
            request_items.insert(
                self.table.clone(),
                KeysAndAttributes {
                    keys: self.keys.clone(),
                    projection_expression: bundle.take(ExpressionKind::Projection),
                    expression_attribute_names: bundle.names,
                    consistent_read: self.consistent_read,
                },
            );
        }
        Ok(BatchGetItemInput {
            request_items,
            return_consumed_capacity: self.return_consumed_capacity,
        })
    }
}

/// Put and delete many items without conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchWrite {
    table: String,
    writes: Vec<WriteRequest>,
    return_consumed_capacity: Option<ReturnConsumedCapacity>,
    return_item_collection_metrics: Option<ReturnItemCollectionMetrics>,
}

impl BatchWrite {
    /// Start a batch of writes to `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            writes: Vec::new(),
            return_consumed_capacity: None,
            return_item_collection_metrics: None,
        }
    }

    /// Queue a put of `item`.
    #[must_use]
    pub fn put(mut self, item: Item) -> Self {
        self.writes.push(WriteRequest::put(item));
        self
    }

    /// Queue puts of every item in `items`.
    #[must_use]
    pub fn put_all(mut self, items: impl IntoIterator<Item = Item>) -> Self {
        self.writes.extend(items.into_iter().map(WriteRequest::put));
        self
    }

    /// Queue a delete of the item with `key`.
    #[must_use]
    pub fn delete(mut self, key: Key) -> Self {
        self.writes.push(WriteRequest::delete(key));
        self
    }

    /// Queue deletes of every key in `keys`.
    #[must_use]
    pub fn delete_all(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.writes.extend(keys.into_iter().map(WriteRequest::delete));
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

impl Compile for BatchWrite {
    type Input = BatchWriteItemInput;

    fn compile(&self) -> ClientResult<BatchWriteItemInput> {
        for write in &self.writes {
            match (&write.put_request, &write.delete_request) {
                (Some(put), None) if put.item.is_empty() => {
                    return Err(ClientError::Validation("put item is empty".to_owned()));
                }
                (None, Some(delete)) => validate_key(&delete.key)?,
                _ => {}
            }
        }
        let mut request_items = HashMap::new();
        if !self.writes.is_empty() {
            request_items.insert(self.table.clone(), self.writes.clone());
        }
        Ok(BatchWriteItemInput {
            request_items,
            return_consumed_capacity: self.return_consumed_capacity,
            return_item_collection_metrics: self.return_item_collection_metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::item;

    #[test]
    fn test_should_compile_batch_get_with_projection() {
        let input = BatchGet::new("users", [item("a"), item("b")])
            .project(["name"])
            .consistent_read(true)
            .compile()
            .unwrap();
        let request = &input.request_items["users"];
        assert_eq!(request.keys.len(), 2);
        assert_eq!(request.projection_expression.as_deref(), Some("#n0"));
        assert_eq!(request.expression_attribute_names["#n0"], "name");
        assert_eq!(request.consistent_read, Some(true));
    }

    #[test]
    fn test_should_compile_empty_batch_to_no_request_items() {
        let input = BatchWrite::new("users").compile().unwrap();
        assert!(input.request_items.is_empty());
        let input = BatchGet::new("users", Vec::<Key>::new()).compile().unwrap();
        assert!(input.request_items.is_empty());
    }

    #[test]
    fn test_should_reject_invalid_delete_key() {
        let err = BatchWrite::new("users")
            .put(item("a"))
            .delete(Key::new())
            .compile()
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn test_should_keep_write_order() {
        let input = BatchWrite::new("users")
            .put_all([item("a"), item("b")])
            .delete(item("c"))
            .compile()
            .unwrap();
        let writes = &input.request_items["users"];
        assert_eq!(writes.len(), 3);
        assert!(writes[0].put_request.is_some());
        assert_eq!(writes[2], WriteRequest::delete(item("c")));
    }
}
