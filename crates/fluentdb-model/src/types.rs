//! Shared DynamoDB types used by the item-level operations.
//!
//! All structs follow the DynamoDB JSON wire format with `PascalCase` field
//! names. Enum variants use Rust naming with `#[serde(rename)]` to the
//! `SCREAMING_SNAKE_CASE` wire values.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::AttributeValue;

/// A DynamoDB item represented as a map of attribute names to values.
pub type Item = HashMap<String, AttributeValue>;

/// A DynamoDB key represented as a map of key attribute names to values.
pub type Key = HashMap<String, AttributeValue>;

/// Expression attribute names mapping (`#name` placeholders to attribute names).
pub type ExpressionAttributeNames = HashMap<String, String>;

/// Expression attribute values mapping (`:value` placeholders to attribute values).
pub type ExpressionAttributeValues = HashMap<String, AttributeValue>;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Determines what values are returned by write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReturnValue {
    /// Nothing is returned.
    #[default]
    #[serde(rename = "NONE")]
    None,
    /// All attributes as they were before the write.
    #[serde(rename = "ALL_OLD")]
    AllOld,
    /// Only the updated attributes, as they were before the write.
    #[serde(rename = "UPDATED_OLD")]
    UpdatedOld,
    /// All attributes as they are after the write.
    #[serde(rename = "ALL_NEW")]
    AllNew,
    /// Only the updated attributes, as they are after the write.
    #[serde(rename = "UPDATED_NEW")]
    UpdatedNew,
}

/// What to return when a transactional condition check fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReturnValuesOnConditionCheckFailure {
    /// Return the item as it was.
    #[serde(rename = "ALL_OLD")]
    AllOld,
    /// Return nothing.
    #[default]
    #[serde(rename = "NONE")]
    None,
}

/// Controls whether consumed capacity information is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReturnConsumedCapacity {
    /// Capacity for the table and every index involved.
    #[serde(rename = "INDEXES")]
    Indexes,
    /// Only the total.
    #[serde(rename = "TOTAL")]
    Total,
    /// No capacity reporting.
    #[default]
    #[serde(rename = "NONE")]
    None,
}

/// Controls whether item collection metrics are returned for writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReturnItemCollectionMetrics {
    /// Return item collection size estimates.
    #[serde(rename = "SIZE")]
    Size,
    /// No metrics.
    #[default]
    #[serde(rename = "NONE")]
    None,
}

/// Attributes to retrieve in a `Query` or `Scan` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Select {
    /// All attributes of the item.
    #[default]
    #[serde(rename = "ALL_ATTRIBUTES")]
    AllAttributes,
    /// All attributes projected into the index.
    #[serde(rename = "ALL_PROJECTED_ATTRIBUTES")]
    AllProjectedAttributes,
    /// Only the attributes named in `ProjectionExpression`.
    #[serde(rename = "SPECIFIC_ATTRIBUTES")]
    SpecificAttributes,
    /// Only the number of matching items.
    #[serde(rename = "COUNT")]
    Count,
}

// ---------------------------------------------------------------------------
// Consumed capacity & metrics
// ---------------------------------------------------------------------------

/// Capacity units consumed by an individual table or index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Capacity {
    /// Read capacity units consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_capacity_units: Option<f64>,
    /// Write capacity units consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_capacity_units: Option<f64>,
    /// Total capacity units consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_units: Option<f64>,
}

/// Capacity consumed by an operation, per table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsumedCapacity {
    /// The table that was affected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// Total capacity units consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_units: Option<f64>,
    /// Read capacity units consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_capacity_units: Option<f64>,
    /// Write capacity units consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_capacity_units: Option<f64>,
    /// Capacity consumed by the base table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<Capacity>,
    /// Capacity consumed by each local secondary index.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub local_secondary_indexes: HashMap<String, Capacity>,
    /// Capacity consumed by each global secondary index.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub global_secondary_indexes: HashMap<String, Capacity>,
}

fn add_units(acc: &mut Option<f64>, more: Option<f64>) {
    if let Some(more) = more {
        *acc = Some(acc.unwrap_or(0.0) + more);
    }
}

impl Capacity {
    /// Add another capacity reading into this one.
    pub fn absorb(&mut self, other: &Capacity) {
        add_units(&mut self.read_capacity_units, other.read_capacity_units);
        add_units(&mut self.write_capacity_units, other.write_capacity_units);
        add_units(&mut self.capacity_units, other.capacity_units);
    }
}

impl ConsumedCapacity {
    /// Sum another reading for the same table into this one.
    pub fn absorb(&mut self, other: &ConsumedCapacity) {
        add_units(&mut self.capacity_units, other.capacity_units);
        add_units(&mut self.read_capacity_units, other.read_capacity_units);
        add_units(&mut self.write_capacity_units, other.write_capacity_units);
        if let Some(table) = &other.table {
            self.table.get_or_insert_with(Capacity::default).absorb(table);
        }
        for (name, capacity) in &other.local_secondary_indexes {
            self.local_secondary_indexes
                .entry(name.clone())
                .or_default()
                .absorb(capacity);
        }
        for (name, capacity) in &other.global_secondary_indexes {
            self.global_secondary_indexes
                .entry(name.clone())
                .or_default()
                .absorb(capacity);
        }
    }
}

/// Metrics about an item collection (items sharing one partition key).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemCollectionMetrics {
    /// The partition key value of the item collection.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub item_collection_key: Key,
    /// Size estimate range in gigabytes (lower and upper bound).
    #[serde(
        rename = "SizeEstimateRangeGB",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub size_estimate_range_gb: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Batch operations
// ---------------------------------------------------------------------------

/// The keys and read options for one table in a `BatchGetItem` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeysAndAttributes {
    /// The primary keys of the items to retrieve.
    pub keys: Vec<Key>,
    /// The attributes to retrieve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    /// Substitution tokens for attribute names in the projection.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,
    /// Whether to use a consistent read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,
}

/// A single put or delete within a `BatchWriteItem` request.
///
/// Exactly one of `put_request` or `delete_request` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WriteRequest {
    /// A request to put an item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put_request: Option<PutRequest>,
    /// A request to delete an item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_request: Option<DeleteRequest>,
}

impl WriteRequest {
    /// A put of `item`.
    #[must_use]
    pub fn put(item: Item) -> Self {
        Self {
            put_request: Some(PutRequest { item }),
            delete_request: None,
        }
    }

    /// A delete of `key`.
    #[must_use]
    pub fn delete(key: Key) -> Self {
        Self {
            put_request: None,
            delete_request: Some(DeleteRequest { key }),
        }
    }
}

/// A request to put an item within a `BatchWriteItem` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutRequest {
    /// The item attributes to put.
    pub item: Item,
}

/// A request to delete an item within a `BatchWriteItem` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteRequest {
    /// The primary key of the item to delete.
    pub key: Key,
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// One action within a `TransactWriteItems` request.
///
/// Exactly one field is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactWriteItem {
    /// A condition that must hold for the transaction to commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_check: Option<ConditionCheck>,
    /// A put.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Put>,
    /// A delete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Delete>,
    /// An update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<Update>,
}

/// A transactional condition check against an item that is not written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConditionCheck {
    pub table_name: String,
    pub key: Key,
    pub condition_expression: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: ExpressionAttributeValues,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// A transactional put.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Put {
    pub table_name: String,
    pub item: Item,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: ExpressionAttributeValues,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// A transactional delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Delete {
    pub table_name: String,
    pub key: Key,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: ExpressionAttributeValues,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// A transactional update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Update {
    pub table_name: String,
    pub key: Key,
    pub update_expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: ExpressionAttributeValues,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// One read within a `TransactGetItems` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactGetItem {
    pub get: Get,
}

/// A transactional get.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Get {
    pub table_name: String,
    pub key: Key,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,
}

/// The item returned for one entry of a `TransactGetItems` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_serialize_return_value() {
        let json = serde_json::to_string(&ReturnValue::AllNew).unwrap();
        assert_eq!(json, r#""ALL_NEW""#);
    }

    #[test]
    fn test_should_omit_empty_projection_names() {
        let keys = KeysAndAttributes {
            keys: vec![Key::from([("pk".to_owned(), AttributeValue::from("a"))])],
            ..Default::default()
        };
        let json = serde_json::to_string(&keys).unwrap();
        assert_eq!(json, r#"{"Keys":[{"pk":{"S":"a"}}]}"#);
    }

    #[test]
    fn test_should_serialize_write_request_variants() {
        let put = WriteRequest::put(Item::from([("pk".to_owned(), AttributeValue::from("a"))]));
        assert_eq!(
            serde_json::to_string(&put).unwrap(),
            r#"{"PutRequest":{"Item":{"pk":{"S":"a"}}}}"#
        );
        let delete =
            WriteRequest::delete(Key::from([("pk".to_owned(), AttributeValue::from("a"))]));
        assert_eq!(
            serde_json::to_string(&delete).unwrap(),
            r#"{"DeleteRequest":{"Key":{"pk":{"S":"a"}}}}"#
        );
    }

    #[test]
    fn test_should_sum_consumed_capacity() {
        let mut total = ConsumedCapacity {
            table_name: Some("t".to_owned()),
            capacity_units: Some(1.5),
            ..Default::default()
        };
        total.absorb(&ConsumedCapacity {
            table_name: Some("t".to_owned()),
            capacity_units: Some(2.0),
            write_capacity_units: Some(2.0),
            table: Some(Capacity {
                capacity_units: Some(2.0),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(total.capacity_units, Some(3.5));
        assert_eq!(total.write_capacity_units, Some(2.0));
        assert_eq!(total.read_capacity_units, None);
        assert_eq!(total.table.unwrap().capacity_units, Some(2.0));
    }
}
