//! Single-item operations.

use fluentdb_model::input::{DeleteItemInput, GetItemInput, PutItemInput, UpdateItemInput};
use fluentdb_model::types::{
    self as wire, Item, Key, ReturnConsumedCapacity, ReturnItemCollectionMetrics, ReturnValue,
    ReturnValuesOnConditionCheckFailure,
};

use super::{
    BundleBuilder, Compile, HasCondition, HasConsistentRead, HasReturnValues, HasUpdateOps,
    validate_key,
};
use crate::error::{ClientError, ClientResult};
use crate::expression::{Condition, ExpressionKind, Updates};

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// Read one item by primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct Get {
    table: String,
    key: Key,
    projection: Vec<String>,
    consistent_read: Option<bool>,
    return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

impl Get {
    /// Get the item with `key` from `table`.
    pub fn new(table: impl Into<String>, key: Key) -> Self {
        Self {
            table: table.into(),
            key,
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

    /// The transactional form of this read.
    pub(crate) fn to_transact(&self) -> ClientResult<wire::Get> {
        let input = self.compile()?;
        Ok(wire::Get {
            table_name: input.table_name,
            key: input.key,
            projection_expression: input.projection_expression,
            expression_attribute_names: input.expression_attribute_names,
        })
    }
}

impl HasConsistentRead for Get {
    fn consistent_read_slot(&mut self) -> &mut Option<bool> {
        &mut self.consistent_read
    }
}

impl Compile for Get {
    type Input = GetItemInput;

    fn compile(&self) -> ClientResult<GetItemInput> {
        validate_key(&self.key)?;
        let mut bundle = BundleBuilder::default()
            .projection(&self.projection)?
            .finish();
        Ok(GetItemInput {
            table_name: self.table.clone(),
            key: self.key.clone(),
            consistent_read: self.consistent_read,
            projection_expression: bundle.take(ExpressionKind::Projection),
            expression_attribute_names: bundle.names,
            return_consumed_capacity: self.return_consumed_capacity,
        })
    }
}

// ---------------------------------------------------------------------------
// Put
// ---------------------------------------------------------------------------

/// Create or replace an item.
#[derive(Debug, Clone, PartialEq)]
pub struct Put {
    table: String,
    item: Item,
    condition: Option<Condition>,
    return_values: Option<ReturnValue>,
    on_condition_failure: Option<ReturnValuesOnConditionCheckFailure>,
    return_consumed_capacity: Option<ReturnConsumedCapacity>,
    return_item_collection_metrics: Option<ReturnItemCollectionMetrics>,
}

impl Put {
    /// Put `item` into `table`.
    pub fn new(table: impl Into<String>, item: Item) -> Self {
        Self {
            table: table.into(),
            item,
            condition: None,
            return_values: None,
            on_condition_failure: None,
            return_consumed_capacity: None,
            return_item_collection_metrics: None,
        }
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

    pub(crate) fn to_transact(&self) -> ClientResult<wire::Put> {
        let input = self.compile()?;
        Ok(wire::Put {
            table_name: input.table_name,
            item: input.item,
            condition_expression: input.condition_expression,
            expression_attribute_names: input.expression_attribute_names,
            expression_attribute_values: input.expression_attribute_values,
            return_values_on_condition_check_failure: input
                .return_values_on_condition_check_failure,
        })
    }
}

impl HasCondition for Put {
    fn condition_slot(&mut self) -> &mut Option<Condition> {
        &mut self.condition
    }

    fn on_condition_failure_slot(&mut self) -> &mut Option<ReturnValuesOnConditionCheckFailure> {
        &mut self.on_condition_failure
    }
}

impl HasReturnValues for Put {
    fn return_values_slot(&mut self) -> &mut Option<ReturnValue> {
        &mut self.return_values
    }
}

impl Compile for Put {
    type Input = PutItemInput;

    fn compile(&self) -> ClientResult<PutItemInput> {
        if self.item.is_empty() {
            return Err(ClientError::Validation("put item is empty".to_owned()));
        }
        let mut bundle = BundleBuilder::default()
            .condition(ExpressionKind::Condition, self.condition.as_ref())?
            .finish();
        Ok(PutItemInput {
            table_name: self.table.clone(),
            item: self.item.clone(),
            condition_expression: bundle.take(ExpressionKind::Condition),
            expression_attribute_names: bundle.names,
            expression_attribute_values: bundle.values,
            return_values: self.return_values,
            return_values_on_condition_check_failure: self.on_condition_failure,
            return_consumed_capacity: self.return_consumed_capacity,
            return_item_collection_metrics: self.return_item_collection_metrics,
        })
    }
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Modify attributes of an item, creating it if absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    table: String,
    key: Key,
    updates: Updates,
    condition: Option<Condition>,
    return_values: Option<ReturnValue>,
    on_condition_failure: Option<ReturnValuesOnConditionCheckFailure>,
    return_consumed_capacity: Option<ReturnConsumedCapacity>,
    return_item_collection_metrics: Option<ReturnItemCollectionMetrics>,
}

impl Update {
    /// Update the item with `key` in `table`.
    pub fn new(table: impl Into<String>, key: Key) -> Self {
        Self {
            table: table.into(),
            key,
            updates: Updates::default(),
            condition: None,
            return_values: None,
            on_condition_failure: None,
            return_consumed_capacity: None,
            return_item_collection_metrics: None,
        }
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

    pub(crate) fn to_transact(&self) -> ClientResult<wire::Update> {
        let input = self.compile()?;
        Ok(wire::Update {
            table_name: input.table_name,
            key: input.key,
            update_expression: input.update_expression.unwrap_or_default(),
            condition_expression: input.condition_expression,
            expression_attribute_names: input.expression_attribute_names,
            expression_attribute_values: input.expression_attribute_values,
            return_values_on_condition_check_failure: input
                .return_values_on_condition_check_failure,
        })
    }
}

impl HasCondition for Update {
    fn condition_slot(&mut self) -> &mut Option<Condition> {
        &mut self.condition
    }

    fn on_condition_failure_slot(&mut self) -> &mut Option<ReturnValuesOnConditionCheckFailure> {
        &mut self.on_condition_failure
    }
}

impl HasReturnValues for Update {
    fn return_values_slot(&mut self) -> &mut Option<ReturnValue> {
        &mut self.return_values
    }
}

impl HasUpdateOps for Update {
    fn updates_slot(&mut self) -> &mut Updates {
        &mut self.updates
    }
}

impl Compile for Update {
    type Input = UpdateItemInput;

    fn compile(&self) -> ClientResult<UpdateItemInput> {
        validate_key(&self.key)?;
        if self.updates.is_empty() {
            return Err(ClientError::Validation(
                "update has no operations".to_owned(),
            ));
        }
        let mut bundle = BundleBuilder::default()
            .update(&self.updates)?
            .condition(ExpressionKind::Condition, self.condition.as_ref())?
            .finish();
        Ok(UpdateItemInput {
            table_name: self.table.clone(),
            key: self.key.clone(),
            update_expression: bundle.take(ExpressionKind::Update),
            condition_expression: bundle.take(ExpressionKind::Condition),
            expression_attribute_names: bundle.names,
            expression_attribute_values: bundle.values,
            return_values: self.return_values,
            return_values_on_condition_check_failure: self.on_condition_failure,
            return_consumed_capacity: self.return_consumed_capacity,
            return_item_collection_metrics: self.return_item_collection_metrics,
        })
    }
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// Delete one item by primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    table: String,
    key: Key,
    condition: Option<Condition>,
    return_values: Option<ReturnValue>,
    on_condition_failure: Option<ReturnValuesOnConditionCheckFailure>,
    return_consumed_capacity: Option<ReturnConsumedCapacity>,
    return_item_collection_metrics: Option<ReturnItemCollectionMetrics>,
}

impl Delete {
    /// Delete the item with `key` from `table`.
    pub fn new(table: impl Into<String>, key: Key) -> Self {
        Self {
            table: table.into(),
            key,
            condition: None,
            return_values: None,
            on_condition_failure: None,
            return_consumed_capacity: None,
            return_item_collection_metrics: None,
        }
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

    pub(crate) fn to_transact(&self) -> ClientResult<wire::Delete> {
        let input = self.compile()?;
        Ok(wire::Delete {
            table_name: input.table_name,
            key: input.key,
            condition_expression: input.condition_expression,
            expression_attribute_names: input.expression_attribute_names,
            expression_attribute_values: input.expression_attribute_values,
            return_values_on_condition_check_failure: input
                .return_values_on_condition_check_failure,
        })
    }
}

impl HasCondition for Delete {
    fn condition_slot(&mut self) -> &mut Option<Condition> {
        &mut self.condition
    }

    fn on_condition_failure_slot(&mut self) -> &mut Option<ReturnValuesOnConditionCheckFailure> {
        &mut self.on_condition_failure
    }
}

impl HasReturnValues for Delete {
    fn return_values_slot(&mut self) -> &mut Option<ReturnValue> {
        &mut self.return_values
    }
}

impl Compile for Delete {
    type Input = DeleteItemInput;

    fn compile(&self) -> ClientResult<DeleteItemInput> {
        validate_key(&self.key)?;
        let mut bundle = BundleBuilder::default()
            .condition(ExpressionKind::Condition, self.condition.as_ref())?
            .finish();
        Ok(DeleteItemInput {
            table_name: self.table.clone(),
            key: self.key.clone(),
            condition_expression: bundle.take(ExpressionKind::Condition),
            expression_attribute_names: bundle.names,
            expression_attribute_values: bundle.values,
            return_values: self.return_values,
            return_values_on_condition_check_failure: self.on_condition_failure,
            return_consumed_capacity: self.return_consumed_capacity,
            return_item_collection_metrics: self.return_item_collection_metrics,
        })
    }
}

// ---------------------------------------------------------------------------
// ConditionCheck
// ---------------------------------------------------------------------------

/// A condition on an item that a transaction requires but does not write.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionCheck {
    table: String,
    key: Key,
    condition: Option<Condition>,
    on_condition_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

impl ConditionCheck {
    /// Require `condition` on the item with `key` in `table`.
    pub fn new(table: impl Into<String>, key: Key, condition: Condition) -> Self {
        Self {
            table: table.into(),
            key,
            condition: Some(condition),
            on_condition_failure: None,
        }
    }

    pub(crate) fn to_transact(&self) -> ClientResult<wire::ConditionCheck> {
        validate_key(&self.key)?;
        let mut bundle = BundleBuilder::default()
            .condition(ExpressionKind::Condition, self.condition.as_ref())?
            .finish();
        let condition_expression = bundle.take(ExpressionKind::Condition).ok_or_else(|| {
            ClientError::Validation("condition check has no condition".to_owned())
        })?;
        Ok(wire::ConditionCheck {
            table_name: self.table.clone(),
            key: self.key.clone(),
            condition_expression,
            expression_attribute_names: bundle.names,
            expression_attribute_values: bundle.values,
            return_values_on_condition_check_failure: self.on_condition_failure,
        })
    }
}

impl HasCondition for ConditionCheck {
    fn condition_slot(&mut self) -> &mut Option<Condition> {
        &mut self.condition
    }

    fn on_condition_failure_slot(&mut self) -> &mut Option<ReturnValuesOnConditionCheckFailure> {
        &mut self.on_condition_failure
    }
}

#[cfg(test)]
mod tests {
    use fluentdb_model::AttributeValue;

    use super::*;
    use crate::expression::condition::{and, attribute_not_exists, equals, greater_than};
    use crate::test_support::item;

    #[test]
    fn test_should_compile_get_with_projection() {
        let input = Get::new("users", item("u1"))
            .project(["name", "email", "name"])
            .consistent_read(true)
            .compile()
            .unwrap();
        assert_eq!(input.projection_expression.as_deref(), Some("#n0, #n1"));
        assert_eq!(input.expression_attribute_names["#n0"], "name");
        assert_eq!(input.consistent_read, Some(true));
    }

    #[test]
    fn test_should_omit_expression_fields_without_expressions() {
        let input = Get::new("users", item("u1")).compile().unwrap();
        let json = serde_json::to_value(&input).unwrap();
        assert!(json.get("ProjectionExpression").is_none());
        assert!(json.get("ExpressionAttributeNames").is_none());
    }

    #[test]
    fn test_should_compile_conditional_put() {
        let mut doc = item("u1");
        doc.insert("age".to_owned(), AttributeValue::from(30));
        let input = Put::new("users", doc)
            .condition(attribute_not_exists("pk"))
            .return_values(ReturnValue::AllOld)
            .compile()
            .unwrap();
        assert_eq!(
            input.condition_expression.as_deref(),
            Some("attribute_not_exists(#n0)")
        );
        assert!(input.expression_attribute_values.is_empty());
        let json = serde_json::to_value(&input).unwrap();
        assert!(json.get("ExpressionAttributeValues").is_none());
        assert_eq!(json["ReturnValues"], "ALL_OLD");
    }

    #[test]
    fn test_should_share_placeholders_between_update_and_condition() {
        let input = Update::new("users", item("u1"))
            .set("status", "active")
            .unwrap()
            .increment("logins", 1)
            .unwrap()
            .condition(and([equals("status", "pending"), greater_than("logins", 1)]))
            .compile()
            .unwrap();
        assert_eq!(
            input.update_expression.as_deref(),
            Some("SET #n0=:v0, #n1=#n1+:v1")
        );
        assert_eq!(
            input.condition_expression.as_deref(),
            Some("#n0=:v2 AND #n1>:v1")
        );
        assert_eq!(input.expression_attribute_names.len(), 2);
        assert_eq!(input.expression_attribute_values.len(), 3);
    }

    #[test]
    fn test_should_reject_update_without_operations() {
        let err = Update::new("users", item("u1")).compile().unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn test_should_reject_nested_append_when_added() {
        let err = Update::new("users", item("u1"))
            .append("profile.history", vec!["login"])
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn test_should_reject_bad_key_before_sending() {
        let err = Delete::new("users", Key::new()).compile().unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn test_should_and_repeated_conditions() {
        let input = Delete::new("users", item("u1"))
            .condition(equals("a", 1))
            .condition(equals("b", 2))
            .compile()
            .unwrap();
        assert_eq!(
            input.condition_expression.as_deref(),
            Some("#n0=:v0 AND #n1=:v1")
        );
    }
}
