//! Operation descriptions.
//!
//! One plain struct per operation kind, built with chainable setters. Shared
//! optional behaviour lives in the capability traits below; each operation
//! opts into the ones that make sense for it. Compilation into a wire input
//! goes through the crate-internal [`Compile`] trait, invoked by the
//! [`Store`](crate::Store).

mod batch;
mod item;
mod read;
mod transact;

pub use batch::{BatchGet, BatchWrite};
pub use item::{ConditionCheck, Delete, Get, Put, Update};
pub use read::{Query, Scan};
pub use transact::{MAX_TRANSACT_ITEMS, TransactGet, TransactItem, TransactWrite};

use fluentdb_model::AttributeValue;
use fluentdb_model::types::{Key, ReturnValue, ReturnValuesOnConditionCheckFailure};
use serde::Serialize;

use crate::error::{ClientError, ClientResult};
use crate::expression::{
    CompiledExpression, Condition, ExpressionBundle, ExpressionKind, UpdateOperation, Updates,
    compile_condition, compile_projection, compile_update,
};

/// Turns an operation description into its wire input.
pub(crate) trait Compile {
    /// The wire input type.
    type Input: Serialize;

    /// Validate and compile. Fails before anything is sent.
    fn compile(&self) -> ClientResult<Self::Input>;
}

/// Operations that support strongly consistent reads.
pub trait HasConsistentRead: Sized {
    #[doc(hidden)]
    fn consistent_read_slot(&mut self) -> &mut Option<bool>;

    /// Request a strongly consistent read.
    #[must_use]
    fn consistent_read(mut self, consistent: bool) -> Self {
        *self.consistent_read_slot() = Some(consistent);
        self
    }
}

/// Operations guarded by a condition expression.
pub trait HasCondition: Sized {
    #[doc(hidden)]
    fn condition_slot(&mut self) -> &mut Option<Condition>;

    #[doc(hidden)]
    fn on_condition_failure_slot(&mut self) -> &mut Option<ReturnValuesOnConditionCheckFailure>;

    /// Require `condition` to hold. Repeated calls are combined with `AND`.
    #[must_use]
    fn condition(mut self, condition: Condition) -> Self {
        let slot = self.condition_slot();
        *slot = Some(match slot.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// What to return when the condition fails.
    #[must_use]
    fn return_values_on_condition_check_failure(
        mut self,
        value: ReturnValuesOnConditionCheckFailure,
    ) -> Self {
        *self.on_condition_failure_slot() = Some(value);
        self
    }
}

/// Operations that can return item attributes.
pub trait HasReturnValues: Sized {
    #[doc(hidden)]
    fn return_values_slot(&mut self) -> &mut Option<ReturnValue>;

    /// Attributes to return after the write.
    #[must_use]
    fn return_values(mut self, value: ReturnValue) -> Self {
        *self.return_values_slot() = Some(value);
        self
    }
}

/// Operations that carry update actions.
///
/// Every setter validates its path immediately, so a malformed or disallowed
/// path fails at the call that introduces it.
pub trait HasUpdateOps: Sized {
    #[doc(hidden)]
    fn updates_slot(&mut self) -> &mut Updates;

    /// Append an arbitrary operation.
    fn apply(mut self, operation: UpdateOperation) -> ClientResult<Self> {
        self.updates_slot().push(operation)?;
        Ok(self)
    }

    /// `SET path = value`.
    fn set(self, path: impl Into<String>, value: impl Into<AttributeValue>) -> ClientResult<Self> {
        self.apply(UpdateOperation::Set {
            path: path.into(),
            value: value.into(),
            if_not_exists: false,
        })
    }

    /// `SET path = if_not_exists(path, value)`.
    fn set_if_not_exists(
        self,
        path: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> ClientResult<Self> {
        self.apply(UpdateOperation::Set {
            path: path.into(),
            value: value.into(),
            if_not_exists: true,
        })
    }

    /// `REMOVE path`.
    fn remove(self, path: impl Into<String>) -> ClientResult<Self> {
        self.apply(UpdateOperation::Remove { path: path.into() })
    }

    /// `ADD path value`.
    fn add(self, path: impl Into<String>, value: impl Into<AttributeValue>) -> ClientResult<Self> {
        self.apply(UpdateOperation::Add {
            path: path.into(),
            value: value.into(),
        })
    }

    /// `DELETE path value`, removing set elements.
    fn delete(
        self,
        path: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> ClientResult<Self> {
        self.apply(UpdateOperation::Delete {
            path: path.into(),
            value: value.into(),
        })
    }

    /// Append `value` (a list) to the end of the list at `path`.
    fn append(
        self,
        path: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> ClientResult<Self> {
        self.apply(UpdateOperation::Append {
            path: path.into(),
            value: value.into(),
        })
    }

    /// Prepend `value` (a list) to the front of the list at `path`.
    fn prepend(
        self,
        path: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> ClientResult<Self> {
        self.apply(UpdateOperation::Prepend {
            path: path.into(),
            value: value.into(),
        })
    }

    /// `SET path = path + value`.
    fn increment(
        self,
        path: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> ClientResult<Self> {
        self.apply(UpdateOperation::Increment {
            path: path.into(),
            value: value.into(),
        })
    }

    /// `SET path = path - value`.
    fn decrement(
        self,
        path: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> ClientResult<Self> {
        self.apply(UpdateOperation::Decrement {
            path: path.into(),
            value: value.into(),
        })
    }
}

/// A key has a partition component and at most one sort component.
pub(crate) fn validate_key(key: &Key) -> ClientResult<()> {
    match key.len() {
        1 | 2 => Ok(()),
        n => Err(ClientError::Validation(format!(
            "key must have one or two components, got {n}"
        ))),
    }
}

/// Compiles each expression of a request under its own prefix, then
/// optimizes them together.
#[derive(Debug, Default)]
pub(crate) struct BundleBuilder {
    bundle: ExpressionBundle,
}

impl BundleBuilder {
    pub(crate) fn condition(
        mut self,
        kind: ExpressionKind,
        condition: Option<&Condition>,
    ) -> ClientResult<Self> {
        if let Some(condition) = condition {
            self.push(kind, compile_condition(condition, kind.prefix())?);
        }
        Ok(self)
    }

    pub(crate) fn projection(mut self, paths: &[String]) -> ClientResult<Self> {
        let kind = ExpressionKind::Projection;
        self.push(kind, compile_projection(paths, kind.prefix())?);
        Ok(self)
    }

    pub(crate) fn update(mut self, updates: &Updates) -> ClientResult<Self> {
        let kind = ExpressionKind::Update;
        self.push(kind, compile_update(updates.operations(), kind.prefix())?);
        Ok(self)
    }

    fn push(&mut self, kind: ExpressionKind, expr: CompiledExpression) {
        self.bundle.insert(kind, expr);
    }

    pub(crate) fn finish(self) -> ExpressionBundle {
        self.bundle.optimize()
    }
}
