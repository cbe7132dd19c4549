//! Update operations and their compilation into an `UpdateExpression`.

use fluentdb_model::AttributeValue;

use super::compiled::{CompiledExpression, ExpressionSerializer};
use super::path::AttributePath;
use crate::error::{ClientError, ClientResult};

/// A single change to apply to an item.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOperation {
    /// Assign `value`, or only when the attribute is absent.
    Set {
        path: String,
        value: AttributeValue,
        if_not_exists: bool,
    },
    /// Remove the attribute.
    Remove { path: String },
    /// Add to a number, or union into a set.
    Add { path: String, value: AttributeValue },
    /// Remove elements from a set.
    Delete { path: String, value: AttributeValue },
    /// Append to the end of a list.
    Append { path: String, value: AttributeValue },
    /// Prepend to the front of a list.
    Prepend { path: String, value: AttributeValue },
    /// `path = path + value`.
    Increment { path: String, value: AttributeValue },
    /// `path = path - value`.
    Decrement { path: String, value: AttributeValue },
}

/// The wire action groups of an update expression, in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ActionGroup {
    Set,
    Add,
    Remove,
    Delete,
}

impl ActionGroup {
    const ALL: [Self; 4] = [Self::Set, Self::Add, Self::Remove, Self::Delete];

    fn keyword(self) -> &'static str {
        match self {
            Self::Set => "SET",
            Self::Add => "ADD",
            Self::Remove => "REMOVE",
            Self::Delete => "DELETE",
        }
    }
}

impl UpdateOperation {
    /// The attribute path this operation targets.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Set { path, .. }
            | Self::Remove { path }
            | Self::Add { path, .. }
            | Self::Delete { path, .. }
            | Self::Append { path, .. }
            | Self::Prepend { path, .. }
            | Self::Increment { path, .. }
            | Self::Decrement { path, .. } => path,
        }
    }

    fn group(&self) -> ActionGroup {
        match self {
            Self::Set { .. }
            | Self::Append { .. }
            | Self::Prepend { .. }
            | Self::Increment { .. }
            | Self::Decrement { .. } => ActionGroup::Set,
            Self::Add { .. } => ActionGroup::Add,
            Self::Remove { .. } => ActionGroup::Remove,
            Self::Delete { .. } => ActionGroup::Delete,
        }
    }

    /// Check the operation can be appended to an update.
    ///
    /// Set-valued `ADD`/`DELETE` and list `append`/`prepend` only work on
    /// top-level attributes.
    pub fn validate(&self) -> ClientResult<()> {
        let top_level_only = match self {
            Self::Add { value, .. } | Self::Delete { value, .. } => value.is_set(),
            Self::Append { .. } | Self::Prepend { .. } => true,
            _ => false,
        };
        let path = AttributePath::parse(self.path())?;
        if top_level_only && !path.is_top_level() {
            return Err(ClientError::Validation(format!(
                "{} on `{}` requires a top-level attribute",
                self.group().keyword(),
                self.path()
            )));
        }
        Ok(())
    }

    fn render(&self, s: &mut ExpressionSerializer) -> ClientResult<String> {
        let path = s.attribute_path(self.path())?;
        let text = match self {
            Self::Set {
                value,
                if_not_exists: false,
                ..
            } => format!("{path}={}", s.value(value.clone())),
            Self::Set {
                value,
                if_not_exists: true,
                ..
            } => format!("{path}=if_not_exists({path},{})", s.value(value.clone())),
            Self::Remove { .. } => path,
            Self::Add { value, .. } | Self::Delete { value, .. } => {
                format!("{path} {}", s.value(value.clone()))
            }
            Self::Append { value, .. } => {
                format!("{path}=list_append({path},{})", s.value(value.clone()))
            }
            Self::Prepend { value, .. } => {
                format!("{path}=list_append({},{path})", s.value(value.clone()))
            }
            Self::Increment { value, .. } => format!("{path}={path}+{}", s.value(value.clone())),
            Self::Decrement { value, .. } => format!("{path}={path}-{}", s.value(value.clone())),
        };
        Ok(text)
    }
}

/// An ordered list of update operations, validated as they are appended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Updates {
    operations: Vec<UpdateOperation>,
}

impl Updates {
    /// Validate and append `operation`.
    pub fn push(&mut self, operation: UpdateOperation) -> ClientResult<()> {
        operation.validate()?;
        self.operations.push(operation);
        Ok(())
    }

    /// Whether no operation has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// The operations in append order.
    #[must_use]
    pub fn operations(&self) -> &[UpdateOperation] {
        &self.operations
    }
}

/// Compile update operations with a fresh generator under `prefix`.
///
/// Operations are grouped by action (`SET`, `ADD`, `REMOVE`, `DELETE`) and
/// keep their relative order within a group.
pub fn compile_update(
    operations: &[UpdateOperation],
    prefix: &str,
) -> ClientResult<CompiledExpression> {
    let mut serializer = ExpressionSerializer::new(prefix);
    let mut text = String::new();
    for group in ActionGroup::ALL {
        let rendered = operations
            .iter()
            .filter(|op| op.group() == group)
            .map(|op| op.render(&mut serializer))
            .collect::<ClientResult<Vec<_>>>()?;
        if rendered.is_empty() {
            continue;
        }
        text.push(' ');
        text.push_str(group.keyword());
        text.push(' ');
        text.push_str(&rendered.join(", "));
    }
    Ok(serializer.finish(text.trim().to_owned()))
}
