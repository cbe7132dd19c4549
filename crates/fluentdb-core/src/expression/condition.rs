//! Condition trees and their compilation.
//!
//! Conditions are immutable values built with the constructor functions in
//! this module and composed with [`and`], [`or`] and [`not`]. The same tree
//! serves as a `ConditionExpression`, `FilterExpression` or
//! `KeyConditionExpression` depending on where it is attached.

use std::fmt;

use fluentdb_model::AttributeValue;

use super::compiled::{CompiledExpression, ExpressionSerializer};
use crate::error::{ClientError, ClientResult};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (`=`).
    Eq,
    /// Not equal (`<>`).
    Ne,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
        }
    }
}

/// The left-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// An attribute path.
    Path(String),
    /// `size(path)`.
    Size(String),
}

impl From<&str> for Operand {
    fn from(path: &str) -> Self {
        Self::Path(path.to_owned())
    }
}

impl From<String> for Operand {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

/// Attribute type tags accepted by `attribute_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    /// `S`.
    String,
    /// `SS`.
    StringSet,
    /// `N`.
    Number,
    /// `NS`.
    NumberSet,
    /// `B`.
    Binary,
    /// `BS`.
    BinarySet,
    /// `BOOL`.
    Boolean,
    /// `NULL`.
    Null,
    /// `L`, an ordered list of values.
    List,
    /// `M`, a map of attribute names to values.
    Map,
}

impl AttributeType {
    /// The wire type descriptor.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "S",
            Self::StringSet => "SS",
            Self::Number => "N",
            Self::NumberSet => "NS",
            Self::Binary => "B",
            Self::BinarySet => "BS",
            Self::Boolean => "BOOL",
            Self::Null => "NULL",
            Self::List => "L",
            Self::Map => "M",
        }
    }
}

/// A condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// All children hold.
    And(Vec<Condition>),
    /// Any child holds.
    Or(Vec<Condition>),
    /// The child does not hold.
    Not(Box<Condition>),
    /// `subject op value`.
    Compare {
        subject: Operand,
        op: CompareOp,
        value: AttributeValue,
    },
    /// `subject BETWEEN low AND high`.
    Between {
        subject: Operand,
        low: AttributeValue,
        high: AttributeValue,
    },
    /// `subject IN (values..)`.
    In {
        subject: Operand,
        values: Vec<AttributeValue>,
    },
    /// `begins_with(path, prefix)`.
    BeginsWith { path: String, prefix: AttributeValue },
    /// `contains(path, operand)`.
    Contains {
        path: String,
        operand: AttributeValue,
    },
    /// `attribute_exists(path)`.
    AttributeExists(String),
    /// `attribute_not_exists(path)`.
    AttributeNotExists(String),
    /// `attribute_type(path, type)`.
    AttributeType { path: String, kind: AttributeType },
}

/// All of `conditions` hold.
pub fn and(conditions: impl IntoIterator<Item = Condition>) -> Condition {
    Condition::And(conditions.into_iter().collect())
}

/// Any of `conditions` holds.
pub fn or(conditions: impl IntoIterator<Item = Condition>) -> Condition {
    Condition::Or(conditions.into_iter().collect())
}

/// `condition` does not hold.
#[must_use]
pub fn not(condition: Condition) -> Condition {
    Condition::Not(Box::new(condition))
}

/// `size(path)` as a comparison subject.
pub fn size(path: impl Into<String>) -> Operand {
    Operand::Size(path.into())
}

fn compare(
    subject: impl Into<Operand>,
    op: CompareOp,
    value: impl Into<AttributeValue>,
) -> Condition {
    Condition::Compare {
        subject: subject.into(),
        op,
        value: value.into(),
    }
}

/// `subject = value`.
pub fn equals(subject: impl Into<Operand>, value: impl Into<AttributeValue>) -> Condition {
    compare(subject, CompareOp::Eq, value)
}

/// `subject <> value`.
pub fn not_equals(subject: impl Into<Operand>, value: impl Into<AttributeValue>) -> Condition {
    compare(subject, CompareOp::Ne, value)
}

/// `subject < value`.
pub fn less_than(subject: impl Into<Operand>, value: impl Into<AttributeValue>) -> Condition {
    compare(subject, CompareOp::Lt, value)
}

/// `subject <= value`.
pub fn less_than_or_equal(
    subject: impl Into<Operand>,
    value: impl Into<AttributeValue>,
) -> Condition {
    compare(subject, CompareOp::Le, value)
}

/// `subject > value`.
pub fn greater_than(subject: impl Into<Operand>, value: impl Into<AttributeValue>) -> Condition {
    compare(subject, CompareOp::Gt, value)
}

/// `subject >= value`.
pub fn greater_than_or_equal(
    subject: impl Into<Operand>,
    value: impl Into<AttributeValue>,
) -> Condition {
    compare(subject, CompareOp::Ge, value)
}

/// `subject BETWEEN low AND high`, inclusive.
pub fn between(
    subject: impl Into<Operand>,
    low: impl Into<AttributeValue>,
    high: impl Into<AttributeValue>,
) -> Condition {
    Condition::Between {
        subject: subject.into(),
        low: low.into(),
        high: high.into(),
    }
}

/// `subject IN (values..)`.
pub fn is_in<V: Into<AttributeValue>>(
    subject: impl Into<Operand>,
    values: impl IntoIterator<Item = V>,
) -> Condition {
    Condition::In {
        subject: subject.into(),
        values: values.into_iter().map(Into::into).collect(),
    }
}

/// `begins_with(path, prefix)`.
pub fn begins_with(path: impl Into<String>, prefix: impl Into<AttributeValue>) -> Condition {
    Condition::BeginsWith {
        path: path.into(),
        prefix: prefix.into(),
    }
}

/// `contains(path, operand)`.
pub fn contains(path: impl Into<String>, operand: impl Into<AttributeValue>) -> Condition {
    Condition::Contains {
        path: path.into(),
        operand: operand.into(),
    }
}

/// `attribute_exists(path)`.
pub fn attribute_exists(path: impl Into<String>) -> Condition {
    Condition::AttributeExists(path.into())
}

/// `attribute_not_exists(path)`.
pub fn attribute_not_exists(path: impl Into<String>) -> Condition {
    Condition::AttributeNotExists(path.into())
}

/// `attribute_type(path, kind)`.
pub fn attribute_type(path: impl Into<String>, kind: AttributeType) -> Condition {
    Condition::AttributeType {
        path: path.into(),
        kind,
    }
}

impl Condition {
    /// Combine with `other` under `AND`, flattening an existing top-level `AND`.
    #[must_use]
    pub fn and(self, other: Condition) -> Condition {
        match self {
            Self::And(mut children) => {
                children.push(other);
                Self::And(children)
            }
            first => Self::And(vec![first, other]),
        }
    }
}

/// Compile `condition` with a fresh generator under `prefix`.
pub fn compile_condition(condition: &Condition, prefix: &str) -> ClientResult<CompiledExpression> {
    let mut serializer = ExpressionSerializer::new(prefix);
    let text = render(condition, &mut serializer, 0)?;
    Ok(serializer.finish(text))
}

fn render_operand(operand: &Operand, s: &mut ExpressionSerializer) -> ClientResult<String> {
    match operand {
        Operand::Path(path) => s.attribute_path(path),
        Operand::Size(path) => Ok(format!("size({})", s.attribute_path(path)?)),
    }
}

fn render(
    condition: &Condition,
    s: &mut ExpressionSerializer,
    level: usize,
) -> ClientResult<String> {
    let text = match condition {
        Condition::And(children) | Condition::Or(children) => {
            let joiner = if matches!(condition, Condition::And(_)) {
                " AND "
            } else {
                " OR "
            };
            if children.is_empty() {
                return Err(ClientError::Validation(format!(
                    "{} needs at least one condition",
                    joiner.trim()
                )));
            }
            let parts = children
                .iter()
                .map(|c| render(c, s, level + 1))
                .collect::<ClientResult<Vec<_>>>()?;
            let joined = parts.join(joiner);
            if level > 0 && parts.len() > 1 {
                format!("({joined})")
            } else {
                joined
            }
        }
        Condition::Not(inner) => format!("NOT {}", render(inner, s, level + 1)?),
        Condition::Compare { subject, op, value } => {
            let lhs = render_operand(subject, s)?;
            format!("{lhs}{op}{}", s.value(value.clone()))
        }
        Condition::Between { subject, low, high } => {
            let lhs = render_operand(subject, s)?;
            let low = s.value(low.clone());
            let high = s.value(high.clone());
            format!("{lhs} BETWEEN {low} AND {high}")
        }
        Condition::In { subject, values } => {
            if values.is_empty() {
                return Err(ClientError::Validation(
                    "IN needs at least one value".to_owned(),
                ));
            }
            let lhs = render_operand(subject, s)?;
            let list = values
                .iter()
                .map(|v| s.value(v.clone()))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{lhs} IN ({list})")
        }
        Condition::BeginsWith { path, prefix } => {
            let path = s.attribute_path(path)?;
            format!("begins_with({path}, {})", s.value(prefix.clone()))
        }
        Condition::Contains { path, operand } => {
            let path = s.attribute_path(path)?;
            format!("contains({path}, {})", s.value(operand.clone()))
        }
        Condition::AttributeExists(path) => {
            format!("attribute_exists({})", s.attribute_path(path)?)
        }
        Condition::AttributeNotExists(path) => {
            format!("attribute_not_exists({})", s.attribute_path(path)?)
        }
        Condition::AttributeType { path, kind } => {
            let path = s.attribute_path(path)?;
            let kind = s.value(AttributeValue::S(kind.as_str().to_owned()));
            format!("attribute_type({path}, {kind})")
        }
    };
    Ok(text)
}
