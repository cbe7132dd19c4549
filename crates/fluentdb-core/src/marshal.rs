//! Conversions between serde types and attribute values.
//!
//! Goes through `serde_json::Value`: JSON numbers become `N`, strings `S`,
//! arrays `L`, objects `M` and `null` becomes `NULL`. Decoding maps sets to
//! arrays and binary to base64 strings.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use fluentdb_model::{AttributeValue, Item};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use crate::error::{ClientError, ClientResult};

fn invalid(err: impl std::fmt::Display) -> ClientError {
    ClientError::Validation(format!("cannot marshal value: {err}"))
}

/// Encode any serializable value.
pub fn to_attribute_value<T: Serialize + ?Sized>(value: &T) -> ClientResult<AttributeValue> {
    serde_json::to_value(value)
        .map(from_json)
        .map_err(invalid)
}

/// Encode a value that serializes to a map, such as a struct.
pub fn to_item<T: Serialize + ?Sized>(value: &T) -> ClientResult<Item> {
    match to_attribute_value(value)? {
        AttributeValue::M(item) => Ok(item),
        other => Err(ClientError::Validation(format!(
            "an item must encode to a map, got {}",
            other.type_descriptor()
        ))),
    }
}

/// Decode an attribute value into `T`.
pub fn from_attribute_value<T: DeserializeOwned>(value: AttributeValue) -> ClientResult<T> {
    serde_json::from_value(to_json(value)?).map_err(invalid)
}

/// Decode an item into `T`.
pub fn from_item<T: DeserializeOwned>(item: Item) -> ClientResult<T> {
    from_attribute_value(AttributeValue::M(item))
}

fn from_json(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s),
        Value::Array(values) => AttributeValue::L(values.into_iter().map(from_json).collect()),
        Value::Object(map) => {
            AttributeValue::M(map.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}

fn number(n: &str) -> ClientResult<Value> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(Value::from(i));
    }
    if let Ok(u) = n.parse::<u64>() {
        return Ok(Value::from(u));
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| invalid(format!("`{n}` is not a number")))
}

fn to_json(value: AttributeValue) -> ClientResult<Value> {
    Ok(match value {
        AttributeValue::S(s) => Value::String(s),
        AttributeValue::N(n) => number(&n)?,
        AttributeValue::B(b) => Value::String(BASE64.encode(b)),
        AttributeValue::Ss(set) => Value::Array(set.into_iter().map(Value::String).collect()),
        AttributeValue::Ns(set) => Value::Array(
            set.iter()
                .map(|n| number(n))
                .collect::<ClientResult<Vec<_>>>()?,
        ),
        AttributeValue::Bs(set) => Value::Array(
            set.into_iter()
                .map(|b| Value::String(BASE64.encode(b)))
                .collect(),
        ),
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(values) => Value::Array(
            values
                .into_iter()
                .map(to_json)
                .collect::<ClientResult<Vec<_>>>()?,
        ),
        AttributeValue::M(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| to_json(v).map(|v| (k, v)))
                .collect::<ClientResult<Map<_, _>>>()?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        pk: String,
        age: u32,
        score: f64,
        tags: Vec<String>,
        nickname: Option<String>,
    }

    fn user() -> User {
        User {
            pk: "u1".to_owned(),
            age: 42,
            score: 9.5,
            tags: vec!["a".to_owned(), "b".to_owned()],
            nickname: None,
        }
    }

    #[test]
    fn test_should_encode_struct_as_item() {
        let item = to_item(&user()).unwrap();
        assert_eq!(item["pk"], AttributeValue::from("u1"));
        assert_eq!(item["age"], AttributeValue::N("42".to_owned()));
        assert_eq!(item["score"], AttributeValue::N("9.5".to_owned()));
        assert_eq!(item["tags"], AttributeValue::from(vec!["a", "b"]));
        assert_eq!(item["nickname"], AttributeValue::Null(true));
    }

    #[test]
    fn test_should_decode_item_into_struct() {
        let item = to_item(&user()).unwrap();
        let decoded: User = from_item(item).unwrap();
        assert_eq!(decoded, user());
    }

    #[test]
    fn test_should_decode_sets_as_arrays() {
        let tags: Vec<String> =
            from_attribute_value(AttributeValue::string_set(["x", "y"])).unwrap();
        assert_eq!(tags, vec!["x", "y"]);
        let ns: Vec<i64> = from_attribute_value(AttributeValue::number_set([3, -1])).unwrap();
        assert_eq!(ns, vec![3, -1]);
    }

    #[test]
    fn test_should_reject_non_map_item() {
        assert!(matches!(to_item(&5), Err(ClientError::Validation(_))));
        let bad = AttributeValue::N("not-a-number".to_owned());
        assert!(from_attribute_value::<f64>(bad).is_err());
    }
}
