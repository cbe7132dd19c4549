//! The DynamoDB `AttributeValue` and its conversions from native Rust values.
//!
//! On the wire an attribute value is a single-key object such as `{"S": "hello"}`
//! or `{"N": "42"}`. The `From` conversions in this module are the encoding
//! primitive used by expression builders: a caller hands a plain Rust value to a
//! condition or update constructor and it is encoded once, up front.

use std::collections::HashMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A typed DynamoDB attribute value.
///
/// Numbers are carried as strings to keep arbitrary precision. Equality and
/// hashing are structural, so two independently built values with the same
/// content compare equal. Neither map key order nor set element order
/// matters.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    /// String.
    S(String),
    /// Number (string-encoded).
    N(String),
    /// Binary.
    B(Bytes),
    /// String set.
    Ss(Vec<String>),
    /// Number set (string-encoded).
    Ns(Vec<String>),
    /// Binary set.
    Bs(Vec<Bytes>),
    /// Boolean.
    Bool(bool),
    /// Null marker.
    Null(bool),
    /// List.
    L(Vec<AttributeValue>),
    /// Map.
    M(HashMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Build a string set value.
    #[must_use]
    pub fn string_set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Ss(values.into_iter().map(Into::into).collect())
    }

    /// Build a number set value from anything that formats as a number.
    #[must_use]
    pub fn number_set<I, N>(values: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: ToString,
    {
        Self::Ns(values.into_iter().map(|n| n.to_string()).collect())
    }

    /// Build a binary set value.
    #[must_use]
    pub fn binary_set<I, B>(values: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self::Bs(values.into_iter().map(Into::into).collect())
    }

    /// The `NULL` value.
    #[must_use]
    pub fn null() -> Self {
        Self::Null(true)
    }

    /// Returns `true` for the three set variants (`SS`, `NS`, `BS`).
    #[must_use]
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Ss(_) | Self::Ns(_) | Self::Bs(_))
    }

    /// Returns `true` if this is a `NULL` value.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(true))
    }

    /// Returns the string if this is an `S` value.
    #[must_use]
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number string if this is an `N` value.
    #[must_use]
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the boolean if this is a `BOOL` value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the list if this is an `L` value.
    #[must_use]
    pub fn as_l(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::L(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the map if this is an `M` value.
    #[must_use]
    pub fn as_m(&self) -> Option<&HashMap<String, AttributeValue>> {
        match self {
            Self::M(m) => Some(m),
            _ => None,
        }
    }

    /// The type descriptor used on the wire and by `attribute_type(...)`.
    #[must_use]
    pub fn type_descriptor(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::Bs(_) => "BS",
            Self::Bool(_) => "BOOL",
            Self::Null(_) => "NULL",
            Self::L(_) => "L",
            Self::M(_) => "M",
        }
    }
}

/// Set elements in sorted order.
fn sorted<T: Ord>(values: &[T]) -> Vec<&T> {
    let mut sorted: Vec<&T> = values.iter().collect();
    sorted.sort_unstable();
    sorted
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::S(a), Self::S(b)) | (Self::N(a), Self::N(b)) => a == b,
            (Self::B(a), Self::B(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) | (Self::Null(a), Self::Null(b)) => a == b,
            (Self::Ss(a), Self::Ss(b)) | (Self::Ns(a), Self::Ns(b)) => sorted(a) == sorted(b),
            (Self::Bs(a), Self::Bs(b)) => sorted(a) == sorted(b),
            (Self::L(a), Self::L(b)) => a == b,
            (Self::M(a), Self::M(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AttributeValue {}

impl std::hash::Hash for AttributeValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::S(s) | Self::N(s) => s.hash(state),
            Self::B(b) => b.hash(state),
            Self::Bool(b) | Self::Null(b) => b.hash(state),
            Self::Ss(v) | Self::Ns(v) => sorted(v).hash(state),
            Self::Bs(v) => sorted(v).hash(state),
            Self::L(v) => v.hash(state),
            Self::M(m) => {
                // HashMap iteration order is random; hash entries in key order.
                let mut entries: Vec<_> = m.iter().collect();
                entries.sort_by_key(|(k, _)| *k);
                entries.hash(state);
            }
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(s) => write!(f, "{{S: {s}}}"),
            Self::N(n) => write!(f, "{{N: {n}}}"),
            Self::B(b) => write!(f, "{{B: {} bytes}}", b.len()),
            Self::Ss(v) => write!(f, "{{SS: {v:?}}}"),
            Self::Ns(v) => write!(f, "{{NS: {v:?}}}"),
            Self::Bs(v) => write!(f, "{{BS: {} items}}", v.len()),
            Self::Bool(b) => write!(f, "{{BOOL: {b}}}"),
            Self::Null(b) => write!(f, "{{NULL: {b}}}"),
            Self::L(v) => write!(f, "{{L: {} items}}", v.len()),
            Self::M(m) => write!(f, "{{M: {} keys}}", m.len()),
        }
    }
}

// ---------------------------------------------------------------------------
// Native conversions
// ---------------------------------------------------------------------------

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::S(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::S(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::N(value.to_string())
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for AttributeValue {
                fn from(value: $ty) -> Self {
                    Self::N(value.to_string())
                }
            }
        )*
    };
}

number_from!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl From<Bytes> for AttributeValue {
    fn from(value: Bytes) -> Self {
        Self::B(value)
    }
}

impl<T: Into<AttributeValue>> From<Vec<T>> for AttributeValue {
    fn from(values: Vec<T>) -> Self {
        Self::L(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<AttributeValue>> From<HashMap<String, T>> for AttributeValue {
    fn from(values: HashMap<String, T>) -> Self {
        Self::M(values.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(Self::null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::S(s) => map.serialize_entry("S", s)?,
            Self::N(n) => map.serialize_entry("N", n)?,
            Self::B(b) => map.serialize_entry("B", &BASE64.encode(b))?,
            Self::Ss(v) => map.serialize_entry("SS", v)?,
            Self::Ns(v) => map.serialize_entry("NS", v)?,
            Self::Bs(v) => {
                let encoded: Vec<String> = v.iter().map(|b| BASE64.encode(b)).collect();
                map.serialize_entry("BS", &encoded)?;
            }
            Self::Bool(b) => map.serialize_entry("BOOL", b)?,
            Self::Null(b) => map.serialize_entry("NULL", b)?,
            Self::L(list) => map.serialize_entry("L", list)?,
            Self::M(m) => map.serialize_entry("M", m)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(AttributeValueVisitor)
    }
}

struct AttributeValueVisitor;

impl<'de> Visitor<'de> for AttributeValueVisitor {
    type Value = AttributeValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an AttributeValue object with exactly one type key")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
        let Some(key) = map.next_key::<String>()? else {
            return Err(de::Error::custom("AttributeValue must have exactly one key"));
        };

        let value = match key.as_str() {
            "S" => AttributeValue::S(map.next_value()?),
            "N" => AttributeValue::N(map.next_value()?),
            "B" => {
                let encoded: String = map.next_value()?;
                AttributeValue::B(decode_binary(&encoded).map_err(de::Error::custom)?)
            }
            "SS" => AttributeValue::Ss(map.next_value()?),
            "NS" => AttributeValue::Ns(map.next_value()?),
            "BS" => {
                let encoded: Vec<String> = map.next_value()?;
                let decoded = encoded
                    .iter()
                    .map(|e| decode_binary(e))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(de::Error::custom)?;
                AttributeValue::Bs(decoded)
            }
            "BOOL" => AttributeValue::Bool(map.next_value()?),
            "NULL" => AttributeValue::Null(map.next_value()?),
            "L" => AttributeValue::L(map.next_value()?),
            "M" => AttributeValue::M(map.next_value()?),
            other => {
                return Err(de::Error::unknown_field(
                    other,
                    &["S", "N", "B", "SS", "NS", "BS", "BOOL", "NULL", "L", "M"],
                ));
            }
        };

        Ok(value)
    }
}

fn decode_binary(encoded: &str) -> Result<Bytes, base64::DecodeError> {
    BASE64.decode(encoded).map(Bytes::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_serialize_scalar_values() {
        let json = serde_json::to_string(&AttributeValue::from("hello")).unwrap();
        assert_eq!(json, r#"{"S":"hello"}"#);

        let json = serde_json::to_string(&AttributeValue::from(42_u32)).unwrap();
        assert_eq!(json, r#"{"N":"42"}"#);

        let json = serde_json::to_string(&AttributeValue::from(true)).unwrap();
        assert_eq!(json, r#"{"BOOL":true}"#);
    }

    #[test]
    fn test_should_encode_none_as_null() {
        let value = AttributeValue::from(None::<String>);
        assert!(value.is_null());
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"NULL":true}"#);
    }

    #[test]
    fn test_should_encode_vec_as_list() {
        let value = AttributeValue::from(vec!["a", "b"]);
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"L":[{"S":"a"},{"S":"b"}]}"#
        );
        assert!(!value.is_set());
    }

    #[test]
    fn test_should_build_sets() {
        assert!(AttributeValue::string_set(["x", "y"]).is_set());
        let ns = AttributeValue::number_set([1, 2, 3]);
        assert_eq!(ns, AttributeValue::Ns(vec!["1".into(), "2".into(), "3".into()]));
    }

    #[test]
    fn test_should_compare_maps_structurally() {
        let mut a = HashMap::new();
        a.insert("x".to_owned(), AttributeValue::from(1));
        a.insert("y".to_owned(), AttributeValue::from("two"));
        let mut b = HashMap::new();
        b.insert("y".to_owned(), AttributeValue::from("two"));
        b.insert("x".to_owned(), AttributeValue::from(1));

        let (a, b) = (AttributeValue::M(a), AttributeValue::M(b));
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_should_compare_sets_ignoring_element_order() {
        use std::hash::BuildHasher;

        let a = AttributeValue::string_set(["a", "b"]);
        let b = AttributeValue::string_set(["b", "a"]);
        assert_eq!(a, b);
        let hasher = std::collections::hash_map::RandomState::new();
        assert_eq!(hasher.hash_one(&a), hasher.hash_one(&b));

        assert_eq!(
            AttributeValue::binary_set([Bytes::from_static(b"1"), Bytes::from_static(b"2")]),
            AttributeValue::binary_set([Bytes::from_static(b"2"), Bytes::from_static(b"1")]),
        );
        assert_ne!(
            AttributeValue::string_set(["a", "b"]),
            AttributeValue::number_set([1, 2])
        );
        assert_ne!(
            AttributeValue::string_set(["a", "a"]),
            AttributeValue::string_set(["a"])
        );
    }

    #[test]
    fn test_should_roundtrip_binary_set() {
        let value = AttributeValue::binary_set([
            Bytes::from_static(b"one"),
            Bytes::from_static(b"two"),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        let parsed: AttributeValue = serde_json::from_str(&json).unwrap();
        assert_eq!(value, parsed);
    }

    #[test]
    fn test_should_reject_unknown_type_key() {
        let result: Result<AttributeValue, _> = serde_json::from_str(r#"{"X":"?"}"#);
        assert!(result.is_err());
    }
}
