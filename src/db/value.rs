// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Document field values.
//!
//! `Value` is a superset of what the store accepts: it can carry
//! `Undefined`, which the store rejects. Writes go through
//! [`normalize_fields`] first, which turns every `Undefined` into an
//! explicit `Null` at any depth.
//!
//! Timestamps and nulls serialize under Firestore's newtype tags, so the
//! Firestore serializer stores native timestamps and explicit nulls while
//! JSON sees an RFC3339 string and `null`.

use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Newtype name the Firestore serializer maps to a timestamp value.
const FIRESTORE_TIMESTAMP_TAG: &str = "FirestoreTimestamp";

/// Newtype name the Firestore serializer maps to an explicit null. A bare
/// unit would be dropped from the document instead.
const FIRESTORE_NULL_TAG: &str = "FirestoreNull";

/// Field name to value map, the body of a document.
pub type Fields = BTreeMap<String, Value>;

/// A single field value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// A field that was declared but never given a value.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<Value>),
    Map(Fields),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Copy of this value with every `Undefined` replaced by `Null`.
    pub fn normalized(&self) -> Value {
        match self {
            Value::Undefined => Value::Null,
            Value::Array(items) => Value::Array(items.iter().map(Value::normalized).collect()),
            Value::Map(fields) => Value::Map(normalize_fields(fields)),
            other => other.clone(),
        }
    }

    /// True if `Undefined` appears anywhere in this value.
    pub fn contains_undefined(&self) -> bool {
        match self {
            Value::Undefined => true,
            Value::Array(items) => items.iter().any(Value::contains_undefined),
            Value::Map(fields) => fields.values().any(Value::contains_undefined),
            _ => false,
        }
    }

    /// JSON rendering. `Undefined` becomes `null`, timestamps RFC3339 strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(t) => serde_json::Value::String(format_utc_rfc3339(*t)),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(fields) => serde_json::Value::Object(fields_to_json(fields)),
        }
    }

    /// Rank of the value's type in the store's cross-type ordering.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Undefined => 0,
            Value::Null => 1,
            Value::Bool(_) => 2,
            Value::Integer(_) | Value::Double(_) => 3,
            Value::Timestamp(_) => 4,
            Value::String(_) => 5,
            Value::Array(_) => 6,
            Value::Map(_) => 7,
        }
    }

    /// Total order used for sorting and range filters.
    ///
    /// Values of different types order by type rank; integers and doubles
    /// compare numerically.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Integer(a), Value::Double(b)) => (*a as f64).total_cmp(b),
            (Value::Double(a), Value::Integer(b)) => a.total_cmp(&(*b as f64)),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Map(a), Value::Map(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| va.compare(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    /// Store equality: numeric types compare by value.
    pub fn same_as(&self, other: &Value) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => {
                serializer.serialize_newtype_struct(FIRESTORE_NULL_TAG, &None::<()>)
            }
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::String(s) => serializer.serialize_str(s),
            Value::Timestamp(t) => serializer
                .serialize_newtype_struct(FIRESTORE_TIMESTAMP_TAG, &format_utc_rfc3339(*t)),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

// Timestamps read back as strings; the store has no way to tell them apart.
impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

/// Deep copy of `fields` with every `Undefined` leaf set to `Null`.
///
/// The input is left untouched.
pub fn normalize_fields(fields: &Fields) -> Fields {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), v.normalized()))
        .collect()
}

/// Render fields as a JSON object.
pub fn fields_to_json(fields: &Fields) -> serde_json::Map<String, serde_json::Value> {
    fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
}

/// Serialize any struct into document fields.
///
/// Fails if `value` doesn't serialize to a JSON object.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields, serde_json::Error> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => {
            Ok(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
        }
        other => Err(serde::ser::Error::custom(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Look up a possibly dotted field path (`postalAddress.city`).
pub fn lookup<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        match current {
            Value::Map(inner) => current = inner.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

/// Build a `Fields` map from `(name, value)` pairs.
#[macro_export]
macro_rules! fields {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut map = $crate::db::Fields::new();
        $( map.insert(($key).to_string(), $crate::db::Value::from($value)); )*
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_replaces_nested_undefined() {
        let mut address = Fields::new();
        address.insert("street".into(), Value::from("1 Main"));
        address.insert("street_2".into(), Value::Undefined);

        let mut input = Fields::new();
        input.insert("name".into(), Value::from("Acme"));
        input.insert("logo".into(), Value::Undefined);
        input.insert("postalAddress".into(), Value::Map(address));
        input.insert(
            "tags".into(),
            Value::Array(vec![Value::from("a"), Value::Undefined, Value::Null]),
        );
        let before = input.clone();

        let normalized = normalize_fields(&input);

        assert_eq!(input, before, "input must not be mutated");
        assert_eq!(normalized.get("logo"), Some(&Value::Null));
        assert_eq!(
            lookup(&normalized, "postalAddress.street_2"),
            Some(&Value::Null)
        );
        assert_eq!(
            normalized.get("tags"),
            Some(&Value::Array(vec![
                Value::from("a"),
                Value::Null,
                Value::Null
            ]))
        );
        assert_eq!(lookup(&normalized, "postalAddress.street"), Some(&Value::from("1 Main")));
        assert!(!Value::Map(normalized).contains_undefined());
    }

    #[test]
    fn test_compare_orders_across_types() {
        assert_eq!(Value::Null.compare(&Value::Bool(false)), Ordering::Less);
        assert_eq!(Value::Integer(2).compare(&Value::Double(1.5)), Ordering::Greater);
        assert!(Value::Integer(1).same_as(&Value::Double(1.0)));
        assert_eq!(Value::from("b").compare(&Value::from("a")), Ordering::Greater);
        assert_eq!(Value::Integer(9).compare(&Value::from("1")), Ordering::Less);
    }

    #[test]
    fn test_to_fields_rejects_non_objects() {
        assert!(to_fields(&vec![1, 2]).is_err());

        let fields = to_fields(&serde_json::json!({"weight": 3, "name": "x"})).unwrap();
        assert_eq!(fields.get("weight"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_fields_macro_and_json_rendering() {
        let fields = crate::fields! { "isActive" => true, "note" => Value::Undefined };
        let json = fields_to_json(&fields);
        assert_eq!(json["isActive"], serde_json::Value::Bool(true));
        assert_eq!(json["note"], serde_json::Value::Null);
    }

    #[test]
    fn test_tagged_values_serialize_plainly_in_json() {
        let at = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 3, 1, 9, 0, 0).unwrap();
        let json = serde_json::to_value(Value::Timestamp(at)).unwrap();
        assert_eq!(json, serde_json::json!("2024-03-01T09:00:00.000Z"));
        assert_eq!(serde_json::to_value(Value::Undefined).unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn test_deserialize_fields_from_json() {
        let fields: Fields =
            serde_json::from_str(r#"{"name":"Acme","tags":["a",null],"weight":2}"#).unwrap();
        assert_eq!(fields.get("name"), Some(&Value::from("Acme")));
        assert_eq!(
            fields.get("tags"),
            Some(&Value::Array(vec![Value::from("a"), Value::Null]))
        );
        assert_eq!(fields.get("weight"), Some(&Value::Integer(2)));
    }
}
