//! Event payloads: a closed, recursively validated key/value container.
//!
//! The value set is a sum type, so platform objects can never be stored in a
//! payload. What remains to check at build time is what the type system cannot
//! express: non-empty keys, finite doubles and bounded nesting. Dynamic input
//! (`serde_json::Value`) is converted through [`Payload::from_json`], which
//! rejects anything outside the closed set with the offending key path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use assetlog_core::{
    CodecError, Decimal, DecimalWire, LedgerError, LedgerResult, decimal_to_wire, wire_to_decimal,
};

/// Maximum nesting of maps inside a payload (the top level counts as 1).
pub const MAX_DEPTH: usize = 32;

/// A single payload value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ValueRecord", try_from = "ValueRecord")]
pub enum PayloadValue {
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Bool(bool),
    Decimal(Decimal),
    List(Vec<String>),
    Map(Payload),
    Null,
}

impl PayloadValue {
    /// Wire tag of the value.
    pub fn kind(&self) -> &'static str {
        match self {
            PayloadValue::String(_) => "string",
            PayloadValue::Int32(_) => "int32",
            PayloadValue::Int64(_) => "int64",
            PayloadValue::Double(_) => "double",
            PayloadValue::Bool(_) => "bool",
            PayloadValue::Decimal(_) => "decimal",
            PayloadValue::List(_) => "list",
            PayloadValue::Map(_) => "map",
            PayloadValue::Null => "null",
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::String(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::String(value)
    }
}

impl From<i32> for PayloadValue {
    fn from(value: i32) -> Self {
        PayloadValue::Int32(value)
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        PayloadValue::Int64(value)
    }
}

impl From<f64> for PayloadValue {
    fn from(value: f64) -> Self {
        PayloadValue::Double(value)
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        PayloadValue::Bool(value)
    }
}

impl From<Decimal> for PayloadValue {
    fn from(value: Decimal) -> Self {
        PayloadValue::Decimal(value)
    }
}

impl From<Vec<String>> for PayloadValue {
    fn from(value: Vec<String>) -> Self {
        PayloadValue::List(value)
    }
}

impl From<Payload> for PayloadValue {
    fn from(value: Payload) -> Self {
        PayloadValue::Map(value)
    }
}

impl<T: Into<PayloadValue>> From<Option<T>> for PayloadValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PayloadValue::Null, Into::into)
    }
}

/// String-keyed payload map. Keys iterate in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload {
    entries: BTreeMap<String, PayloadValue>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PayloadValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PayloadValue>) -> Option<PayloadValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<PayloadValue> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(PayloadValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        match self.entries.get(key) {
            Some(PayloadValue::Int32(v)) => Some(*v),
            _ => None,
        }
    }

    /// 32-bit values widen to 64-bit.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.entries.get(key) {
            Some(PayloadValue::Int64(v)) => Some(*v),
            Some(PayloadValue::Int32(v)) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.entries.get(key) {
            Some(PayloadValue::Double(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.entries.get(key) {
            Some(PayloadValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_decimal(&self, key: &str) -> Option<Decimal> {
        match self.entries.get(key) {
            Some(PayloadValue::Decimal(v)) => Some(*v),
            _ => None,
        }
    }

    /// Absent keys read as an empty list.
    pub fn get_list(&self, key: &str) -> &[String] {
        match self.entries.get(key) {
            Some(PayloadValue::List(v)) => v,
            _ => &[],
        }
    }

    pub fn get_map(&self, key: &str) -> Option<&Payload> {
        match self.entries.get(key) {
            Some(PayloadValue::Map(v)) => Some(v),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PayloadValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Depth-first validation; fails on the first violation with its key path.
    pub fn validate(&self) -> LedgerResult<()> {
        validate_map(self, "", 1)
    }

    /// Convert dynamic JSON into a payload, rejecting values outside the closed set.
    ///
    /// Integers become `Int64`, other numbers `Double`, arrays must contain only
    /// strings, objects recurse and `null` stays `Null`.
    pub fn from_json(value: JsonValue) -> LedgerResult<Self> {
        match value {
            JsonValue::Object(map) => {
                let payload = object_to_payload(map, "", 1)?;
                payload.validate()?;
                Ok(payload)
            }
            other => Err(LedgerError::invalid_payload(
                "$",
                format!("payload must be an object, found {}", json_kind(&other)),
            )),
        }
    }
}

impl FromIterator<(String, PayloadValue)> for Payload {
    fn from_iter<I: IntoIterator<Item = (String, PayloadValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn validate_map(payload: &Payload, path: &str, depth: usize) -> LedgerResult<()> {
    if depth > MAX_DEPTH {
        return Err(LedgerError::invalid_payload(
            if path.is_empty() { "$" } else { path },
            format!("nesting deeper than {MAX_DEPTH} levels"),
        ));
    }

    for (key, value) in &payload.entries {
        let here = child_path(path, key);
        if key.is_empty() {
            return Err(LedgerError::invalid_payload(here, "keys must be non-empty"));
        }
        match value {
            PayloadValue::Double(v) if !v.is_finite() => {
                return Err(LedgerError::invalid_payload(here, format!("double must be finite, found {v}")));
            }
            PayloadValue::Map(nested) => validate_map(nested, &here, depth + 1)?,
            _ => {}
        }
    }
    Ok(())
}

fn object_to_payload(
    map: serde_json::Map<String, JsonValue>,
    path: &str,
    depth: usize,
) -> LedgerResult<Payload> {
    if depth > MAX_DEPTH {
        return Err(LedgerError::invalid_payload(
            if path.is_empty() { "$" } else { path },
            format!("nesting deeper than {MAX_DEPTH} levels"),
        ));
    }

    let mut payload = Payload::new();
    for (key, value) in map {
        let here = child_path(path, &key);
        let converted = json_to_value(value, &here, depth)?;
        payload.entries.insert(key, converted);
    }
    Ok(payload)
}

fn json_to_value(value: JsonValue, path: &str, depth: usize) -> LedgerResult<PayloadValue> {
    Ok(match value {
        JsonValue::Null => PayloadValue::Null,
        JsonValue::Bool(b) => PayloadValue::Bool(b),
        JsonValue::String(s) => PayloadValue::String(s),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                PayloadValue::Int64(i)
            } else if n.is_u64() {
                return Err(LedgerError::invalid_payload(path, format!("integer {n} exceeds int64")));
            } else {
                match n.as_f64() {
                    Some(f) => PayloadValue::Double(f),
                    None => return Err(LedgerError::invalid_payload(path, format!("unrepresentable number {n}"))),
                }
            }
        }
        JsonValue::Array(items) => {
            let mut list = Vec::with_capacity(items.len());
            for (idx, item) in items.into_iter().enumerate() {
                match item {
                    JsonValue::String(s) => list.push(s),
                    other => {
                        return Err(LedgerError::invalid_payload(
                            format!("{path}[{idx}]"),
                            format!("lists may only contain strings, found {}", json_kind(&other)),
                        ));
                    }
                }
            }
            PayloadValue::List(list)
        }
        JsonValue::Object(map) => PayloadValue::Map(object_to_payload(map, path, depth + 1)?),
    })
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Wire shape of a payload value: externally tagged, decimals as [`DecimalWire`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ValueRecord {
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Bool(bool),
    Decimal(DecimalWire),
    List(Vec<String>),
    Map(BTreeMap<String, ValueRecord>),
    Null,
}

impl From<PayloadValue> for ValueRecord {
    fn from(value: PayloadValue) -> Self {
        match value {
            PayloadValue::String(v) => ValueRecord::String(v),
            PayloadValue::Int32(v) => ValueRecord::Int32(v),
            PayloadValue::Int64(v) => ValueRecord::Int64(v),
            PayloadValue::Double(v) => ValueRecord::Double(v),
            PayloadValue::Bool(v) => ValueRecord::Bool(v),
            PayloadValue::Decimal(v) => ValueRecord::Decimal(decimal_to_wire(v)),
            PayloadValue::List(v) => ValueRecord::List(v),
            PayloadValue::Map(v) => {
                ValueRecord::Map(v.entries.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            PayloadValue::Null => ValueRecord::Null,
        }
    }
}

impl TryFrom<ValueRecord> for PayloadValue {
    type Error = CodecError;

    fn try_from(record: ValueRecord) -> Result<Self, Self::Error> {
        Ok(match record {
            ValueRecord::String(v) => PayloadValue::String(v),
            ValueRecord::Int32(v) => PayloadValue::Int32(v),
            ValueRecord::Int64(v) => PayloadValue::Int64(v),
            ValueRecord::Double(v) => PayloadValue::Double(v),
            ValueRecord::Bool(v) => PayloadValue::Bool(v),
            ValueRecord::Decimal(wire) => match wire_to_decimal(&wire)? {
                Some(d) => PayloadValue::Decimal(d),
                None => PayloadValue::Null,
            },
            ValueRecord::List(v) => PayloadValue::List(v),
            ValueRecord::Map(entries) => {
                let mut payload = Payload::new();
                for (k, v) in entries {
                    payload.entries.insert(k, PayloadValue::try_from(v)?);
                }
                PayloadValue::Map(payload)
            }
            ValueRecord::Null => PayloadValue::Null,
        })
    }
}

impl core::fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PayloadValue::String(v) => write!(f, "{v:?}"),
            PayloadValue::Int32(v) => write!(f, "{v}"),
            PayloadValue::Int64(v) => write!(f, "{v}"),
            PayloadValue::Double(v) => write!(f, "{v}"),
            PayloadValue::Bool(v) => write!(f, "{v}"),
            PayloadValue::Decimal(v) => write!(f, "{v}"),
            PayloadValue::List(v) => write!(f, "{v:?}"),
            PayloadValue::Map(v) => write!(f, "<map of {}>", v.len()),
            PayloadValue::Null => f.write_str("null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetlog_core::ValidationError;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn path_of(err: LedgerError) -> String {
        match err {
            LedgerError::Validation(ValidationError::InvalidPayloadValue { path, .. }) => path,
            other => panic!("expected InvalidPayloadValue, got {other:?}"),
        }
    }

    #[test]
    fn typed_getters_read_their_own_variant_only() {
        let payload = Payload::new()
            .with("name", "gold")
            .with("count", 5i32)
            .with("big", 5_000_000_000i64)
            .with("ratio", 0.5)
            .with("active", true)
            .with("price", dec!(19.99))
            .with("tags", vec!["a".to_string(), "b".to_string()])
            .with("nested", Payload::new().with("inner", 1i32))
            .with("nothing", PayloadValue::Null);

        assert!(payload.validate().is_ok());
        assert_eq!(payload.get_str("name"), Some("gold"));
        assert_eq!(payload.get_i32("count"), Some(5));
        assert_eq!(payload.get_i64("count"), Some(5));
        assert_eq!(payload.get_i64("big"), Some(5_000_000_000));
        assert_eq!(payload.get_i32("big"), None);
        assert_eq!(payload.get_f64("ratio"), Some(0.5));
        assert_eq!(payload.get_bool("active"), Some(true));
        assert_eq!(payload.get_decimal("price"), Some(dec!(19.99)));
        assert_eq!(payload.get_list("tags"), ["a", "b"]);
        assert!(payload.get_list("missing").is_empty());
        assert_eq!(payload.get_map("nested").and_then(|m| m.get_i32("inner")), Some(1));
        assert_eq!(payload.get("nothing"), Some(&PayloadValue::Null));
    }

    #[test]
    fn non_finite_double_is_rejected_with_its_path() {
        let payload = Payload::new().with("outer", Payload::new().with("bad", f64::NAN));
        assert_eq!(path_of(payload.validate().unwrap_err()), "outer.bad");
    }

    #[test]
    fn empty_keys_are_rejected() {
        let payload = Payload::new().with("", 1i32);
        assert!(payload.validate().is_err());
    }

    #[test]
    fn nesting_is_bounded() {
        let mut payload = Payload::new().with("leaf", 1i32);
        for _ in 0..MAX_DEPTH {
            payload = Payload::new().with("n", payload);
        }
        assert!(payload.validate().is_err());
    }

    #[test]
    fn json_arrays_must_hold_strings() {
        let err = Payload::from_json(json!({
            "ok": ["x"],
            "items": { "list": ["a", "b", 3] }
        }))
        .unwrap_err();
        assert_eq!(path_of(err), "items.list[2]");
    }

    #[test]
    fn json_numbers_map_to_int64_or_double() {
        let payload = Payload::from_json(json!({ "i": 7, "f": 1.25, "n": null, "s": "x" })).unwrap();
        assert_eq!(payload.get("i"), Some(&PayloadValue::Int64(7)));
        assert_eq!(payload.get("f"), Some(&PayloadValue::Double(1.25)));
        assert_eq!(payload.get("n"), Some(&PayloadValue::Null));
        assert_eq!(payload.get_str("s"), Some("x"));
    }

    #[test]
    fn json_rejects_unsigned_overflow_and_non_objects() {
        assert_eq!(path_of(Payload::from_json(json!({ "u": u64::MAX })).unwrap_err()), "u");
        assert_eq!(path_of(Payload::from_json(json!([1, 2])).unwrap_err()), "$");
    }

    #[test]
    fn wire_form_is_externally_tagged_with_decimal_wire() {
        let payload = Payload::new().with("delta", dec!(-2.50)).with("n", 3i32);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            json!({
                "delta": { "decimal": { "value": "-2.50", "scale": 2 } },
                "n": { "int32": 3 }
            })
        );
        let back: Payload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }
}
