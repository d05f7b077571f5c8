//! Encoded value model
//!
//! This module defines:
//! - EncodedValue: the self-describing form of any runtime value
//!
//! Every value that is fingerprinted, persisted or compared goes through
//! `EncodedValue` first. The enum has exactly 11 variants:
//! - Null, Bool, Int, Float, Str, Bytes: primitives
//! - List: ordered sequence
//! - Set: unordered collection, compared order-independently
//! - Map: string-keyed mapping stored as ordered `(key, value)` pairs
//! - Object: tagged object, a type name plus ordered fields
//! - Opaque: comparison-only fallback for values without structure
//!
//! ## Float semantics
//!
//! `PartialEq` follows IEEE-754: `NaN != NaN`, `-0.0 == 0.0`. `NaN` and the
//! infinities serialize as the strings `"NaN"`, `"Infinity"` and
//! `"-Infinity"` so they survive a JSON round trip.
//!
//! ## Wire form
//!
//! Serialized adjacently tagged: `{"type": "int", "value": 3}`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Self-describing encoded value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EncodedValue {
    /// Null / absent value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point (IEEE-754)
    Float(#[serde(with = "float_repr")] f64),
    /// UTF-8 string
    Str(String),
    /// Raw bytes (base64 on the wire)
    Bytes(#[serde(with = "bytes_repr")] Vec<u8>),
    /// Ordered sequence
    List(Vec<EncodedValue>),
    /// Unordered collection
    Set(Vec<EncodedValue>),
    /// String-keyed mapping
    Map(Vec<(String, EncodedValue)>),
    /// Tagged object
    Object {
        /// Fully qualified type name
        type_name: String,
        /// Field name and value, in declaration order
        fields: Vec<(String, EncodedValue)>,
    },
    /// Comparison-only rendering of a value that exposes no structure
    Opaque {
        /// Type name of the original value
        type_name: String,
        /// `Debug` rendering of the original value
        repr: String,
    },
}

// Custom PartialEq implementation for IEEE-754 float semantics
impl PartialEq for EncodedValue {
    fn eq(&self, other: &Self) -> bool {
        use EncodedValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            // IEEE-754: NaN != NaN, -0.0 == 0.0
            (Float(a), Float(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (List(a), List(b)) | (Set(a), Set(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (
                Object {
                    type_name: ta,
                    fields: fa,
                },
                Object {
                    type_name: tb,
                    fields: fb,
                },
            ) => ta == tb && fa == fb,
            (
                Opaque {
                    type_name: ta,
                    repr: ra,
                },
                Opaque {
                    type_name: tb,
                    repr: rb,
                },
            ) => ta == tb && ra == rb,
            _ => false,
        }
    }
}

impl EncodedValue {
    /// Get the kind name as a string
    pub fn kind(&self) -> &'static str {
        match self {
            EncodedValue::Null => "null",
            EncodedValue::Bool(_) => "bool",
            EncodedValue::Int(_) => "int",
            EncodedValue::Float(_) => "float",
            EncodedValue::Str(_) => "str",
            EncodedValue::Bytes(_) => "bytes",
            EncodedValue::List(_) => "list",
            EncodedValue::Set(_) => "set",
            EncodedValue::Map(_) => "map",
            EncodedValue::Object { .. } => "object",
            EncodedValue::Opaque { .. } => "opaque",
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            EncodedValue::Null => 0,
            EncodedValue::Bool(_) => 1,
            EncodedValue::Int(_) => 2,
            EncodedValue::Float(_) => 3,
            EncodedValue::Str(_) => 4,
            EncodedValue::Bytes(_) => 5,
            EncodedValue::List(_) => 6,
            EncodedValue::Set(_) => 7,
            EncodedValue::Map(_) => 8,
            EncodedValue::Object { .. } => 9,
            EncodedValue::Opaque { .. } => 10,
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, EncodedValue::Null)
    }

    /// Check if this is an int or float value
    pub fn is_number(&self) -> bool {
        matches!(self, EncodedValue::Int(_) | EncodedValue::Float(_))
    }

    /// Get as i64 if this is an Int value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            EncodedValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float value, or an Int promoted to float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EncodedValue::Float(f) => Some(*f),
            EncodedValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as &str if this is a Str value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EncodedValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the elements if this is a List value
    pub fn as_list(&self) -> Option<&[EncodedValue]> {
        match self {
            EncodedValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a map entry or object field by name
    pub fn get(&self, key: &str) -> Option<&EncodedValue> {
        match self {
            EncodedValue::Map(entries) | EncodedValue::Object { fields: entries, .. } => {
                entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Type name if this is a tagged object
    pub fn object_type(&self) -> Option<&str> {
        match self {
            EncodedValue::Object { type_name, .. } => Some(type_name),
            _ => None,
        }
    }

    /// Build a map value from key/value pairs
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, EncodedValue)>,
    {
        EncodedValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a tagged object from a type name and fields
    pub fn object<K, I>(type_name: impl Into<String>, fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, EncodedValue)>,
    {
        EncodedValue::Object {
            type_name: type_name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Total order used for canonical forms
    ///
    /// Orders by kind first, then by content. Floats use `f64::total_cmp`, so
    /// the order is total even with NaN present.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        use EncodedValue::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Str(a), Str(b)) => a.cmp(b),
            (Bytes(a), Bytes(b)) => a.cmp(b),
            (List(a), List(b)) | (Set(a), Set(b)) => cmp_seq(a, b),
            (Map(a), Map(b)) => cmp_entries(a, b),
            (
                Object {
                    type_name: ta,
                    fields: fa,
                },
                Object {
                    type_name: tb,
                    fields: fb,
                },
            ) => ta.cmp(tb).then_with(|| cmp_entries(fa, fb)),
            (
                Opaque {
                    type_name: ta,
                    repr: ra,
                },
                Opaque {
                    type_name: tb,
                    repr: rb,
                },
            ) => ta.cmp(tb).then_with(|| ra.cmp(rb)),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }

    /// Canonical form: set elements sorted, map entries sorted by key
    ///
    /// Two values that differ only in map entry order or set element order
    /// have identical canonical forms. Lists and object fields keep their order.
    pub fn canonical(&self) -> EncodedValue {
        match self {
            EncodedValue::List(items) => {
                EncodedValue::List(items.iter().map(EncodedValue::canonical).collect())
            }
            EncodedValue::Set(items) => {
                let mut items: Vec<EncodedValue> =
                    items.iter().map(EncodedValue::canonical).collect();
                items.sort_by(EncodedValue::canonical_cmp);
                EncodedValue::Set(items)
            }
            EncodedValue::Map(entries) => {
                let mut entries: Vec<(String, EncodedValue)> = entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.canonical()))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                EncodedValue::Map(entries)
            }
            EncodedValue::Object { type_name, fields } => EncodedValue::Object {
                type_name: type_name.clone(),
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.canonical()))
                    .collect(),
            },
            other => other.clone(),
        }
    }
}

fn cmp_seq(a: &[EncodedValue], b: &[EncodedValue]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = x.canonical_cmp(y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn cmp_entries(a: &[(String, EncodedValue)], b: &[(String, EncodedValue)]) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b) {
        let ord = ka.cmp(kb).then_with(|| va.canonical_cmp(vb));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for EncodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodedValue::Null => f.write_str("null"),
            EncodedValue::Bool(b) => write!(f, "{}", b),
            EncodedValue::Int(i) => write!(f, "{}", i),
            EncodedValue::Float(x) => write!(f, "{:?}", x),
            EncodedValue::Str(s) => write!(f, "{:?}", s),
            EncodedValue::Bytes(b) => write!(f, "b\"{}\"", b.escape_ascii()),
            EncodedValue::List(items) => {
                f.write_str("[")?;
                write_joined(f, items.iter())?;
                f.write_str("]")
            }
            EncodedValue::Set(items) => {
                f.write_str("{")?;
                write_joined(f, items.iter())?;
                f.write_str("}")
            }
            EncodedValue::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?}: {}", k, v)?;
                }
                f.write_str("}")
            }
            EncodedValue::Object { type_name, fields } => {
                let short = type_name.rsplit("::").next().unwrap_or(type_name);
                write!(f, "{}(", short)?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                f.write_str(")")
            }
            EncodedValue::Opaque { repr, .. } => f.write_str(repr),
        }
    }
}

fn write_joined<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a EncodedValue>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

// ============================================================================
// From implementations for ergonomic construction
// ============================================================================

impl From<&str> for EncodedValue {
    fn from(s: &str) -> Self {
        EncodedValue::Str(s.to_string())
    }
}

impl From<String> for EncodedValue {
    fn from(s: String) -> Self {
        EncodedValue::Str(s)
    }
}

impl From<bool> for EncodedValue {
    fn from(b: bool) -> Self {
        EncodedValue::Bool(b)
    }
}

impl From<i64> for EncodedValue {
    fn from(i: i64) -> Self {
        EncodedValue::Int(i)
    }
}

impl From<i32> for EncodedValue {
    fn from(i: i32) -> Self {
        EncodedValue::Int(i as i64)
    }
}

impl From<f64> for EncodedValue {
    fn from(f: f64) -> Self {
        EncodedValue::Float(f)
    }
}

impl From<Vec<EncodedValue>> for EncodedValue {
    fn from(items: Vec<EncodedValue>) -> Self {
        EncodedValue::List(items)
    }
}

impl From<()> for EncodedValue {
    fn from(_: ()) -> Self {
        EncodedValue::Null
    }
}

// ============================================================================
// Serde helpers
// ============================================================================

mod float_repr {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if *value == f64::INFINITY {
            serializer.serialize_str("Infinity")
        } else if *value == f64::NEG_INFINITY {
            serializer.serialize_str("-Infinity")
        } else {
            serializer.serialize_f64(*value)
        }
    }

    struct FloatVisitor;

    impl<'de> Visitor<'de> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number or one of \"NaN\", \"Infinity\", \"-Infinity\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(FloatVisitor)
    }
}

mod bytes_repr {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(de::Error::custom)
    }
}
