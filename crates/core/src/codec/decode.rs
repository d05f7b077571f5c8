//! Decoding `EncodedValue` back into typed values
//!
//! `Decode` mirrors `Encode`. It also carries the type environment of a
//! value: `Decode::register` adds every tagged-object type reachable from
//! `Self` to a `TypeRegistry`, which the record store uses to decide whether
//! a stored object can still be reconstructed.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::{BuildHasher, Hash};
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use super::encode::{Bytes, Opaque};
use super::registry::TypeRegistry;
use crate::error::{CodecError, DecodeResult, TypeResolutionError};
use crate::limits::Limits;
use crate::value::EncodedValue;

/// Reconstructs a typed value from its encoded form
pub trait Decode: Sized {
    /// Decode `value`, descending through `decoder` for nested values
    fn decode(value: &EncodedValue, decoder: &mut Decoder) -> DecodeResult<Self>;

    /// Add every tagged-object type reachable from `Self` to `registry`
    ///
    /// The default is a no-op, correct for types that contain no objects.
    fn register(_registry: &mut TypeRegistry) {}
}

/// Decoding state: current depth against the configured limits
#[derive(Debug, Default)]
pub struct Decoder {
    limits: Limits,
    depth: usize,
}

impl Decoder {
    /// Create a decoder with custom limits
    pub fn new(limits: Limits) -> Self {
        Decoder { limits, depth: 0 }
    }

    /// Decode into any `Decode` type
    pub fn decode<T: Decode>(&mut self, value: &EncodedValue) -> DecodeResult<T> {
        T::decode(value, self)
    }

    /// Run `f` one nesting level deeper
    pub fn nested<T, F>(&mut self, f: F) -> DecodeResult<T>
    where
        F: FnOnce(&mut Self) -> DecodeResult<T>,
    {
        self.limits.check_depth(self.depth)?;
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Fields of a tagged object, checked against the expected type name
    ///
    /// An object of a different type is a `TypeResolutionError`; any other
    /// kind of value is a `CodecError`.
    pub fn object_fields<'v>(
        &mut self,
        value: &'v EncodedValue,
        type_name: &str,
    ) -> DecodeResult<&'v [(String, EncodedValue)]> {
        match value {
            EncodedValue::Object {
                type_name: stored,
                fields,
            } => {
                if stored != type_name {
                    return Err(TypeResolutionError::mismatch(stored.as_str(), type_name).into());
                }
                Ok(fields)
            }
            other => Err(CodecError::unexpected_kind("object", other.kind()).into()),
        }
    }

    /// Decode one named field out of an object's fields
    pub fn field<T: Decode>(
        &mut self,
        fields: &[(String, EncodedValue)],
        name: &str,
    ) -> DecodeResult<T> {
        let value = fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
            .ok_or_else(|| CodecError::Malformed(format!("missing field '{}'", name)))?;
        T::decode(value, self)
    }

    fn items<T: Decode>(&mut self, items: &[EncodedValue]) -> DecodeResult<Vec<T>> {
        self.nested(|dec| items.iter().map(|item| T::decode(item, dec)).collect())
    }
}

/// Decode a value with default limits
pub fn decode<T: Decode>(value: &EncodedValue) -> DecodeResult<T> {
    Decoder::default().decode(value)
}

fn sequence<'v>(value: &'v EncodedValue, expected: &'static str) -> DecodeResult<&'v [EncodedValue]> {
    match value {
        EncodedValue::List(items) | EncodedValue::Set(items) => Ok(items),
        other => Err(CodecError::unexpected_kind(expected, other.kind()).into()),
    }
}

fn entries(value: &EncodedValue) -> DecodeResult<&[(String, EncodedValue)]> {
    match value {
        EncodedValue::Map(entries) => Ok(entries),
        other => Err(CodecError::unexpected_kind("map", other.kind()).into()),
    }
}

fn parse_key<K: FromStr>(key: &str) -> DecodeResult<K> {
    key.parse()
        .map_err(|_| CodecError::Malformed(format!("cannot parse map key '{}'", key)).into())
}

// ============================================================================
// Primitive implementations
// ============================================================================

impl Decode for EncodedValue {
    fn decode(value: &EncodedValue, _: &mut Decoder) -> DecodeResult<Self> {
        Ok(value.clone())
    }
}

impl Decode for () {
    fn decode(value: &EncodedValue, _: &mut Decoder) -> DecodeResult<Self> {
        match value {
            EncodedValue::Null => Ok(()),
            other => Err(CodecError::unexpected_kind("null", other.kind()).into()),
        }
    }
}

impl Decode for bool {
    fn decode(value: &EncodedValue, _: &mut Decoder) -> DecodeResult<Self> {
        match value {
            EncodedValue::Bool(b) => Ok(*b),
            other => Err(CodecError::unexpected_kind("bool", other.kind()).into()),
        }
    }
}

macro_rules! decode_int {
    ($($t:ty),*) => {
        $(
            impl Decode for $t {
                fn decode(value: &EncodedValue, _: &mut Decoder) -> DecodeResult<Self> {
                    match value {
                        EncodedValue::Int(i) => <$t>::try_from(*i).map_err(|_| {
                            CodecError::Malformed(format!(
                                "{} is out of range for {}",
                                i,
                                stringify!($t)
                            ))
                            .into()
                        }),
                        // Wide integers that did not fit in i64
                        EncodedValue::Opaque { type_name, repr } if type_name == stringify!($t) => {
                            repr.parse::<$t>().map_err(|_| {
                                CodecError::Malformed(format!(
                                    "'{}' is not a valid {}",
                                    repr,
                                    stringify!($t)
                                ))
                                .into()
                            })
                        }
                        other => Err(CodecError::unexpected_kind("int", other.kind()).into()),
                    }
                }
            }
        )*
    };
}

decode_int!(i8, i16, i32, i64, isize, i128, u8, u16, u32, u64, usize, u128);

impl Decode for f64 {
    fn decode(value: &EncodedValue, _: &mut Decoder) -> DecodeResult<Self> {
        match value {
            EncodedValue::Float(f) => Ok(*f),
            EncodedValue::Int(i) => Ok(*i as f64),
            other => Err(CodecError::unexpected_kind("float", other.kind()).into()),
        }
    }
}

impl Decode for f32 {
    fn decode(value: &EncodedValue, decoder: &mut Decoder) -> DecodeResult<Self> {
        f64::decode(value, decoder).map(|f| f as f32)
    }
}

impl Decode for char {
    fn decode(value: &EncodedValue, _: &mut Decoder) -> DecodeResult<Self> {
        match value {
            EncodedValue::Str(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(CodecError::Malformed(format!(
                        "expected a single character, got {:?}",
                        s
                    ))
                    .into()),
                }
            }
            other => Err(CodecError::unexpected_kind("str", other.kind()).into()),
        }
    }
}

impl Decode for String {
    fn decode(value: &EncodedValue, _: &mut Decoder) -> DecodeResult<Self> {
        match value {
            EncodedValue::Str(s) => Ok(s.clone()),
            other => Err(CodecError::unexpected_kind("str", other.kind()).into()),
        }
    }
}

impl Decode for Bytes {
    fn decode(value: &EncodedValue, decoder: &mut Decoder) -> DecodeResult<Self> {
        match value {
            EncodedValue::Bytes(b) => Ok(Bytes(b.clone())),
            EncodedValue::List(_) => Vec::<u8>::decode(value, decoder).map(Bytes),
            other => Err(CodecError::unexpected_kind("bytes", other.kind()).into()),
        }
    }
}

/// Opaque values keep only a rendering, so they never decode
///
/// The impl exists so results and arguments wrapped in `Opaque` still meet
/// `Decode` bounds; only the registration half is ever used for them.
impl<T> Decode for Opaque<T> {
    fn decode(value: &EncodedValue, _: &mut Decoder) -> DecodeResult<Self> {
        match value {
            EncodedValue::Opaque { type_name, .. } => Err(CodecError::Malformed(format!(
                "opaque value of type {} cannot be rebuilt",
                type_name
            ))
            .into()),
            other => Err(CodecError::unexpected_kind("opaque", other.kind()).into()),
        }
    }
}

// ============================================================================
// Pointers and wrappers
// ============================================================================

impl<T: Decode> Decode for Option<T> {
    fn decode(value: &EncodedValue, decoder: &mut Decoder) -> DecodeResult<Self> {
        match value {
            EncodedValue::Null => Ok(None),
            other => T::decode(other, decoder).map(Some),
        }
    }

    fn register(registry: &mut TypeRegistry) {
        T::register(registry)
    }
}

macro_rules! decode_wrapper {
    ($($wrapper:ident => $ctor:expr),*) => {
        $(
            impl<T: Decode> Decode for $wrapper<T> {
                fn decode(value: &EncodedValue, decoder: &mut Decoder) -> DecodeResult<Self> {
                    T::decode(value, decoder).map($ctor)
                }

                fn register(registry: &mut TypeRegistry) {
                    T::register(registry)
                }
            }
        )*
    };
}

decode_wrapper!(Box => Box::new, Rc => Rc::new, Arc => Arc::new, RefCell => RefCell::new);

// ============================================================================
// Containers
// ============================================================================

impl<T: Decode> Decode for Vec<T> {
    fn decode(value: &EncodedValue, decoder: &mut Decoder) -> DecodeResult<Self> {
        let items = sequence(value, "list")?;
        decoder.items(items)
    }

    fn register(registry: &mut TypeRegistry) {
        T::register(registry)
    }
}

impl<T: Decode> Decode for VecDeque<T> {
    fn decode(value: &EncodedValue, decoder: &mut Decoder) -> DecodeResult<Self> {
        Vec::<T>::decode(value, decoder).map(VecDeque::from)
    }

    fn register(registry: &mut TypeRegistry) {
        T::register(registry)
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode(value: &EncodedValue, decoder: &mut Decoder) -> DecodeResult<Self> {
        let items = Vec::<T>::decode(value, decoder)?;
        let len = items.len();
        items.try_into().map_err(|_| {
            CodecError::Malformed(format!("expected {} elements, got {}", N, len)).into()
        })
    }

    fn register(registry: &mut TypeRegistry) {
        T::register(registry)
    }
}

impl<T, S> Decode for HashSet<T, S>
where
    T: Decode + Eq + Hash,
    S: BuildHasher + Default,
{
    fn decode(value: &EncodedValue, decoder: &mut Decoder) -> DecodeResult<Self> {
        let items = sequence(value, "set")?;
        decoder.items::<T>(items).map(|v| v.into_iter().collect())
    }

    fn register(registry: &mut TypeRegistry) {
        T::register(registry)
    }
}

impl<T: Decode + Ord> Decode for BTreeSet<T> {
    fn decode(value: &EncodedValue, decoder: &mut Decoder) -> DecodeResult<Self> {
        let items = sequence(value, "set")?;
        decoder.items::<T>(items).map(|v| v.into_iter().collect())
    }

    fn register(registry: &mut TypeRegistry) {
        T::register(registry)
    }
}

impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: FromStr + Eq + Hash,
    V: Decode,
    S: BuildHasher + Default,
{
    fn decode(value: &EncodedValue, decoder: &mut Decoder) -> DecodeResult<Self> {
        let entries = entries(value)?;
        decoder.nested(|dec| {
            entries
                .iter()
                .map(|(k, v)| -> DecodeResult<(K, V)> {
                    Ok((parse_key(k)?, V::decode(v, dec)?))
                })
                .collect()
        })
    }

    fn register(registry: &mut TypeRegistry) {
        V::register(registry)
    }
}

impl<K, V> Decode for BTreeMap<K, V>
where
    K: FromStr + Ord,
    V: Decode,
{
    fn decode(value: &EncodedValue, decoder: &mut Decoder) -> DecodeResult<Self> {
        let entries = entries(value)?;
        decoder.nested(|dec| {
            entries
                .iter()
                .map(|(k, v)| -> DecodeResult<(K, V)> {
                    Ok((parse_key(k)?, V::decode(v, dec)?))
                })
                .collect()
        })
    }

    fn register(registry: &mut TypeRegistry) {
        V::register(registry)
    }
}

macro_rules! decode_tuple {
    ($len:expr => $($name:ident),+) => {
        impl<$($name: Decode),+> Decode for ($($name,)+) {
            fn decode(value: &EncodedValue, decoder: &mut Decoder) -> DecodeResult<Self> {
                let items = match value {
                    EncodedValue::List(items) => items,
                    other => return Err(CodecError::unexpected_kind("list", other.kind()).into()),
                };
                if items.len() != $len {
                    return Err(CodecError::Malformed(format!(
                        "expected a tuple of {} elements, got {}",
                        $len,
                        items.len()
                    ))
                    .into());
                }
                decoder.nested(|dec| {
                    let mut iter = items.iter();
                    Ok(($(
                        match iter.next() {
                            Some(item) => $name::decode(item, dec)?,
                            None => unreachable!("length checked above"),
                        },
                    )+))
                })
            }

            fn register(registry: &mut TypeRegistry) {
                $($name::register(registry);)+
            }
        }
    };
}

decode_tuple!(1 => A);
decode_tuple!(2 => A, B);
decode_tuple!(3 => A, B, C);
decode_tuple!(4 => A, B, C, D);
decode_tuple!(5 => A, B, C, D, E);
decode_tuple!(6 => A, B, C, D, E, F);
decode_tuple!(7 => A, B, C, D, E, F, G);
decode_tuple!(8 => A, B, C, D, E, F, G, H);
