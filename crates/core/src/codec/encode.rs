//! Encoding runtime values into `EncodedValue`
//!
//! `Encode` is implemented for primitives, strings, standard containers,
//! smart pointers and tuples. User-defined structs get it through
//! `inspect_object!`, which routes through `Encoder::encode_object` so cycle
//! detection and the depth bound apply to every object graph.
//!
//! Hash-ordered containers (`HashMap`, `HashSet`) are emitted in canonical
//! order so the same value always encodes to the same bytes, whatever the
//! hasher state of the current process.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::{Debug, Display};
use std::rc::Rc;
use std::sync::Arc;

use super::inspect::Inspect;
use crate::error::{CodecError, CodecResult};
use crate::limits::Limits;
use crate::value::EncodedValue;

/// Converts a value into its encoded form
///
/// Object safe, so structs can expose their fields as `&dyn Encode`.
pub trait Encode {
    /// Encode `self`, descending through `encoder` for nested values
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue>;
}

/// Encoding state: depth and the chain of objects currently being encoded
#[derive(Debug, Default)]
pub struct Encoder {
    limits: Limits,
    depth: usize,
    active: Vec<(usize, &'static str)>,
}

impl Encoder {
    /// Create an encoder with custom limits
    pub fn new(limits: Limits) -> Self {
        Encoder {
            limits,
            depth: 0,
            active: Vec::new(),
        }
    }

    /// Encode any value
    pub fn encode<T: Encode + ?Sized>(&mut self, value: &T) -> CodecResult<EncodedValue> {
        value.encode(self)
    }

    /// Run `f` one nesting level deeper
    pub fn nested<F>(&mut self, f: F) -> CodecResult<EncodedValue>
    where
        F: FnOnce(&mut Self) -> CodecResult<EncodedValue>,
    {
        self.limits.check_depth(self.depth)?;
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Encode a sequence of items as a `List`
    pub fn encode_list<'a, T, I>(&mut self, items: I) -> CodecResult<EncodedValue>
    where
        T: Encode + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        self.nested(|enc| {
            let items = items
                .into_iter()
                .map(|item| item.encode(enc))
                .collect::<CodecResult<Vec<_>>>()?;
            Ok(EncodedValue::List(items))
        })
    }

    /// Encode a collection as a `Set`, elements in canonical order
    pub fn encode_set<'a, T, I>(&mut self, items: I) -> CodecResult<EncodedValue>
    where
        T: Encode + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        self.nested(|enc| {
            let mut items = items
                .into_iter()
                .map(|item| item.encode(enc))
                .collect::<CodecResult<Vec<_>>>()?;
            items.sort_by(EncodedValue::canonical_cmp);
            Ok(EncodedValue::Set(items))
        })
    }

    /// Encode key/value pairs as a `Map`, keys coerced to strings
    ///
    /// With `sort_keys` the entries are ordered by their string key.
    pub fn encode_map<'a, K, V, I>(&mut self, entries: I, sort_keys: bool) -> CodecResult<EncodedValue>
    where
        K: Display + 'a,
        V: Encode + 'a,
        I: IntoIterator<Item = (&'a K, &'a V)>,
    {
        self.nested(|enc| {
            let mut entries = entries
                .into_iter()
                .map(|(k, v)| -> CodecResult<(String, EncodedValue)> {
                    Ok((k.to_string(), v.encode(enc)?))
                })
                .collect::<CodecResult<Vec<_>>>()?;
            if sort_keys {
                entries.sort_by(|a, b| a.0.cmp(&b.0));
            }
            Ok(EncodedValue::Map(entries))
        })
    }

    /// Encode a structurally inspectable value as a tagged object
    ///
    /// Fails with `CodecError::Cycle` if the same object (by address and
    /// type) is already being encoded further up the chain.
    pub fn encode_object<T: Inspect + ?Sized>(&mut self, value: &T) -> CodecResult<EncodedValue> {
        let key = (value as *const T as *const () as usize, T::TYPE_NAME);
        if self.active.contains(&key) {
            return Err(CodecError::Cycle {
                type_name: T::TYPE_NAME.to_string(),
            });
        }

        self.active.push(key);
        let result = self.nested(|enc| {
            let fields = value
                .fields()
                .into_iter()
                .map(|(name, field)| -> CodecResult<(String, EncodedValue)> {
                    Ok((name.to_string(), field.encode(enc)?))
                })
                .collect::<CodecResult<Vec<_>>>()?;
            Ok(EncodedValue::Object {
                type_name: T::TYPE_NAME.to_string(),
                fields,
            })
        });
        self.active.pop();
        result
    }
}

/// Encode a value with default limits
pub fn encode<T: Encode + ?Sized>(value: &T) -> CodecResult<EncodedValue> {
    Encoder::default().encode(value)
}

// ============================================================================
// Wrappers
// ============================================================================

/// Byte buffer encoded as `EncodedValue::Bytes` instead of a list of ints
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Bytes(pub Vec<u8>);

impl Encode for Bytes {
    fn encode(&self, _: &mut Encoder) -> CodecResult<EncodedValue> {
        Ok(EncodedValue::Bytes(self.0.clone()))
    }
}

/// Comparison-only encoding for values that expose no structure
///
/// Stores the type name and the `Debug` rendering. Two opaque values match
/// only if both are identical.
#[derive(Debug, Clone, PartialEq)]
pub struct Opaque<T>(pub T);

impl<T: Debug> Encode for Opaque<T> {
    fn encode(&self, _: &mut Encoder) -> CodecResult<EncodedValue> {
        Ok(EncodedValue::Opaque {
            type_name: std::any::type_name::<T>().to_string(),
            repr: format!("{:?}", self.0),
        })
    }
}

// ============================================================================
// Primitive implementations
// ============================================================================

impl Encode for EncodedValue {
    fn encode(&self, _: &mut Encoder) -> CodecResult<EncodedValue> {
        Ok(self.clone())
    }
}

impl Encode for () {
    fn encode(&self, _: &mut Encoder) -> CodecResult<EncodedValue> {
        Ok(EncodedValue::Null)
    }
}

impl Encode for bool {
    fn encode(&self, _: &mut Encoder) -> CodecResult<EncodedValue> {
        Ok(EncodedValue::Bool(*self))
    }
}

macro_rules! encode_lossless_int {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn encode(&self, _: &mut Encoder) -> CodecResult<EncodedValue> {
                    Ok(EncodedValue::Int(i64::from(*self)))
                }
            }
        )*
    };
}

encode_lossless_int!(i8, i16, i32, i64, u8, u16, u32);

// Values outside the i64 range fall back to an opaque decimal rendering
macro_rules! encode_wide_int {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn encode(&self, _: &mut Encoder) -> CodecResult<EncodedValue> {
                    Ok(match i64::try_from(*self) {
                        Ok(i) => EncodedValue::Int(i),
                        Err(_) => EncodedValue::Opaque {
                            type_name: stringify!($t).to_string(),
                            repr: self.to_string(),
                        },
                    })
                }
            }
        )*
    };
}

encode_wide_int!(u64, usize, isize, i128, u128);

impl Encode for f32 {
    fn encode(&self, _: &mut Encoder) -> CodecResult<EncodedValue> {
        Ok(EncodedValue::Float(f64::from(*self)))
    }
}

impl Encode for f64 {
    fn encode(&self, _: &mut Encoder) -> CodecResult<EncodedValue> {
        Ok(EncodedValue::Float(*self))
    }
}

impl Encode for char {
    fn encode(&self, _: &mut Encoder) -> CodecResult<EncodedValue> {
        Ok(EncodedValue::Str(self.to_string()))
    }
}

impl Encode for str {
    fn encode(&self, _: &mut Encoder) -> CodecResult<EncodedValue> {
        Ok(EncodedValue::Str(self.to_string()))
    }
}

impl Encode for String {
    fn encode(&self, _: &mut Encoder) -> CodecResult<EncodedValue> {
        Ok(EncodedValue::Str(self.clone()))
    }
}

// ============================================================================
// Pointers and wrappers
// ============================================================================

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue> {
        (**self).encode(encoder)
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue> {
        (**self).encode(encoder)
    }
}

impl<T: Encode + ?Sized> Encode for Rc<T> {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue> {
        (**self).encode(encoder)
    }
}

impl<T: Encode + ?Sized> Encode for Arc<T> {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue> {
        (**self).encode(encoder)
    }
}

impl<T: Encode + ?Sized> Encode for RefCell<T> {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue> {
        let inner = self
            .try_borrow()
            .map_err(|_| CodecError::Unencodable("RefCell is mutably borrowed".to_string()))?;
        (*inner).encode(encoder)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue> {
        match self {
            Some(value) => value.encode(encoder),
            None => Ok(EncodedValue::Null),
        }
    }
}

// ============================================================================
// Containers
// ============================================================================

impl<T: Encode> Encode for [T] {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue> {
        encoder.encode_list(self)
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue> {
        encoder.encode_list(self)
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue> {
        encoder.encode_list(self)
    }
}

impl<T: Encode> Encode for VecDeque<T> {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue> {
        encoder.encode_list(self)
    }
}

impl<T: Encode, S> Encode for HashSet<T, S> {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue> {
        encoder.encode_set(self)
    }
}

impl<T: Encode> Encode for BTreeSet<T> {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue> {
        encoder.encode_set(self)
    }
}

impl<K: Display, V: Encode, S> Encode for HashMap<K, V, S> {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue> {
        encoder.encode_map(self, true)
    }
}

impl<K: Display, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue> {
        encoder.encode_map(self, false)
    }
}

macro_rules! encode_tuple {
    ($($name:ident),+) => {
        impl<$($name: Encode),+> Encode for ($($name,)+) {
            #[allow(non_snake_case)]
            fn encode(&self, encoder: &mut Encoder) -> CodecResult<EncodedValue> {
                let ($($name,)+) = self;
                encoder.nested(|enc| {
                    Ok(EncodedValue::List(vec![$($name.encode(enc)?),+]))
                })
            }
        }
    };
}

encode_tuple!(A);
encode_tuple!(A, B);
encode_tuple!(A, B, C);
encode_tuple!(A, B, C, D);
encode_tuple!(A, B, C, D, E);
encode_tuple!(A, B, C, D, E, F);
encode_tuple!(A, B, C, D, E, F, G);
encode_tuple!(A, B, C, D, E, F, G, H);
