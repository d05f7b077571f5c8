//! Type registry for tagged objects
//!
//! A record file names the types of the objects it contains. Whether those
//! types still exist is a property of the running program, not of the file,
//! so the registry is the program's side of that contract: a map from type
//! name to a resolver that re-decodes a stored object into the live type.
//!
//! ## Resolution policies
//!
//! - `Strict` (default): an object whose type is not registered, or whose
//!   registered type can no longer decode it, is a `TypeResolutionError`
//! - `Lenient`: unregistered objects are kept as comparison-only values;
//!   registered types are still checked

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::decode::{Decode, Decoder};
use super::inspect::Inspect;
use crate::error::{DecodeResult, TypeResolutionError};
use crate::limits::Limits;
use crate::value::EncodedValue;

type Resolver = Arc<dyn Fn(&EncodedValue, Limits) -> DecodeResult<()> + Send + Sync>;

/// How to treat objects whose type is not registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionPolicy {
    /// Unregistered types are an error
    #[default]
    Strict,
    /// Unregistered types degrade to comparison-only objects
    Lenient,
}

/// Registered object types, keyed by their stable type name
#[derive(Clone, Default)]
pub struct TypeRegistry {
    limits: Limits,
    resolvers: HashMap<String, Resolver>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("limits", &self.limits)
            .field("types", &self.type_names())
            .finish()
    }
}

impl TypeRegistry {
    /// Create an empty registry with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with custom limits
    pub fn with_limits(limits: Limits) -> Self {
        TypeRegistry {
            limits,
            resolvers: HashMap::new(),
        }
    }

    /// Register every object type reachable from `T`
    pub fn register<T: Decode>(&mut self) {
        T::register(self)
    }

    /// Register the types reachable from a field's type
    ///
    /// Used by `inspect_object!`; the argument only carries the field type.
    pub fn register_field<T: Decode>(&mut self, _field: Option<&T>) {
        T::register(self)
    }

    /// Insert one object type
    ///
    /// Returns `false` if the type was already present, which ends the walk
    /// for recursive types.
    pub fn insert_object<T>(&mut self) -> bool
    where
        T: Decode + Inspect + 'static,
    {
        if self.resolvers.contains_key(T::TYPE_NAME) {
            return false;
        }
        let resolver: Resolver = Arc::new(|value: &EncodedValue, limits: Limits| {
            Decoder::new(limits).decode::<T>(value).map(|_| ())
        });
        self.resolvers.insert(T::TYPE_NAME.to_string(), resolver);
        true
    }

    /// Returns true if `type_name` is registered
    pub fn contains(&self, type_name: &str) -> bool {
        self.resolvers.contains_key(type_name)
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resolvers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns true if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Merge another registry into this one
    pub fn extend(&mut self, other: &TypeRegistry) {
        for (name, resolver) in &other.resolvers {
            self.resolvers
                .entry(name.clone())
                .or_insert_with(|| Arc::clone(resolver));
        }
    }

    /// Check that every object inside `value` can be reconstructed
    ///
    /// Registered objects are re-decoded through their live type, which
    /// covers everything nested inside them. Unregistered objects fail under
    /// `Strict` and are walked into under `Lenient`.
    pub fn resolve(&self, value: &EncodedValue, policy: ResolutionPolicy) -> DecodeResult<()> {
        self.resolve_impl(value, policy, 0)
    }

    fn resolve_impl(
        &self,
        value: &EncodedValue,
        policy: ResolutionPolicy,
        depth: usize,
    ) -> DecodeResult<()> {
        match value {
            EncodedValue::Object { type_name, fields } => match self.resolvers.get(type_name) {
                Some(resolver) => resolver(value, self.limits),
                None if policy == ResolutionPolicy::Strict => {
                    Err(TypeResolutionError::unknown(type_name.as_str()).into())
                }
                None => {
                    self.limits.check_depth(depth)?;
                    for (_, field) in fields {
                        self.resolve_impl(field, policy, depth + 1)?;
                    }
                    Ok(())
                }
            },
            EncodedValue::List(items) | EncodedValue::Set(items) => {
                self.limits.check_depth(depth)?;
                for item in items {
                    self.resolve_impl(item, policy, depth + 1)?;
                }
                Ok(())
            }
            EncodedValue::Map(entries) => {
                self.limits.check_depth(depth)?;
                for (_, v) in entries {
                    self.resolve_impl(v, policy, depth + 1)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
