//! Structural inspection of user-defined types
//!
//! A type that implements `Inspect` exposes an ordered list of
//! `(field name, value)` pairs and a stable, fully qualified type name. The
//! encoder turns it into an `EncodedValue::Object`; types without it can
//! still be recorded through the `Opaque` wrapper.
//!
//! `inspect_object!` implements `Inspect`, `Encode` and `Decode` for a
//! struct with named fields:
//!
//! ```ignore
//! struct Address { street: String, city: String }
//! regrest_core::inspect_object!(Address { street, city });
//! ```
//!
//! The type name is `module_path!()` at the macro call site followed by the
//! struct name, so it survives recompilation and only changes when the type
//! is moved or renamed.

use super::encode::Encode;

/// Capability interface for values with named fields
pub trait Inspect {
    /// Fully qualified, stable type name
    const TYPE_NAME: &'static str;

    /// Field names and values, in declaration order
    fn fields(&self) -> Vec<(&'static str, &dyn Encode)>;
}

/// Implement `Inspect`, `Encode` and `Decode` for a struct with named fields
///
/// Every listed field must implement `Encode` and `Decode`. Generic structs
/// are not supported; implement the three traits by hand for those.
#[macro_export]
macro_rules! inspect_object {
    ($ty:ident { $($field:ident),* $(,)? }) => {
        impl $crate::Inspect for $ty {
            const TYPE_NAME: &'static str = concat!(module_path!(), "::", stringify!($ty));

            fn fields(&self) -> ::std::vec::Vec<(&'static str, &dyn $crate::Encode)> {
                ::std::vec![$((stringify!($field), &self.$field as &dyn $crate::Encode)),*]
            }
        }

        impl $crate::Encode for $ty {
            fn encode(
                &self,
                encoder: &mut $crate::Encoder,
            ) -> $crate::CodecResult<$crate::EncodedValue> {
                encoder.encode_object(self)
            }
        }

        impl $crate::Decode for $ty {
            fn decode(
                value: &$crate::EncodedValue,
                decoder: &mut $crate::Decoder,
            ) -> $crate::DecodeResult<Self> {
                let fields =
                    decoder.object_fields(value, <Self as $crate::Inspect>::TYPE_NAME)?;
                decoder.nested(|decoder| {
                    Ok(Self {
                        $($field: decoder.field(fields, stringify!($field))?,)*
                    })
                })
            }

            fn register(registry: &mut $crate::TypeRegistry) {
                if registry.insert_object::<Self>() {
                    $(registry.register_field(None::<&Self>.map(|value| &value.$field));)*
                }
            }
        }
    };
}
