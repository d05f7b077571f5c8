//! Value codec
//!
//! Converts Rust values to and from `EncodedValue`:
//! - `encode`: the `Encode` trait and its implementations for std types
//! - `decode`: the `Decode` trait, the inverse of `Encode`
//! - `inspect`: named-field introspection and the `inspect_object!` macro
//! - `registry`: the set of object types the running program can rebuild

pub mod decode;
pub mod encode;
pub mod inspect;
pub mod registry;

pub use decode::{decode, Decode, Decoder};
pub use encode::{encode, Bytes, Encode, Encoder, Opaque};
pub use inspect::Inspect;
pub use registry::{ResolutionPolicy, TypeRegistry};
