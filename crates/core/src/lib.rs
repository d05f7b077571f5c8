//! Core types for regrest
//!
//! This crate defines the value model every other crate works with:
//! - EncodedValue: the self-describing, JSON-serializable form of a value
//! - Encode / Decode: conversion between Rust values and `EncodedValue`
//! - Inspect: named-field introspection for user types (`inspect_object!`)
//! - TypeRegistry: which tagged-object types can be reconstructed
//! - Limits: the nesting bound shared by all recursive walks
//! - Error: codec, type resolution and decode errors

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod limits;
pub mod value;

pub use codec::{
    decode, encode, Bytes, Decode, Decoder, Encode, Encoder, Inspect, Opaque, ResolutionPolicy,
    TypeRegistry,
};
pub use error::{CodecError, CodecResult, DecodeError, DecodeResult, TypeResolutionError};
pub use limits::{Limits, DEFAULT_MAX_DEPTH};
pub use value::EncodedValue;
