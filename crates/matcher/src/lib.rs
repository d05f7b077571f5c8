//! Tolerant structural comparison of encoded values
//!
//! `Matcher::compare(expected, actual)` walks both values depth-first and
//! stops at the first divergence, reporting it with a path such as
//! `root.items[2].price: expected 100, got 110`.
//!
//! - Integers compare exactly; any float operand switches to a symmetric
//!   absolute tolerance, and NaN never matches
//! - Lists compare positionally, sets as multisets, maps and objects by key
//! - Traversal order is fixed (index order, sorted keys), so identical
//!   inputs always produce identical messages

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bipartite;
pub mod matcher;
mod path;
pub mod result;

pub use matcher::{compare, Matcher, DEFAULT_TOLERANCE};
pub use result::MatchResult;
