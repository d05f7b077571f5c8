//! The tolerant matcher
//!
//! ## Rules
//!
//! | expected / actual      | rule                                                    |
//! |------------------------|---------------------------------------------------------|
//! | int / int              | exact                                                   |
//! | float / number         | equal, or `a <= e + t && e <= a + t` (NaN never matches) |
//! | null, bool, str, bytes | exact                                                   |
//! | list / list            | same length, then element by element                    |
//! | set / set              | maximum bipartite matching under these same rules       |
//! | map / map              | unique keys, same key set, then values in key order     |
//! | object / object        | same type name (unless loose), then fields as for maps  |
//! | opaque / opaque        | same type name and repr                                 |
//! | anything else          | type mismatch                                           |
//!
//! Containers count against `Limits::max_depth` exactly as in the encoder,
//! so any value that encodes can be compared.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use regrest_core::{EncodedValue, Limits};

use crate::bipartite::maximum_matching;
use crate::path::{PathNode, Segment};
use crate::result::MatchResult;

/// Default absolute tolerance for float comparisons
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

const MAX_VALUE_DISPLAY: usize = 80;

/// First divergence found by a comparison
struct Mismatch {
    path: String,
    detail: String,
}

impl Mismatch {
    fn new(path: &PathNode<'_>, detail: impl Into<String>) -> Self {
        Mismatch {
            path: path.to_string(),
            detail: detail.into(),
        }
    }
}

type Check = Result<(), Mismatch>;

/// Structural comparator with numeric tolerance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matcher {
    tolerance: f64,
    loose_objects: bool,
    limits: Limits,
}

impl Default for Matcher {
    fn default() -> Self {
        Matcher::new(DEFAULT_TOLERANCE)
    }
}

impl Matcher {
    /// Matcher with the given absolute float tolerance
    ///
    /// Negative or NaN tolerances are treated as zero.
    pub fn new(tolerance: f64) -> Self {
        Matcher {
            tolerance: tolerance.max(0.0),
            loose_objects: false,
            limits: Limits::default(),
        }
    }

    /// Ignore type names when comparing tagged objects
    pub fn with_loose_objects(mut self, loose: bool) -> Self {
        self.loose_objects = loose;
        self
    }

    /// Set the depth limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Float tolerance
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Compare a stored value against a freshly computed one
    pub fn compare(&self, expected: &EncodedValue, actual: &EncodedValue) -> MatchResult {
        match self.check(expected, actual, &PathNode::root(), 0) {
            Ok(()) => MatchResult::pass(),
            Err(m) => {
                let message = format!("{}: {}", m.path, m.detail);
                MatchResult::fail(m.path, message)
            }
        }
    }

    /// Shorthand for `compare(..).passed`, without building a message
    pub fn matches(&self, expected: &EncodedValue, actual: &EncodedValue) -> bool {
        self.agrees(expected, actual, 0)
    }

    fn check(
        &self,
        expected: &EncodedValue,
        actual: &EncodedValue,
        path: &PathNode<'_>,
        depth: usize,
    ) -> Check {
        use EncodedValue::*;

        match (expected, actual) {
            (Int(e), Int(a)) => self.exact(e == a, expected, actual, path),
            (Float(_), Float(_)) | (Float(_), Int(_)) | (Int(_), Float(_)) => {
                let (e, a) = (number(expected), number(actual));
                if floats_match(e, a, self.tolerance) {
                    Ok(())
                } else {
                    Err(Mismatch::new(
                        path,
                        format!(
                            "expected {}, got {} (tolerance {:e})",
                            brief(expected),
                            brief(actual),
                            self.tolerance
                        ),
                    ))
                }
            }
            (Null, Null) => Ok(()),
            (Bool(e), Bool(a)) => self.exact(e == a, expected, actual, path),
            (Str(e), Str(a)) => self.exact(e == a, expected, actual, path),
            (Bytes(e), Bytes(a)) => self.exact(e == a, expected, actual, path),
            (List(e), List(a)) => self.check_list(e, a, path, depth),
            (Set(e), Set(a)) => self.check_set(e, a, path, depth),
            (Map(e), Map(a)) => self.check_entries(e, a, EntryKind::Key, path, depth),
            (
                Object {
                    type_name: te,
                    fields: fe,
                },
                Object {
                    type_name: ta,
                    fields: fa,
                },
            ) => {
                if !self.loose_objects && te != ta {
                    return Err(Mismatch::new(
                        path,
                        format!("type mismatch: expected {}, got {}", te, ta),
                    ));
                }
                self.check_entries(fe, fa, EntryKind::Field, path, depth)
            }
            (
                Opaque {
                    type_name: te,
                    repr: re,
                },
                Opaque {
                    type_name: ta,
                    repr: ra,
                },
            ) => {
                if te != ta {
                    return Err(Mismatch::new(
                        path,
                        format!("type mismatch: expected {}, got {}", te, ta),
                    ));
                }
                self.exact(re == ra, expected, actual, path)
            }
            _ => Err(Mismatch::new(
                path,
                format!(
                    "type mismatch: expected {} {}, got {} {}",
                    expected.kind(),
                    brief(expected),
                    actual.kind(),
                    brief(actual)
                ),
            )),
        }
    }

    fn exact(
        &self,
        equal: bool,
        expected: &EncodedValue,
        actual: &EncodedValue,
        path: &PathNode<'_>,
    ) -> Check {
        if equal {
            Ok(())
        } else {
            Err(Mismatch::new(
                path,
                format!("expected {}, got {}", brief(expected), brief(actual)),
            ))
        }
    }

    fn enter(&self, path: &PathNode<'_>, depth: usize) -> Check {
        if depth >= self.limits.max_depth {
            return Err(Mismatch::new(
                path,
                format!(
                    "comparison depth exceeded (maximum is {})",
                    self.limits.max_depth
                ),
            ));
        }
        Ok(())
    }

    fn check_list(
        &self,
        expected: &[EncodedValue],
        actual: &[EncodedValue],
        path: &PathNode<'_>,
        depth: usize,
    ) -> Check {
        self.enter(path, depth)?;
        if expected.len() != actual.len() {
            return Err(Mismatch::new(
                path,
                format!(
                    "length mismatch: expected {} items, got {}",
                    expected.len(),
                    actual.len()
                ),
            ));
        }
        for (i, (e, a)) in expected.iter().zip(actual).enumerate() {
            let child = path.child(Segment::Index(i));
            self.check(e, a, &child, depth + 1)?;
        }
        Ok(())
    }

    fn check_set(
        &self,
        expected: &[EncodedValue],
        actual: &[EncodedValue],
        path: &PathNode<'_>,
        depth: usize,
    ) -> Check {
        self.enter(path, depth)?;
        let partners = self.set_partners(expected, actual, depth);

        let mut matched = vec![false; actual.len()];
        let mut missing = Vec::new();
        for (e, partner) in expected.iter().zip(&partners) {
            match partner {
                Some(j) => matched[*j] = true,
                None => missing.push(e),
            }
        }
        let unexpected: Vec<&EncodedValue> = actual
            .iter()
            .zip(&matched)
            .filter(|(_, m)| !**m)
            .map(|(a, _)| a)
            .collect();

        if missing.is_empty() && unexpected.is_empty() {
            return Ok(());
        }

        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("no match for expected {}", brief_all(&missing)));
        }
        if !unexpected.is_empty() {
            parts.push(format!("unexpected {}", brief_all(&unexpected)));
        }
        Err(Mismatch::new(
            path,
            format!("set elements differ: {}", parts.join("; ")),
        ))
    }

    fn check_entries(
        &self,
        expected: &[(String, EncodedValue)],
        actual: &[(String, EncodedValue)],
        kind: EntryKind,
        path: &PathNode<'_>,
        depth: usize,
    ) -> Check {
        self.enter(path, depth)?;

        let mut parts = Vec::new();
        for (side, entries) in [("expected", expected), ("actual", actual)] {
            let duplicates = duplicate_keys(&sorted_entries(entries));
            if !duplicates.is_empty() {
                parts.push(format!(
                    "duplicate {} {:?} in {}",
                    kind.plural(),
                    duplicates,
                    side
                ));
            }
        }
        if !parts.is_empty() {
            return Err(Mismatch::new(path, parts.join("; ")));
        }

        let expected: BTreeMap<&str, &EncodedValue> =
            expected.iter().map(|(k, v)| (k.as_str(), v)).collect();
        let actual: BTreeMap<&str, &EncodedValue> =
            actual.iter().map(|(k, v)| (k.as_str(), v)).collect();

        let missing: Vec<&str> = expected
            .keys()
            .filter(|k| !actual.contains_key(*k))
            .copied()
            .collect();
        let unexpected: Vec<&str> = actual
            .keys()
            .filter(|k| !expected.contains_key(*k))
            .copied()
            .collect();

        if !missing.is_empty() || !unexpected.is_empty() {
            let mut parts = Vec::new();
            if !missing.is_empty() {
                parts.push(format!("missing {} {:?}", kind.plural(), missing));
            }
            if !unexpected.is_empty() {
                parts.push(format!("unexpected {} {:?}", kind.plural(), unexpected));
            }
            return Err(Mismatch::new(path, parts.join("; ")));
        }

        for (key, e) in &expected {
            if let Some(a) = actual.get(key) {
                let child = path.child(kind.segment(key));
                self.check(e, a, &child, depth + 1)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Boolean walk
    // ------------------------------------------------------------------------

    /// Same rules as `check`, but only answers yes or no
    fn agrees(&self, expected: &EncodedValue, actual: &EncodedValue, depth: usize) -> bool {
        use EncodedValue::*;

        match (expected, actual) {
            (Int(e), Int(a)) => e == a,
            (Float(_), Float(_)) | (Float(_), Int(_)) | (Int(_), Float(_)) => {
                floats_match(number(expected), number(actual), self.tolerance)
            }
            (Null, Null) => true,
            (Bool(e), Bool(a)) => e == a,
            (Str(e), Str(a)) => e == a,
            (Bytes(e), Bytes(a)) => e == a,
            (List(e), List(a)) => {
                depth < self.limits.max_depth
                    && e.len() == a.len()
                    && e.iter().zip(a).all(|(e, a)| self.agrees(e, a, depth + 1))
            }
            (Set(e), Set(a)) => {
                depth < self.limits.max_depth
                    && e.len() == a.len()
                    && self
                        .set_partners(e, a, depth)
                        .iter()
                        .all(Option::is_some)
            }
            (Map(e), Map(a)) => self.entries_agree(e, a, depth),
            (
                Object {
                    type_name: te,
                    fields: fe,
                },
                Object {
                    type_name: ta,
                    fields: fa,
                },
            ) => (self.loose_objects || te == ta) && self.entries_agree(fe, fa, depth),
            (
                Opaque {
                    type_name: te,
                    repr: re,
                },
                Opaque {
                    type_name: ta,
                    repr: ra,
                },
            ) => te == ta && re == ra,
            _ => false,
        }
    }

    fn entries_agree(
        &self,
        expected: &[(String, EncodedValue)],
        actual: &[(String, EncodedValue)],
        depth: usize,
    ) -> bool {
        if depth >= self.limits.max_depth || expected.len() != actual.len() {
            return false;
        }
        let expected = sorted_entries(expected);
        let actual = sorted_entries(actual);
        duplicate_keys(&expected).is_empty()
            && expected
                .iter()
                .zip(&actual)
                .all(|((ke, e), (ka, a))| ke == ka && self.agrees(e, a, depth + 1))
    }

    /// Partner in `actual` of each expected element under a maximum matching
    ///
    /// Without floats the rules are an equivalence, so identical elements are
    /// paired by a sorted merge first and only the rest go through the
    /// augmenting-path search.
    fn set_partners(
        &self,
        expected: &[EncodedValue],
        actual: &[EncodedValue],
        depth: usize,
    ) -> Vec<Option<usize>> {
        let mut partners: Vec<Option<usize>> = vec![None; expected.len()];
        let mut taken = vec![false; actual.len()];

        let max_depth = self.limits.max_depth;
        if !expected
            .iter()
            .chain(actual)
            .any(|v| holds_float(v, depth + 1, max_depth))
        {
            let mut left: Vec<usize> = (0..expected.len()).collect();
            let mut right: Vec<usize> = (0..actual.len()).collect();
            left.sort_by(|&x, &y| expected[x].canonical_cmp(&expected[y]));
            right.sort_by(|&x, &y| actual[x].canonical_cmp(&actual[y]));

            let (mut i, mut j) = (0, 0);
            while i < left.len() && j < right.len() {
                let (e, a) = (left[i], right[j]);
                match expected[e].canonical_cmp(&actual[a]) {
                    Ordering::Less => i += 1,
                    Ordering::Greater => j += 1,
                    Ordering::Equal => {
                        if self.agrees(&expected[e], &actual[a], depth + 1) {
                            partners[e] = Some(a);
                            taken[a] = true;
                        }
                        i += 1;
                        j += 1;
                    }
                }
            }
        }

        let rest_left: Vec<usize> = (0..expected.len())
            .filter(|&e| partners[e].is_none())
            .collect();
        let rest_right: Vec<usize> = (0..actual.len()).filter(|&a| !taken[a]).collect();
        let adjacency: Vec<Vec<usize>> = rest_left
            .iter()
            .map(|&e| {
                rest_right
                    .iter()
                    .enumerate()
                    .filter(|&(_, &a)| self.agrees(&expected[e], &actual[a], depth + 1))
                    .map(|(k, _)| k)
                    .collect()
            })
            .collect();
        let rest = maximum_matching(&adjacency, rest_right.len());
        for (&e, partner) in rest_left.iter().zip(rest) {
            partners[e] = partner.map(|k| rest_right[k]);
        }
        partners
    }
}

/// Compare with default settings and the given tolerance
pub fn compare(expected: &EncodedValue, actual: &EncodedValue, tolerance: f64) -> MatchResult {
    Matcher::new(tolerance).compare(expected, actual)
}

#[derive(Debug, Clone, Copy)]
enum EntryKind {
    Key,
    Field,
}

impl EntryKind {
    fn plural(self) -> &'static str {
        match self {
            EntryKind::Key => "keys",
            EntryKind::Field => "fields",
        }
    }

    fn segment(self, name: &str) -> Segment<'_> {
        match self {
            EntryKind::Key => Segment::Key(name),
            EntryKind::Field => Segment::Field(name),
        }
    }
}

fn floats_match(expected: f64, actual: f64, tolerance: f64) -> bool {
    if expected == actual {
        return true;
    }
    if expected.is_nan() || actual.is_nan() {
        return false;
    }
    actual <= expected + tolerance && expected <= actual + tolerance
}

fn number(value: &EncodedValue) -> f64 {
    value.as_f64().unwrap_or(f64::NAN)
}

/// Whether a float occurs anywhere in `value`; assumed past the depth limit
fn holds_float(value: &EncodedValue, depth: usize, max_depth: usize) -> bool {
    match value {
        EncodedValue::Float(_) => true,
        EncodedValue::List(items) | EncodedValue::Set(items) => {
            depth >= max_depth || items.iter().any(|v| holds_float(v, depth + 1, max_depth))
        }
        EncodedValue::Map(entries) | EncodedValue::Object { fields: entries, .. } => {
            depth >= max_depth
                || entries
                    .iter()
                    .any(|(_, v)| holds_float(v, depth + 1, max_depth))
        }
        _ => false,
    }
}

fn sorted_entries(entries: &[(String, EncodedValue)]) -> Vec<(&str, &EncodedValue)> {
    let mut sorted: Vec<(&str, &EncodedValue)> =
        entries.iter().map(|(k, v)| (k.as_str(), v)).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
}

fn duplicate_keys<'a>(sorted: &[(&'a str, &EncodedValue)]) -> Vec<&'a str> {
    let mut duplicates: Vec<&str> = sorted
        .windows(2)
        .filter(|w| w[0].0 == w[1].0)
        .map(|w| w[0].0)
        .collect();
    duplicates.dedup();
    duplicates
}

fn brief(value: &EncodedValue) -> String {
    let text = value.to_string();
    if text.chars().count() <= MAX_VALUE_DISPLAY {
        return text;
    }
    let mut cut: String = text.chars().take(MAX_VALUE_DISPLAY - 3).collect();
    cut.push_str("...");
    cut
}

fn brief_all(values: &[&EncodedValue]) -> String {
    let items: Vec<String> = values.iter().map(|v| brief(v)).collect();
    format!("{{{}}}", items.join(", "))
}
