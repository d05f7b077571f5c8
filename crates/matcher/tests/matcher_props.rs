//! Property tests for the matcher
//!
//! - Numeric comparisons are symmetric under any tolerance
//! - `1.0` vs `1.0 + t` passes at `t` and fails at `t / 2`
//! - Decoded values match their originals at zero tolerance
//! - `matches` and `compare` always agree

use std::collections::{BTreeMap, HashSet};

use proptest::prelude::*;
use regrest_core::{decode, encode, EncodedValue};
use regrest_matcher::{compare, Matcher};

fn number() -> impl Strategy<Value = EncodedValue> {
    prop_oneof![
        any::<i64>().prop_map(EncodedValue::Int),
        any::<f64>().prop_map(EncodedValue::Float),
        (-1e6f64..1e6).prop_map(EncodedValue::Float),
    ]
}

fn tolerance() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), 0.0f64..10.0, 1e-12f64..1e-6]
}

fn leaf() -> impl Strategy<Value = EncodedValue> {
    prop_oneof![
        Just(EncodedValue::Null),
        any::<bool>().prop_map(EncodedValue::Bool),
        any::<i64>().prop_map(EncodedValue::Int),
        (-1e9f64..1e9).prop_map(EncodedValue::Float),
        "[a-z]{0,8}".prop_map(EncodedValue::Str),
    ]
}

fn value() -> impl Strategy<Value = EncodedValue> {
    leaf().prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(EncodedValue::List),
            prop::collection::vec(inner.clone(), 0..6).prop_map(EncodedValue::Set),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..6)
                .prop_map(|m| EncodedValue::Map(m.into_iter().collect())),
        ]
    })
}

#[derive(Debug, Clone, PartialEq)]
struct Reading {
    sensor: String,
    values: Vec<f64>,
    tags: BTreeMap<String, i64>,
    calibrated: Option<bool>,
}
regrest_core::inspect_object!(Reading {
    sensor,
    values,
    tags,
    calibrated
});

fn reading() -> impl Strategy<Value = Reading> {
    (
        "[a-z]{1,8}",
        prop::collection::vec(-1e12f64..1e12, 0..8),
        prop::collection::btree_map("[a-z]{1,4}", any::<i64>(), 0..4),
        any::<Option<bool>>(),
    )
        .prop_map(|(sensor, values, tags, calibrated)| Reading {
            sensor,
            values,
            tags,
            calibrated,
        })
}

proptest! {
    #[test]
    fn numeric_comparison_is_symmetric(a in number(), b in number(), t in tolerance()) {
        prop_assert_eq!(compare(&a, &b, t).passed, compare(&b, &a, t).passed);
    }

    #[test]
    fn structural_comparison_is_symmetric(a in value(), b in value(), t in tolerance()) {
        prop_assert_eq!(compare(&a, &b, t).passed, compare(&b, &a, t).passed);
    }

    #[test]
    fn tolerance_boundary(t in 1e-9f64..1.0) {
        let expected = EncodedValue::Float(1.0);
        let actual = EncodedValue::Float(1.0 + t);
        prop_assert!(compare(&expected, &actual, t).passed);
        prop_assert!(!compare(&expected, &actual, t / 2.0).passed);
    }

    #[test]
    fn matches_agrees_with_compare(a in value(), b in value(), t in tolerance()) {
        let m = Matcher::new(t);
        prop_assert_eq!(m.matches(&a, &b), m.compare(&a, &b).passed);
        prop_assert_eq!(m.matches(&a, &a), m.compare(&a, &a).passed);
    }

    #[test]
    fn shuffled_multisets_match(
        (items, shuffled) in prop::collection::vec(0i64..8, 0..48)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
    ) {
        let set = |v: Vec<i64>| EncodedValue::Set(v.into_iter().map(EncodedValue::Int).collect());
        let mut extra = shuffled.clone();
        extra.push(8);
        prop_assert!(compare(&set(items.clone()), &set(shuffled), 0.0).passed);
        prop_assert!(!compare(&set(items), &set(extra), 0.0).passed);
    }

    #[test]
    fn value_matches_itself(v in value()) {
        prop_assert!(Matcher::new(0.0).matches(&v, &v));
    }

    #[test]
    fn object_round_trip_matches(r in reading()) {
        let encoded = encode(&r).unwrap();
        let decoded: Reading = decode(&encoded).unwrap();
        let result = compare(&encoded, &encode(&decoded).unwrap(), 0.0);
        prop_assert!(result.passed, "{}", result.message);
    }

    #[test]
    fn set_round_trip_is_order_independent(items in prop::collection::hash_set(any::<i32>(), 0..16)) {
        let encoded = encode(&items).unwrap();
        let decoded: HashSet<i32> = decode(&encoded).unwrap();
        prop_assert!(compare(&encoded, &encode(&decoded).unwrap(), 0.0).passed);
    }
}
