#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;
use tagplan::{
    custom, field, tagged, tagged_any, Record, RecordSet, Registry, Rule, Tag, TagSet, Value,
};

// --- Fixed field schema ---
// payee    : string, one of PAYEES
// amount   : i64 (-500..=500)
// category : string, one of CATEGORIES
// date     : date in 2024
// tags     : optional list drawn from TAG_NAMES plus "manual"
//
// Every generated leaf is type-compatible with this schema, so evaluation
// never fails and both tagging implementations must agree on the result.

const PAYEES: &[&str] = &["ACME GmbH", "acme", "Globex", " Initech "];
const CATEGORIES: &[&str] = &["food", "rent", "travel"];
pub const TAG_NAMES: &[&str] = &["t0", "t1", "t2", "t3", "t4"];

/// Registry with the standard operators and one custom rule.
pub fn registry() -> Arc<Registry> {
    Arc::new(
        Registry::builder()
            .with_standard_operators()
            .and_then(|b| b.custom_rule("is_large", |r: &Record| {
                Ok(matches!(r.get("amount"), Value::Int(n) if n.abs() > 250))
            }))
            .expect("fresh key")
            .build(),
    )
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (1_u32..=12, 1_u32..=28)
        .prop_map(|(m, d)| NaiveDate::from_ymd_opt(2024, m, d).expect("valid day"))
}

/// Generate a record matching the fixed schema.
pub fn arb_record() -> impl Strategy<Value = Record> {
    (
        prop::sample::select(PAYEES),
        -500_i64..=500,
        prop::sample::select(CATEGORIES),
        arb_date(),
        prop::option::of(prop::sample::subsequence(vec!["t0", "t2", "manual"], 0..=3)),
    )
        .prop_map(|(payee, amount, category, date, tags)| {
            let record = Record::new()
                .set("payee", payee)
                .set("amount", amount)
                .set("category", category)
                .set("date", date);
            match tags {
                Some(tags) => record.with_tags(tags),
                None => record,
            }
        })
}

pub fn arb_records() -> impl Strategy<Value = RecordSet> {
    prop::collection::vec(arb_record(), 0..12).prop_map(RecordSet::new)
}

fn arb_amount_leaf() -> impl Strategy<Value = Rule> {
    (-500_i64..=500, 0_u8..6, any::<bool>()).prop_map(|(val, op, abs)| {
        let f = if abs {
            field("amount").transform("abs")
        } else {
            field("amount")
        };
        match op {
            0 => f.eq(val),
            1 => f.ne(val),
            2 => f.gt(val),
            3 => f.ge(val),
            4 => f.lt(val),
            _ => f.le(val),
        }
    })
}

fn arb_payee_leaf() -> impl Strategy<Value = Rule> {
    (
        prop::sample::select(&["acme", "ACME", "glob", "tech ", "GmbH"][..]),
        prop::sample::select(&["", "lower", "upper", "strip"][..]),
        0_u8..5,
    )
        .prop_map(|(needle, transform, op)| {
            let f = if transform.is_empty() {
                field("payee")
            } else {
                field("payee").transform(transform)
            };
            match op {
                0 => f.eq(needle),
                1 => f.contains(needle),
                2 => f.cmp("startswith", needle),
                3 => f.cmp("endswith", needle),
                _ => f.matches(&format!("(?i)^{}", needle.trim())),
            }
        })
}

fn arb_category_leaf() -> impl Strategy<Value = Rule> {
    (
        prop::sample::subsequence(CATEGORIES.to_vec(), 1..=2),
        any::<bool>(),
    )
        .prop_map(|(set, negate)| {
            if negate {
                field("category").cmp("not_in", set)
            } else {
                field("category").is_in(set)
            }
        })
}

fn arb_date_leaf() -> impl Strategy<Value = Rule> {
    prop_oneof![
        (1_i64..=12).prop_map(|m| field("date").transform("month").eq(m)),
        (0_i64..=6).prop_map(|d| field("date").transform("weekday").lt(d)),
        arb_date().prop_map(|d| field("date").ge(d)),
    ]
}

fn arb_tag_leaf() -> impl Strategy<Value = Rule> {
    prop_oneof![
        3 => prop::sample::select(TAG_NAMES).prop_map(tagged),
        1 => prop::sample::subsequence(TAG_NAMES.to_vec(), 1..=2)
            .prop_map(|names| tagged_any(&names)),
    ]
}

/// A leaf over record fields only.
pub fn arb_field_leaf() -> impl Strategy<Value = Rule> {
    prop_oneof![
        3 => arb_amount_leaf(),
        3 => arb_payee_leaf(),
        2 => arb_category_leaf(),
        2 => arb_date_leaf(),
        1 => Just(custom("is_large")),
    ]
}

fn arb_leaf() -> impl Strategy<Value = Rule> {
    prop_oneof![
        4 => arb_field_leaf(),
        1 => arb_tag_leaf(),
    ]
}

fn compose(leaf: BoxedStrategy<Rule>, depth: u32) -> impl Strategy<Value = Rule> {
    leaf.prop_recursive(depth, 12, 3, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.and(b)),
            (inner.clone(), inner).prop_map(|(a, b)| a.or(b)),
        ]
    })
}

/// A rule tree that may reference tags.
pub fn arb_rule() -> impl Strategy<Value = Rule> {
    compose(arb_leaf().boxed(), 3)
}

/// A rule tree over record fields only.
pub fn arb_field_rule() -> impl Strategy<Value = Rule> {
    compose(arb_field_leaf().boxed(), 3)
}

/// Between one and five tags named `t0..`, referencing each other freely.
/// References to undeclared names and cycles are both possible.
pub fn arb_tag_set() -> impl Strategy<Value = TagSet> {
    prop::collection::vec(arb_rule(), 1..=TAG_NAMES.len()).prop_map(|rules| {
        let tags = rules
            .into_iter()
            .enumerate()
            .map(|(i, rule)| Tag::new(TAG_NAMES[i], rule).expect("generated rules are well formed"))
            .collect();
        TagSet::new(tags).expect("names are distinct")
    })
}

/// Dependency edges among up to six nodes named `n0..`.
pub fn arb_edges() -> impl Strategy<Value = Vec<(String, Vec<String>)>> {
    (1_usize..=6).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(0..n, 0..=3), n).prop_map(|deps| {
            deps.into_iter()
                .enumerate()
                .map(|(i, ds)| {
                    (
                        format!("n{i}"),
                        ds.into_iter().map(|d| format!("n{d}")).collect(),
                    )
                })
                .collect()
        })
    })
}
