use serde_json::json;
use tagplan::{field, tagged, Record, Registry, Rule, RuleError, Tag, TagSet};

#[test]
fn stored_rule_is_grouped_by_key_and_comparator() {
    let rule = field("amount")
        .gt(10_i64)
        .and(field("amount").lt(100_i64))
        .and(field("payee").transform("lower").contains("acme"))
        .or(tagged("manual"));
    assert_eq!(
        rule.to_json().unwrap(),
        json!([
            {"amount": {"gt": 10, "lt": 100}, "payee.lower": {"contains": "acme"}},
            {"tags": {"contains": "manual"}}
        ])
    );
}

#[test]
fn repeated_comparators_become_arrays() {
    let doc = json!([{"payee": {"contains": ["acme", "gmbh"]}}]);
    let rule = Rule::from_json(&doc).unwrap();
    let registry = Registry::standard();
    assert!(rule.evaluate(&Record::new().set("payee", "acme gmbh"), &registry).unwrap());
    assert!(!rule.evaluate(&Record::new().set("payee", "acme inc"), &registry).unwrap());
    assert_eq!(rule.to_json().unwrap(), doc);
}

#[test]
fn dates_and_custom_rules_survive_storage() {
    let doc = json!([
        {"date": {"ge": {"date": "2024-01-01"}}, "custom": "is_weekend"},
        {"category": {"in": [["food", "travel"]]}}
    ]);
    let rule = Rule::from_json(&doc).unwrap();
    assert_eq!(rule.to_json().unwrap(), doc);
}

#[test]
fn tag_set_loads_from_stored_entries() {
    let registry = Registry::standard();
    let tags = TagSet::from_json_entries(
        [
            ("rent", r#"[{"payee.lower": {"eq": "landlord"}}]"#),
            ("fixed", r#"[{"tags": {"contains": "rent"}}]"#),
        ],
        &registry,
    )
    .unwrap();
    assert_eq!(tags.names(), vec!["rent", "fixed"]);
    assert_eq!(tags.get("fixed").unwrap().depends_on(), vec!["rent".to_owned()]);

    let stored = tags.get("rent").unwrap().to_json().unwrap();
    let again = Tag::from_json("rent", &stored, &registry).unwrap();
    assert_eq!(&again, tags.get("rent").unwrap());
}

#[test]
fn malformed_documents_are_rejected() {
    for doc in [
        json!({}),
        json!([]),
        json!([{}]),
        json!([{"amount": {}}]),
        json!([{"amount": 5}]),
        json!([{"amount": {"gt": {"when": "now"}}}]),
        json!([{"custom": []}]),
    ] {
        assert!(
            matches!(Rule::from_json(&doc), Err(RuleError::MalformedRule { .. })),
            "{doc} should be malformed"
        );
    }
    assert!(matches!(
        Rule::from_json(&json!([{"amount.": {"gt": 1}}])),
        Err(RuleError::InvalidKey { .. })
    ));
}
