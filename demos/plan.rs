use std::sync::Arc;

use serde_json::json;
use tagplan::{
    PlannedTagging, PlannerOptions, Record, RecordSet, Registry, TagSet, TaggingOptions,
};

fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let registry = Arc::new(Registry::standard());
    let stored = [
        ("rent", json!([{"payee.lower": {"eq": "landlord"}}]).to_string()),
        ("coffee", json!([{"payee.lower": {"contains": ["coffee"]}}, {"category": {"eq": "cafe"}}]).to_string()),
        // fixed_costs and review reference each other; planning drops one edge
        ("fixed_costs", json!([{"tags": {"contains": "rent"}}, {"tags": {"contains": "review"}}]).to_string()),
        ("review", json!([{"tags": {"contains": "fixed_costs"}, "amount.abs": {"gt": 1000}}]).to_string()),
    ];
    let tags = TagSet::from_json_entries(
        stored.iter().map(|(name, doc)| (*name, doc.as_str())),
        &registry,
    )
    .expect("invalid stored tags");

    // A planner configuration as it might come from a config file.
    let options: PlannerOptions = serde_json::from_value(json!({
        "precompute_transforms": true,
        "deduplicate": true,
    }))
    .expect("invalid planner options");

    let tagging = PlannedTagging::new(tags, registry, options)
        .expect("failed to plan tag set")
        .with_options(TaggingOptions { remove_old_tags: true });
    println!("{}", tagging.plan());
    for edge in tagging.plan().removed_edges() {
        println!("dropped: {} no longer waits for {}", edge.dependent, edge.dependency);
    }

    let records = RecordSet::new(vec![
        Record::new().set("payee", "LANDLORD").set("amount", -1200_i64),
        Record::new().set("payee", "Corner Coffee").set("amount", -4_i64).with_tags(["rent"]),
        Record::new().set("payee", "Bakery").set("category", "cafe").set("amount", -7_i64),
    ]);
    let (tagged, report) = tagging.tag_detailed(&records).expect("tagging failed");
    for record in &tagged {
        println!("{:<14} {:?}", record.get("payee"), record.tags());
    }
    println!("{report}");
    for node in report.never_matched() {
        println!("never matched: {} ({})", node.alias, node.tag);
    }
}
