use std::sync::Arc;

use tagplan::{
    field, tagged, PlannedTagging, PlannerOptions, Record, RecordSet, Registry, TagSetBuilder,
    Tagging,
};

fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    // Define tags
    let tags = TagSetBuilder::new()
        .tag("groceries", field("payee").transform("lower").contains("market"))
        .tag("large", field("amount").transform("abs").ge(100_i64))
        .tag("large_groceries", tagged("groceries").and(tagged("large")))
        .build()
        .expect("failed to build tag set");

    let tagging = PlannedTagging::new(tags, Arc::new(Registry::standard()), PlannerOptions::optimized())
        .expect("failed to plan tag set");

    let records = RecordSet::new(vec![
        Record::new().set("payee", "Fresh Market").set("amount", -142_i64),
        Record::new().set("payee", "MARKET HALL").set("amount", -12_i64),
        Record::new().set("payee", "Landlord").set("amount", -950_i64),
    ]);

    let tagged = tagging.tag_records(&records).expect("tagging failed");
    for record in &tagged {
        println!("{:<14} {:>6}  {:?}", record.get("payee"), record.get("amount"), record.tags());
    }
}
