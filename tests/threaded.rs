use std::sync::Arc;
use std::thread;

use tagplan::{
    field, tagged, PlannedTagging, PlannerOptions, Record, RecordSet, Registry, TagSetBuilder,
    Tagging,
};

#[test]
fn tag_across_threads() {
    let tagging = Arc::new(
        PlannedTagging::new(
            TagSetBuilder::new()
                .tag("large", field("amount").transform("abs").ge(1000_i64))
                .tag("groceries", field("payee").transform("lower").contains("market"))
                .tag("large_groceries", tagged("large").and(tagged("groceries")))
                .build()
                .unwrap(),
            Arc::new(Registry::standard()),
            PlannerOptions::optimized(),
        )
        .unwrap(),
    );

    let cases: Vec<(Record, Vec<&'static str>)> = vec![
        (
            Record::new().set("amount", -1500_i64).set("payee", "Fresh Market"),
            vec!["large", "groceries", "large_groceries"],
        ),
        (
            Record::new().set("amount", 20_i64).set("payee", "MARKET HALL"),
            vec!["groceries"],
        ),
        (
            Record::new().set("amount", 2000_i64).set("payee", "Landlord"),
            vec!["large"],
        ),
        (Record::new().set("amount", 5_i64).set("payee", "Kiosk"), vec![]),
    ];

    let handles: Vec<_> = cases
        .into_iter()
        .map(|(record, expected)| {
            let tagging = Arc::clone(&tagging);
            thread::spawn(move || {
                let records = RecordSet::new(vec![record; 50]);
                let tagged = tagging.tag_records(&records).unwrap();
                tagged
                    .iter()
                    .all(|r| r.tags() == expected)
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

#[test]
fn planned_tagging_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PlannedTagging>();
    assert_send_sync::<tagplan::LinearTagging>();
}
