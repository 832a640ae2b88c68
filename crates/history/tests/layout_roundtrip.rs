use perimeter_history::{encode_history, History, Layout, Record};
use proptest::prelude::*;

fn record_strategy() -> impl Strategy<Value = Record> {
    (
        "[a-z_]{1,20}",
        0.0f64..1.0e6,
        prop::collection::btree_map("[a-z_0-9]{1,8}", 0.01f64..1.0e4, 0..4),
        prop::option::of("[0-9/: ]{0,19}"),
    )
        .prop_map(|(figure, perimeter, params, timestamp)| {
            let record = Record::new(figure, perimeter, params);
            match timestamp {
                Some(ts) => record.with_timestamp(ts),
                None => record,
            }
        })
}

proptest! {
    #[test]
    fn compact_and_pretty_layouts_parse_identically(
        records in prop::collection::vec(record_strategy(), 0..12)
    ) {
        let history = History::from(records);
        let compact = encode_history(&history, Layout::Compact).unwrap();
        let pretty = encode_history(&history, Layout::Pretty).unwrap();

        let from_compact = History::parse(&compact).unwrap();
        let from_pretty = History::parse(&pretty).unwrap();
        prop_assert_eq!(&from_compact, &from_pretty);
        prop_assert_eq!(&from_compact, &history);
    }
}
