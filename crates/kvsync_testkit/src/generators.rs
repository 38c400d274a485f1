//! Property-based test generators using proptest.
//!
//! Paths are drawn from a small alphabet so generated local and live
//! datasets overlap often enough to exercise updates and deletes.

use kvsync_protocol::{encode_value, LiveDataset, LocalDataset};
use proptest::prelude::*;

/// Strategy for slash-delimited KV paths one to three segments deep.
pub fn path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-d]{1,2}", 1..=3).prop_map(|segments| segments.join("/"))
}

/// Strategy for raw values, including the empty value.
pub fn raw_value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        1 => Just(String::new()),
        6 => "[ -~]{1,24}",
    ]
}

/// Strategy for local datasets.
pub fn local_dataset_strategy(max_entries: usize) -> impl Strategy<Value = LocalDataset> {
    prop::collection::btree_map(path_strategy(), raw_value_strategy(), 0..=max_entries)
}

/// Strategy for live datasets. Values are base64-encoded and never empty.
pub fn live_dataset_strategy(max_entries: usize) -> impl Strategy<Value = LiveDataset> {
    prop::collection::btree_map(path_strategy(), "[ -~]{1,24}", 0..=max_entries).prop_map(
        |raw| {
            raw.into_iter()
                .map(|(path, value)| (path, encode_value(&value)))
                .collect()
        },
    )
}

/// Strategy for values of a fixed length, for payload sizing tests.
pub fn sized_value_strategy(len: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::char::range('a', 'z'), len)
        .prop_map(|chars| chars.into_iter().collect())
}
