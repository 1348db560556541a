//! Page request counts for record fetching.

// Tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use test_case::test_case;

use kintone_transfer::store::{MemoryRecordStore, RecordFetcher};
use kintone_transfer::{AppId, FieldType, FieldValue, PAGE_SIZE, Record, RecordQuery};

fn store_with(n: usize) -> MemoryRecordStore {
    let records = (0..n)
        .map(|i| {
            Record::new().with_field(
                "name",
                FieldType::SingleLineText,
                FieldValue::Text(format!("r{i}")),
            )
        })
        .collect();
    MemoryRecordStore::with_records(records)
}

#[test_case(0, 1 ; "empty app")]
#[test_case(1, 1 ; "single record")]
#[test_case(99, 1 ; "one short page")]
#[test_case(100, 2 ; "one full page")]
#[test_case(101, 2 ; "one record past a page")]
#[test_case(250, 3 ; "two and a half pages")]
fn test_fetch_all_request_count(records: usize, requests: usize) {
    let store = store_with(records);
    let fetched = RecordFetcher::new(&store)
        .fetch_all(&RecordQuery::new(AppId::new(1)))
        .unwrap();

    assert_eq!(fetched.len(), records);
    assert_eq!(store.fetch_requests().unwrap(), requests);
    assert_eq!(requests, records / PAGE_SIZE + 1);
}

#[test_case(0 ; "empty app")]
#[test_case(100 ; "one full page")]
#[test_case(250 ; "two and a half pages")]
fn test_fetch_all_keeps_service_order(records: usize) {
    let store = store_with(records);
    let fetched = RecordFetcher::new(&store)
        .fetch_all(&RecordQuery::new(AppId::new(1)))
        .unwrap();

    let names: Vec<String> = fetched
        .iter()
        .map(|r| r.get("name").unwrap().value.render())
        .collect();
    let expected: Vec<String> = (0..records).map(|i| format!("r{i}")).collect();
    assert_eq!(names, expected);
}
