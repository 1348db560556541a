//! Integration tests for kintone-transfer.
//!
//! Drive the export and import services end to end against the in-memory
//! store, through real files where the CLI would use them.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;

use kintone_transfer::io::{
    ExportOptions, ExportService, Format, ImportOptions, ImportService, TextEncoding,
    UnknownFieldPolicy,
};
use kintone_transfer::models::{FieldSchema, FieldSpec, ID_FIELD, REVISION_FIELD};
use kintone_transfer::store::{MemoryRecordStore, StoreCall};
use kintone_transfer::{AppId, Error, FieldType, FieldValue, Record, SubRow};

const APP: AppId = AppId::new(42);

fn text(s: &str) -> FieldValue {
    FieldValue::Text(s.to_string())
}

fn numbered(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            Record::new()
                .with_field("name", FieldType::SingleLineText, text(&format!("r{i}")))
                .with_field(
                    "qty",
                    FieldType::Number,
                    FieldValue::Number(Some(i.to_string())),
                )
        })
        .collect()
}

fn order(title: &str, items: &[(&str, &str)]) -> Record {
    let rows = items
        .iter()
        .map(|(item, qty)| {
            SubRow::new()
                .with_field("item", FieldType::SingleLineText, text(item))
                .with_field("qty", FieldType::Number, FieldValue::Number(Some((*qty).to_string())))
        })
        .collect();
    Record::new()
        .with_field("title", FieldType::SingleLineText, text(title))
        .with_field("lines", FieldType::Subtable, FieldValue::Subtable(rows))
}

fn without_system_fields(record: &Record) -> Record {
    record.retain_fields(|f| f.code != ID_FIELD && f.code != REVISION_FIELD)
}

fn fetch_pages(store: &MemoryRecordStore) -> Vec<(usize, usize)> {
    store
        .calls()
        .unwrap()
        .into_iter()
        .filter_map(|call| match call {
            StoreCall::FetchPage {
                offset, returned, ..
            } => Some((offset, returned)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_export_250_records_as_json() {
    let store = Arc::new(MemoryRecordStore::with_records(numbered(250)));
    let service = ExportService::new(store.clone());
    let options = ExportOptions::default().with_format(Format::Json);

    let mut output = Vec::new();
    let result = service
        .export_to_writer(&mut output, APP, &options)
        .unwrap();

    assert_eq!(result.exported, 250);
    assert_eq!(fetch_pages(&store), vec![(0, 100), (100, 100), (200, 50)]);

    let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let records = parsed["records"].as_array().unwrap();
    assert_eq!(records.len(), 250);
    assert_eq!(records[249]["name"]["value"], "r249");
    assert_eq!(records[0]["qty"]["type"], "NUMBER");
}

#[test]
fn test_export_exact_page_multiple_ends_with_empty_page() {
    let store = Arc::new(MemoryRecordStore::with_records(numbered(200)));
    let service = ExportService::new(store.clone());

    service
        .export_to_writer(Vec::new(), APP, &ExportOptions::default())
        .unwrap();
    assert_eq!(fetch_pages(&store), vec![(0, 100), (100, 100), (200, 0)]);
}

#[test]
fn test_failed_fetch_writes_nothing() {
    let store = Arc::new(MemoryRecordStore::with_records(numbered(150)).fail_fetch_at(100));
    let service = ExportService::new(store);

    let mut output = Vec::new();
    let result = service.export_to_writer(&mut output, APP, &ExportOptions::default());

    assert!(matches!(result, Err(Error::Network { .. })));
    assert!(output.is_empty());
}

#[test]
fn test_delete_all_then_insert() {
    let schema = FieldSchema::new(vec![
        FieldSpec::new("name", FieldType::SingleLineText),
        FieldSpec::new("qty", FieldType::Number),
    ]);
    let store = Arc::new(MemoryRecordStore::with_records(numbered(120)).with_schema(schema));

    let mut csv = String::from("name,qty\n");
    for i in 0..130 {
        csv.push_str(&format!("new{i},{i}\n"));
    }

    let options = ImportOptions::default().with_delete_all(true);
    let result = ImportService::new(store.clone())
        .import_from_bytes(csv.as_bytes(), APP, options)
        .unwrap();

    assert_eq!(result.parsed, 130);
    assert_eq!(result.report.deleted, 120);
    assert_eq!(result.report.inserted, 130);
    assert_eq!(store.len().unwrap(), 130);

    let writes: Vec<StoreCall> = store
        .calls()
        .unwrap()
        .into_iter()
        .filter(|c| matches!(c, StoreCall::Delete { .. } | StoreCall::Insert { .. }))
        .collect();
    assert_eq!(
        writes,
        vec![
            StoreCall::Delete { count: 100 },
            StoreCall::Delete { count: 20 },
            StoreCall::Insert { count: 100 },
            StoreCall::Insert { count: 30 },
        ]
    );

    let stored = store.records().unwrap();
    assert!(
        stored
            .iter()
            .all(|r| r.get("name").unwrap().value.render().starts_with("new"))
    );
}

#[test]
fn test_rejected_insert_batch_keeps_earlier_batches() {
    let schema = FieldSchema::new(vec![FieldSpec::new("name", FieldType::SingleLineText)]);
    let store = Arc::new(MemoryRecordStore::new().with_schema(schema).fail_insert_batch(1));

    let mut csv = String::from("name\n");
    for i in 0..150 {
        csv.push_str(&format!("n{i}\n"));
    }

    let result = ImportService::new(store.clone()).import_from_bytes(
        csv.as_bytes(),
        APP,
        ImportOptions::default(),
    );

    assert!(matches!(result, Err(Error::RemoteWrite { .. })));
    assert_eq!(store.len().unwrap(), 100);
}

#[test]
fn test_subtable_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.csv");
    let records = vec![
        order("A", &[("pen", "2"), ("ink", "1"), ("pad", "5")]),
        order("B", &[]),
    ];
    let source = Arc::new(MemoryRecordStore::with_records(records.clone()));

    let exported = ExportService::new(source.clone())
        .export_to_file(&path, APP, &ExportOptions::default())
        .unwrap();
    assert_eq!(
        exported.header,
        vec!["$id", "$revision", "title", "lines.item", "lines.qty"]
    );

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written.lines().count(), 1 + 3 + 1);

    let schema = FieldSchema::discover(&source.records().unwrap());
    let target = Arc::new(MemoryRecordStore::new().with_schema(schema));
    let imported = ImportService::new(target.clone())
        .import_from_file(&path, APP, ImportOptions::default())
        .unwrap();

    assert_eq!(imported.parsed, 2);
    let stored: Vec<Record> = target
        .records()
        .unwrap()
        .iter()
        .map(without_system_fields)
        .collect();
    let blank = SubRow::new()
        .with_field("item", FieldType::SingleLineText, text(""))
        .with_field("qty", FieldType::Number, FieldValue::Number(None));
    let expected = vec![
        records[0].clone(),
        Record::new()
            .with_field("title", FieldType::SingleLineText, text("B"))
            .with_field("lines", FieldType::Subtable, FieldValue::Subtable(vec![blank])),
    ];
    assert_eq!(stored, expected);
}

#[test]
fn test_shift_jis_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.csv");
    let records = vec![
        Record::new().with_field("name", FieldType::SingleLineText, text("山田太郎")),
        Record::new().with_field("name", FieldType::SingleLineText, text("ｶﾀｶﾅ, and commas")),
    ];
    let source = Arc::new(MemoryRecordStore::with_records(records.clone()));
    let options = ExportOptions::default()
        .with_encoding(TextEncoding::ShiftJis)
        .with_fields(vec!["name".to_string()]);

    ExportService::new(source)
        .export_to_file(&path, APP, &options)
        .unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert!(std::str::from_utf8(&bytes).is_err());

    let schema = FieldSchema::new(vec![FieldSpec::new("name", FieldType::SingleLineText)]);
    let target = Arc::new(MemoryRecordStore::new().with_schema(schema));
    ImportService::new(target.clone())
        .import_from_file(
            &path,
            APP,
            ImportOptions::default().with_encoding(TextEncoding::ShiftJis),
        )
        .unwrap();

    let stored: Vec<Record> = target
        .records()
        .unwrap()
        .iter()
        .map(without_system_fields)
        .collect();
    assert_eq!(stored, records);
}

#[test]
fn test_header_fixed_by_first_page() {
    let mut records = numbered(150);
    records[120].set(kintone_transfer::Field::new(
        "late",
        FieldType::SingleLineText,
        text("surprise"),
    ));
    let store = Arc::new(MemoryRecordStore::with_records(records));
    let service = ExportService::new(store);

    let mut first = Vec::new();
    let result = service
        .export_to_writer(&mut first, APP, &ExportOptions::default())
        .unwrap();
    assert_eq!(result.header, vec!["$id", "$revision", "name", "qty"]);

    let mut second = Vec::new();
    service
        .export_to_writer(&mut second, APP, &ExportOptions::default())
        .unwrap();
    assert_eq!(first, second);

    let text = String::from_utf8(first).unwrap();
    assert!(!text.contains("surprise"));
    assert_eq!(text.lines().count(), 151);

    let strict = ExportOptions::default().with_unknown_fields(UnknownFieldPolicy::Error);
    let result = service.export_to_writer(Vec::new(), APP, &strict);
    assert!(matches!(result, Err(Error::SchemaMismatch(_))));
}

#[test]
fn test_import_header_mismatch_writes_nothing() {
    let schema = FieldSchema::new(vec![FieldSpec::new("name", FieldType::SingleLineText)]);
    let store = Arc::new(MemoryRecordStore::with_records(numbered(3)).with_schema(schema));

    let options = ImportOptions::default().with_delete_all(true);
    let result = ImportService::new(store.clone()).import_from_bytes(
        b"name,unknown\na,b\n",
        APP,
        options,
    );

    assert!(matches!(result, Err(Error::SchemaMismatch(_))));
    assert_eq!(store.len().unwrap(), 3);
}
