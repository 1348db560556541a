//! JSON format adapter for export.
//!
//! Output mirrors the service's own get-records payload, one record per line:
//!
//! ```text
//! {"records":[
//! {"$id":{"type":"__ID__","value":"1"},...},
//! {"$id":{"type":"__ID__","value":"2"},...}
//! ]}
//! ```
//!
//! JSON is always UTF-8 and does not depend on any column list.

use crate::io::traits::ExportSink;
use crate::models::Record;
use crate::store::wire;
use crate::{Error, Result};
use std::io::Write;

/// JSON export sink.
pub struct JsonExportSink<W: Write> {
    writer: W,
    /// Number of records written.
    count: usize,
}

impl<W: Write> JsonExportSink<W> {
    /// Creates a new JSON export sink.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer, count: 0 }
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_all(bytes)
            .map_err(|e| Error::OperationFailed {
                operation: "write_json".to_string(),
                cause: e.to_string(),
            })
    }
}

impl<W: Write> ExportSink for JsonExportSink<W> {
    fn write(&mut self, record: &Record) -> Result<()> {
        let line = serde_json::to_string(&wire::record_to_json(record)).map_err(|e| {
            Error::OperationFailed {
                operation: "serialize_json".to_string(),
                cause: e.to_string(),
            }
        })?;

        let prefix: &[u8] = if self.count == 0 { b"{\"records\":[\n" } else { b",\n" };
        self.write_raw(prefix)?;
        self.write_raw(line.as_bytes())?;
        self.count += 1;
        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<()> {
        let footer: &[u8] = if self.count == 0 { b"{\"records\":[]}\n" } else { b"\n]}\n" };
        self.write_raw(footer)?;
        self.writer.flush().map_err(|e| Error::OperationFailed {
            operation: "flush_json".to_string(),
            cause: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldType, FieldValue, SubRow};
    use serde_json::Value;

    fn export(records: &[Record]) -> String {
        let mut output = Vec::new();
        {
            let mut sink = JsonExportSink::new(&mut output);
            for record in records {
                sink.write(record).unwrap();
            }
            Box::new(sink).finalize().unwrap();
        }
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_one_record_per_line() {
        let records: Vec<_> = (0..3)
            .map(|i| {
                Record::new().with_field(
                    "name",
                    FieldType::SingleLineText,
                    FieldValue::Text(format!("r{i}")),
                )
            })
            .collect();
        let output = export(&records);

        assert_eq!(output.lines().count(), 5);
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["records"].as_array().unwrap().len(), 3);
        assert_eq!(parsed["records"][1]["name"]["value"], "r1");
    }

    #[test]
    fn test_empty_export_is_valid_json() {
        let output = export(&[]);
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["records"], Value::Array(Vec::new()));
    }

    #[test]
    fn test_subtable_structure_preserved() {
        let record = Record::new().with_field(
            "lines",
            FieldType::Subtable,
            FieldValue::Subtable(vec![SubRow::new().with_field(
                "item",
                FieldType::SingleLineText,
                FieldValue::Text("pen\nink".to_string()),
            )]),
        );
        let output = export(&[record.clone()]);
        let parsed: Value = serde_json::from_str(&output).unwrap();
        let back = wire::record_from_json(&parsed["records"][0]).unwrap();
        assert_eq!(back, record);
    }
}
