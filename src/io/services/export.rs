//! Record export service.
//!
//! Fetches every record matching a query and writes them to a file or
//! writer.

use crate::io::columns::{AppSchema, ColumnMapper, UnknownFieldPolicy};
use crate::io::encoding::TextEncoding;
use crate::io::formats::{Format, create_export_sink};
use crate::io::traits::ExportSink;
use crate::models::{AppId, FieldSchema, Record};
use crate::store::{PAGE_SIZE, RecordFetcher, RecordQuery, RecordStore};
use crate::{Error, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Options for record export.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// File format to export to.
    pub format: Format,
    /// CSV text encoding.
    pub encoding: TextEncoding,
    /// Query filter in the service's query language.
    pub filter: Option<String>,
    /// Fields to export, in column order; all fields when `None`.
    pub fields: Option<Vec<String>>,
    /// Handling of fields outside the column list.
    pub unknown_fields: UnknownFieldPolicy,
}

impl ExportOptions {
    /// Creates export options with the given format.
    #[must_use]
    pub const fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Sets the CSV text encoding.
    #[must_use]
    pub const fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Sets the query filter.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the fields to export.
    #[must_use]
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Sets the handling of fields outside the column list.
    #[must_use]
    pub const fn with_unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }

    /// Builds the record query for an app.
    #[must_use]
    pub fn query(&self, app: AppId) -> RecordQuery {
        let mut query = RecordQuery::new(app);
        if let Some(filter) = &self.filter {
            query = query.with_filter(filter.clone());
        }
        if let Some(fields) = &self.fields {
            query = query.with_fields(fields.clone());
        }
        query
    }
}

/// Result of an export operation.
#[derive(Debug, Clone)]
pub struct ExportResult {
    /// Number of records exported.
    pub exported: usize,
    /// Format used for export.
    pub format: Format,
    /// CSV header labels; empty for JSON.
    pub header: Vec<String>,
    /// Output path (if file export).
    pub output_path: Option<String>,
}

impl ExportResult {
    /// Creates a new export result.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self {
            exported: 0,
            format,
            header: Vec::new(),
            output_path: None,
        }
    }
}

/// Service for exporting records to external formats.
pub struct ExportService {
    /// Store to read records from.
    store: Arc<dyn RecordStore>,
}

impl ExportService {
    /// Creates a new export service.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Exports records to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or export fails.
    pub fn export_to_file(
        &self,
        path: &Path,
        app: AppId,
        options: &ExportOptions,
    ) -> Result<ExportResult> {
        let file = std::fs::File::create(path).map_err(|e| Error::OperationFailed {
            operation: "create_export_file".to_string(),
            cause: e.to_string(),
        })?;
        let writer = std::io::BufWriter::new(file);

        let mut result = self.export_to_writer(writer, app, options)?;
        result.output_path = Some(path.display().to_string());
        Ok(result)
    }

    /// Exports records to a writer.
    ///
    /// Nothing is written if fetching fails.
    ///
    /// # Errors
    ///
    /// Returns an error if fetching, column resolution or writing fails.
    pub fn export_to_writer<W: Write>(
        &self,
        writer: W,
        app: AppId,
        options: &ExportOptions,
    ) -> Result<ExportResult> {
        let query = options.query(app);
        let records = RecordFetcher::new(self.store.as_ref()).fetch_all(&query)?;

        let columns = if options.format.is_tabular() {
            Some(Self::columns(&records, options.fields.as_deref())?)
        } else {
            None
        };

        let mut result = ExportResult::new(options.format);
        result.header = columns.as_ref().map(AppSchema::header).unwrap_or_default();

        let mut sink = create_export_sink(
            writer,
            options.format,
            columns,
            options.encoding,
            options.unknown_fields,
        )?;
        result.exported = Self::export_records(&records, sink.as_mut())?;
        sink.finalize()?;

        tracing::info!(
            app = %app,
            format = %options.format,
            records = result.exported,
            "Export complete"
        );
        Ok(result)
    }

    /// Fixes the column list for a run from the first page of records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if an explicit field is absent from
    /// a non-empty page.
    pub fn columns(records: &[Record], fields: Option<&[String]>) -> Result<AppSchema> {
        let first_page = &records[..records.len().min(PAGE_SIZE)];
        let schema = FieldSchema::discover(first_page);
        let columns = ColumnMapper::from_schema(&schema, fields)?;
        tracing::debug!(columns = ?columns.header(), "Resolved columns");
        Ok(columns)
    }

    /// Writes records to a sink, returning how many were written.
    ///
    /// # Errors
    ///
    /// Returns the first sink error.
    pub fn export_records(records: &[Record], sink: &mut dyn ExportSink) -> Result<usize> {
        for record in records {
            sink.write(record)?;
        }
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldType, FieldValue, SubRow};
    use crate::store::MemoryRecordStore;

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn service(records: Vec<Record>) -> ExportService {
        ExportService::new(Arc::new(MemoryRecordStore::with_records(records)))
    }

    #[test]
    fn test_export_options_defaults() {
        let options = ExportOptions::default();
        assert_eq!(options.format, Format::Csv);
        assert_eq!(options.encoding, TextEncoding::Utf8);
        assert!(options.filter.is_none());
        assert!(options.fields.is_none());
    }

    #[test]
    fn test_query_from_options() {
        let options = ExportOptions::default()
            .with_filter("x = 1")
            .with_fields(vec!["a".to_string()]);
        let query = options.query(AppId::new(5));
        assert_eq!(query.filter.as_deref(), Some("x = 1"));
        assert_eq!(query.fields, Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_export_csv_with_explicit_fields() {
        let record = Record::new()
            .with_field("a", FieldType::SingleLineText, text("1"))
            .with_field("b", FieldType::SingleLineText, text("2"));
        let options = ExportOptions::default().with_fields(vec!["b".to_string(), "a".to_string()]);

        let mut output = Vec::new();
        let result = service(vec![record])
            .export_to_writer(&mut output, AppId::new(1), &options)
            .unwrap();

        assert_eq!(result.header, vec!["b", "a"]);
        assert_eq!(String::from_utf8(output).unwrap(), "b,a\n2,1\n");
    }

    #[test]
    fn test_export_unknown_explicit_field() {
        let record = Record::new().with_field("a", FieldType::SingleLineText, text("1"));
        let options = ExportOptions::default().with_fields(vec!["missing".to_string()]);
        let result = service(vec![record]).export_to_writer(Vec::new(), AppId::new(1), &options);
        assert!(matches!(result, Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn test_export_empty_app() {
        let mut output = Vec::new();
        let result = service(Vec::new())
            .export_to_writer(&mut output, AppId::new(1), &ExportOptions::default())
            .unwrap();
        assert_eq!(result.exported, 0);
        assert!(output.is_empty());
    }

    #[test]
    fn test_export_json_keeps_subtables() {
        let row = SubRow::new().with_field("item", FieldType::SingleLineText, text("pen"));
        let record = Record::new().with_field(
            "lines",
            FieldType::Subtable,
            FieldValue::Subtable(vec![row]),
        );
        let options = ExportOptions::default().with_format(Format::Json);

        let mut output = Vec::new();
        let result = service(vec![record])
            .export_to_writer(&mut output, AppId::new(1), &options)
            .unwrap();
        assert!(result.header.is_empty());

        let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(
            parsed["records"][0]["lines"]["value"][0]["value"]["item"]["value"],
            "pen"
        );
    }
}
