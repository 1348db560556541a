//! Record import service.
//!
//! Parses a CSV file completely, then hands the records to a
//! [`BulkWriter`]. A parse failure therefore never leaves the app
//! half-written.

use crate::io::encoding::TextEncoding;
use crate::io::formats::{Format, create_import_source};
use crate::io::traits::collect_records;
use crate::models::{AppId, FieldSchema, Record};
use crate::store::{BulkWriter, RecordStore, WriteReport};
use crate::{Error, Result};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

/// Options for record import.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// File format to import from.
    pub format: Format,
    /// CSV text encoding.
    pub encoding: TextEncoding,
    /// Delete every existing record before inserting.
    pub delete_all: bool,
}

impl ImportOptions {
    /// Creates import options with the given format.
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

    /// Enables or disables deleting existing records first.
    #[must_use]
    pub const fn with_delete_all(mut self, delete_all: bool) -> Self {
        self.delete_all = delete_all;
        self
    }
}

/// Result of an import operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportResult {
    /// Records parsed from the file.
    pub parsed: usize,
    /// What the bulk writer did.
    pub report: WriteReport,
}

/// Service for importing records from external formats.
pub struct ImportService {
    /// Store to write records to.
    store: Arc<dyn RecordStore>,
}

impl ImportService {
    /// Creates a new import service.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Imports records from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or import fails.
    pub fn import_from_file(
        &self,
        path: &Path,
        app: AppId,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let bytes = std::fs::read(path).map_err(|e| Error::OperationFailed {
            operation: "read_import_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        self.import_from_bytes(&bytes, app, options)
    }

    /// Imports records from encoded file contents.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding, parsing or writing fails.
    pub fn import_from_bytes(
        &self,
        bytes: &[u8],
        app: AppId,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let schema = self.store.fetch_fields(app)?;
        let records = Self::parse(bytes, &schema, options)?;
        tracing::info!(app = %app, records = records.len(), "Parsed import file");

        let report = BulkWriter::new(self.store.as_ref(), app).write(&records, options.delete_all)?;
        Ok(ImportResult {
            parsed: records.len(),
            report,
        })
    }

    /// Decodes and parses file contents into records.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not decode or a row does not parse.
    pub fn parse(bytes: &[u8], schema: &FieldSchema, options: ImportOptions) -> Result<Vec<Record>> {
        if !options.format.supports_import() {
            return Err(Error::InvalidInput(format!(
                "Format {} does not support import",
                options.format
            )));
        }

        let text = options.encoding.decode(bytes)?;
        let mut source = create_import_source(Cursor::new(text.as_bytes()), options.format, Some(schema))?;
        collect_records(source.as_mut())
    }
}
