//! Format adapters for import/export.
//!
//! CSV implements both [`ImportSource`] and [`ExportSink`]; JSON is export
//! only.

pub mod csv;
pub mod json;

use crate::io::columns::{AppSchema, UnknownFieldPolicy};
use crate::io::encoding::TextEncoding;
use crate::models::FieldSchema;
use crate::{Error, Result};
use std::io::{Read, Write};
use std::str::FromStr;

use super::traits::{ExportSink, ImportSource};

/// Supported file formats for import/export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// CSV with one row per flattened subtable row.
    #[default]
    Csv,
    /// JSON in the service's record payload shape (export only).
    Json,
}

impl Format {
    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// Returns whether this format supports import.
    #[must_use]
    pub const fn supports_import(&self) -> bool {
        matches!(self, Self::Csv)
    }

    /// Returns whether the format uses the column list and text encoding.
    #[must_use]
    pub const fn is_tabular(&self) -> bool {
        matches!(self, Self::Csv)
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(Error::InvalidInput(format!("Unknown format: {s}"))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Creates an import source for the given format and reader.
///
/// CSV columns are inferred from the header and typed through `schema`.
///
/// # Errors
///
/// Returns an error if the format doesn't support import or the header does
/// not match the schema.
pub fn create_import_source<'a, R: Read + 'a>(
    reader: R,
    format: Format,
    schema: Option<&FieldSchema>,
) -> Result<Box<dyn ImportSource + 'a>> {
    match format {
        Format::Csv => Ok(Box::new(csv::CsvImportSource::new(reader, schema)?)),
        Format::Json => Err(Error::InvalidInput(
            "JSON import is not supported".to_string(),
        )),
    }
}

/// Creates an export sink for the given format and writer.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if CSV is requested without columns.
pub fn create_export_sink<'a, W: Write + 'a>(
    writer: W,
    format: Format,
    columns: Option<AppSchema>,
    encoding: TextEncoding,
    unknown_fields: UnknownFieldPolicy,
) -> Result<Box<dyn ExportSink + 'a>> {
    match format {
        Format::Json => Ok(Box::new(json::JsonExportSink::new(writer))),
        Format::Csv => {
            let columns = columns.ok_or_else(|| {
                Error::InvalidInput("CSV export needs a column list".to_string())
            })?;
            Ok(Box::new(
                csv::CsvExportSink::new(writer, columns, encoding)
                    .with_unknown_fields(unknown_fields),
            ))
        },
    }
}
