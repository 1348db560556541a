//! Core traits for import/export operations.
//!
//! Defines the [`ImportSource`] and [`ExportSink`] traits that format adapters
//! implement to support different file formats.

use crate::Result;
use crate::models::Record;

/// Source of imported records.
///
/// Implementations read records from a specific format and yield them one at
/// a time.
pub trait ImportSource {
    /// Reads the next record from the source.
    ///
    /// Returns `Ok(None)` when the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O errors occur.
    fn next(&mut self) -> Result<Option<Record>>;
}

/// Sink for exported records.
///
/// # Lifecycle
///
/// 1. Create sink with output destination
/// 2. Call `write()` for each record
/// 3. Call `finalize()` to complete the export
pub trait ExportSink {
    /// Writes a single record to the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or I/O fails.
    fn write(&mut self, record: &Record) -> Result<()>;

    /// Finalizes the export, writing any footers and flushing buffers.
    ///
    /// This method consumes the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if I/O fails.
    fn finalize(self: Box<Self>) -> Result<()>;
}

/// Drains a source into a vector.
///
/// # Errors
///
/// Returns the first error the source reports.
pub fn collect_records(source: &mut dyn ImportSource) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    while let Some(record) = source.next()? {
        records.push(record);
    }
    Ok(records)
}
