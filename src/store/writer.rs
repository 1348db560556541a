//! Batched writes: optional delete-all, then insert.

use super::{PAGE_SIZE, RecordFetcher, RecordStore};
use crate::models::{AppId, Record};
use crate::{Error, Result};

/// Outcome of a [`BulkWriter::write`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Records deleted before inserting.
    pub deleted: usize,
    /// Records inserted.
    pub inserted: usize,
    /// Delete and insert requests made.
    pub batches: usize,
}

/// Writes records to one app in batches of [`PAGE_SIZE`].
///
/// There is no rollback: when a batch fails, batches already committed stay
/// committed and the remaining ones are not sent.
pub struct BulkWriter<'a> {
    store: &'a dyn RecordStore,
    app: AppId,
}

impl<'a> BulkWriter<'a> {
    /// Creates a writer for an app.
    #[must_use]
    pub const fn new(store: &'a dyn RecordStore, app: AppId) -> Self {
        Self { store, app }
    }

    /// Optionally deletes every record of the app, then inserts `records`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] if enumerating existing ids fails and
    /// [`Error::RemoteWrite`] if a delete or insert batch fails.
    pub fn write(&self, records: &[Record], delete_all: bool) -> Result<WriteReport> {
        let mut report = WriteReport::default();
        if delete_all {
            self.delete_all(&mut report)?;
        }
        self.insert(records, &mut report)?;

        tracing::info!(
            app = %self.app,
            deleted = report.deleted,
            inserted = report.inserted,
            batches = report.batches,
            "Bulk write complete"
        );
        Ok(report)
    }

    fn delete_all(&self, report: &mut WriteReport) -> Result<()> {
        // Ids are collected up front; deleting while paging would shift offsets.
        let ids = RecordFetcher::new(self.store).fetch_ids(self.app)?;
        tracing::info!(app = %self.app, count = ids.len(), "Deleting existing records");

        for (batch, chunk) in ids.chunks(PAGE_SIZE).enumerate() {
            self.store
                .delete_batch(self.app, chunk)
                .map_err(|e| as_remote_write("delete_records", batch, e))?;
            report.batches += 1;
            report.deleted += chunk.len();
            tracing::debug!(batch, count = chunk.len(), "Deleted batch");
        }
        Ok(())
    }

    fn insert(&self, records: &[Record], report: &mut WriteReport) -> Result<()> {
        for (batch, chunk) in records.chunks(PAGE_SIZE).enumerate() {
            let ids = self
                .store
                .insert_batch(self.app, chunk)
                .map_err(|e| as_remote_write("insert_records", batch, e))?;
            report.batches += 1;
            report.inserted += ids.len();
            tracing::debug!(batch, count = ids.len(), "Inserted batch");
        }
        Ok(())
    }
}

fn as_remote_write(operation: &str, batch: usize, e: Error) -> Error {
    tracing::error!(operation, batch, error = %e, "Batch failed");
    match e {
        Error::RemoteWrite { .. } => e,
        other => Error::RemoteWrite {
            operation: operation.to_string(),
            cause: format!("batch {batch}: {other}"),
        },
    }
}
