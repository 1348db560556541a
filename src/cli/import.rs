//! Import CLI command.

use crate::Result;
use crate::io::{ImportOptions, ImportResult, ImportService};
use crate::models::AppId;
use crate::store::RecordStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Import command handler.
#[derive(Debug, Clone)]
pub struct ImportCommand {
    input: PathBuf,
    options: ImportOptions,
}

impl ImportCommand {
    /// Creates a new import command for a file.
    #[must_use]
    pub fn new(input: &Path, options: ImportOptions) -> Self {
        Self {
            input: input.to_path_buf(),
            options,
        }
    }

    /// Runs the import.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a batch is rejected.
    pub fn run(&self, store: Arc<dyn RecordStore>, app: AppId) -> Result<ImportResult> {
        let result =
            ImportService::new(store).import_from_file(&self.input, app, self.options)?;

        tracing::info!(
            input = %self.input.display(),
            parsed = result.parsed,
            deleted = result.report.deleted,
            inserted = result.report.inserted,
            "Import complete"
        );
        Ok(result)
    }
}
