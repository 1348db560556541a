//! Export CLI command.

use crate::Result;
use crate::io::{ExportOptions, ExportResult, ExportService};
use crate::models::AppId;
use crate::store::RecordStore;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

/// Export command handler.
#[derive(Debug, Clone, Default)]
pub struct ExportCommand {
    options: ExportOptions,
    output: Option<PathBuf>,
}

impl ExportCommand {
    /// Creates a new export command writing to stdout.
    #[must_use]
    pub const fn new(options: ExportOptions) -> Self {
        Self {
            options,
            output: None,
        }
    }

    /// Writes to a file instead of stdout.
    #[must_use]
    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    /// Runs the export.
    ///
    /// # Errors
    ///
    /// Returns an error if fetching or writing fails.
    pub fn run(&self, store: Arc<dyn RecordStore>, app: AppId) -> Result<ExportResult> {
        let service = ExportService::new(store);
        let result = match &self.output {
            Some(path) => service.export_to_file(path, app, &self.options)?,
            None => {
                let stdout = std::io::stdout();
                service.export_to_writer(BufWriter::new(stdout.lock()), app, &self.options)?
            },
        };

        tracing::info!(
            records = result.exported,
            columns = result.header.len(),
            output = result.output_path.as_deref().unwrap_or("stdout"),
            "Wrote export"
        );
        Ok(result)
    }
}
