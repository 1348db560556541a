//! CLI command implementations.
//!
//! The binary resolves a [`TransferConfig`] and hands it to [`run`], which
//! picks the command from the configured mode.
//!
//! # Commands
//!
//! | Mode | Trigger | Description |
//! |------|---------|-------------|
//! | export | no `-f` | Fetch every matching record, write CSV/JSON to stdout or `--output` |
//! | import | `-f <file>` | Parse a CSV file, optionally delete all records, insert in batches |
//!
//! # Example Usage
//!
//! ```bash
//! # Export an app to Shift-JIS CSV
//! kintone-transfer -d example -a 42 -t "$TOKEN" -e sjis > records.csv
//!
//! # Export selected fields as JSON
//! kintone-transfer -d example -a 42 -u alice -o json -c name,items --output records.json
//!
//! # Replace every record with the contents of a file
//! kintone-transfer -d example -a 42 -t "$TOKEN" -D -f records.csv
//! ```

mod client_factory;
mod export;
mod import;

pub use client_factory::build_client;
pub use export::ExportCommand;
pub use import::ImportCommand;

use crate::Result;
use crate::config::{Mode, TransferConfig};
use crate::store::RecordStore;
use std::sync::Arc;

/// Runs the command selected by `config` against `store`.
///
/// # Errors
///
/// Returns the first error raised by the command.
pub fn run(config: &TransferConfig, store: Arc<dyn RecordStore>) -> Result<()> {
    match (config.mode(), config.input.as_deref()) {
        (Mode::Import, Some(input)) => {
            ImportCommand::new(input, config.import_options()).run(store, config.app_id)?;
        },
        _ => {
            ExportCommand::new(config.export_options())
                .with_output(config.output.clone())
                .run(store, config.app_id)?;
        },
    }
    Ok(())
}
