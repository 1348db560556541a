//! # kintone-transfer
//!
//! Bulk export and import of kintone app records.
//!
//! Records are fetched page by page from an app and written as CSV or JSON,
//! or read back from CSV and inserted into an app, optionally after deleting
//! every existing record.
//!
//! ## Features
//!
//! - Typed field values for every kintone field type
//! - Subtables flattened into CSV rows and reconstructed on import
//! - CSV in UTF-8, UTF-16, Shift-JIS or EUC-JP
//! - Pluggable [`RecordStore`] backends (REST client, in-memory)
//!
//! ## Example
//!
//! ```rust,ignore
//! use kintone_transfer::cli::build_client;
//! use kintone_transfer::io::ExportService;
//! use kintone_transfer::security::PromptingCredentials;
//!
//! let client = build_client(&config, &PromptingCredentials)?;
//! let service = ExportService::new(Arc::new(client));
//! let result = service.export_to_writer(std::io::stdout(), config.app_id, &config.export_options())?;
//! tracing::info!(records = result.exported, "done");
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod io;
pub mod models;
pub mod observability;
pub mod security;
pub mod store;

// Re-exports for convenience
pub use config::TransferConfig;
pub use models::{AppId, Field, FieldType, FieldValue, Record, RecordId, SubRow};
pub use store::{PAGE_SIZE, RecordQuery, RecordStore};

/// Error type for transfer operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Network` | Transport failure or error status while fetching records or the form schema |
/// | `SchemaMismatch` | CSV header or requested fields disagree with the app schema |
/// | `FieldFormat` | A CSV cell cannot be parsed as its column's type |
/// | `UnsupportedEncoding` | Unknown character encoding name |
/// | `RemoteWrite` | The service rejects a delete or insert batch |
/// | `InvalidInput` | Malformed arguments, bytes that do not decode, unrepresentable text |
/// | `OperationFailed` | File I/O, configuration parsing, lock poisoning |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Transport or service failure while reading from the remote app.
    #[error("network error during '{operation}': {cause}")]
    Network {
        /// The request that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Columns disagree between the file and the app schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A CSV cell could not be parsed as its column's type.
    ///
    /// `row` is the 1-based data row index (the header is row 0).
    #[error("row {row}, column '{column}': {message}")]
    FieldFormat {
        /// Data row index.
        row: usize,
        /// Column label as it appears in the header.
        column: String,
        /// What was wrong with the value.
        message: String,
    },

    /// The configured character encoding is not supported.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// The service rejected a delete or insert batch.
    ///
    /// Batches committed before the failure are not rolled back.
    #[error("remote write '{operation}' failed: {cause}")]
    RemoteWrite {
        /// The write that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A local operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for transfer operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::FieldFormat {
            row: 3,
            column: "price".to_string(),
            message: "not a number".to_string(),
        };
        assert_eq!(err.to_string(), "row 3, column 'price': not a number");

        let err = Error::UnsupportedEncoding("latin-9".to_string());
        assert_eq!(err.to_string(), "unsupported encoding: latin-9");
    }
}
