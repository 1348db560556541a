//! Import/Export I/O subsystem.
//!
//! Converts typed records to and from files.
//!
//! # Architecture
//!
//! - **Columns** fix the flat CSV layout of a run, expanding subtables into
//!   `table.field` columns
//! - **Format adapters** implement [`ImportSource`] and [`ExportSink`]
//! - **Encoding** transcodes CSV text at the file boundary
//! - **Services** orchestrate fetching, conversion and batched writes
//!
//! # Supported Formats
//!
//! | Format | Import | Export | Notes |
//! |--------|--------|--------|-------|
//! | CSV | ✓ | ✓ | One row per subtable row; configurable encoding |
//! | JSON | - | ✓ | Service payload shape, always UTF-8 |
//!
//! # Examples
//!
//! ## Export records to CSV
//!
//! ```rust,ignore
//! use kintone_transfer::io::{ExportOptions, ExportService, Format};
//!
//! let service = ExportService::new(store);
//! let result = service.export_to_writer(
//!     std::io::stdout(),
//!     app,
//!     &ExportOptions::default().with_filter("status = \"open\""),
//! )?;
//! eprintln!("Exported {} records", result.exported);
//! ```
//!
//! ## Import records from a Shift-JIS file
//!
//! ```rust,ignore
//! use kintone_transfer::io::{ImportOptions, ImportService, TextEncoding};
//!
//! let service = ImportService::new(store);
//! let options = ImportOptions::default()
//!     .with_encoding(TextEncoding::ShiftJis)
//!     .with_delete_all(true);
//! let result = service.import_from_file(Path::new("records.csv"), app, options)?;
//! eprintln!("Inserted {} records", result.report.inserted);
//! ```

pub mod columns;
pub mod encoding;
pub mod formats;
pub mod services;
pub mod traits;

// Re-exports for convenience
pub use columns::{AppSchema, Column, ColumnMapper, SchemaSource, UnknownFieldPolicy};
pub use encoding::TextEncoding;
pub use formats::Format;
pub use services::export::{ExportOptions, ExportResult, ExportService};
pub use services::import::{ImportOptions, ImportResult, ImportService};
pub use traits::{ExportSink, ImportSource, collect_records};
