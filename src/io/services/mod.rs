//! Import and export service implementations.
//!
//! Orchestrate fetching, format conversion and batched writes.

pub mod export;
pub mod import;

pub use export::{ExportOptions, ExportResult, ExportService};
pub use import::{ImportOptions, ImportResult, ImportService};
