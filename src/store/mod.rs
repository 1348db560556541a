//! Record stores.
//!
//! A [`RecordStore`] is the remote side of a transfer: it serves pages of
//! records, the app's form schema, and accepts batched deletes and inserts.
//!
//! # Backends
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`KintoneClient`] | kintone REST API over blocking HTTP |
//! | [`MemoryRecordStore`] | In-process store for tests and benchmarks |
//!
//! [`RecordFetcher`] and [`BulkWriter`] drive a store in bounded-size
//! requests of [`PAGE_SIZE`] records.

mod http;
mod memory;
mod paging;
pub mod wire;
mod writer;

pub use http::{
    DEFAULT_DOMAIN_SUFFIX, HttpConfig, KintoneClient, build_http_client, normalize_domain,
};
pub use memory::{MemoryRecordStore, StoreCall};
pub use paging::{Pages, RecordFetcher};
pub use writer::{BulkWriter, WriteReport};

use crate::Result;
use crate::models::{AppId, FieldSchema, Record, RecordId};

/// Records per fetch, delete and insert request.
pub const PAGE_SIZE: usize = 100;

/// Which records to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// App to read from.
    pub app: AppId,
    /// Query string in the service's query language, without paging clauses.
    pub filter: Option<String>,
    /// Field codes to return; all fields when `None`.
    pub fields: Option<Vec<String>>,
}

impl RecordQuery {
    /// Creates a query for every record of an app.
    #[must_use]
    pub const fn new(app: AppId) -> Self {
        Self {
            app,
            filter: None,
            fields: None,
        }
    }

    /// Sets the query filter. Blank filters are ignored.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        self.filter = (!filter.trim().is_empty()).then_some(filter);
        self
    }

    /// Restricts the fields returned.
    #[must_use]
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Builds the query string for one page.
    #[must_use]
    pub fn page_query(&self, offset: usize, limit: usize) -> String {
        match &self.filter {
            Some(filter) => format!("{} limit {limit} offset {offset}", filter.trim()),
            None => format!("limit {limit} offset {offset}"),
        }
    }
}

/// Trait for remote record stores.
///
/// Every call is one request; implementations do not retry.
pub trait RecordStore: Send + Sync {
    /// Returns up to `limit` records matching `query`, skipping `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Network`] if the request fails.
    fn fetch_page(&self, query: &RecordQuery, offset: usize, limit: usize) -> Result<Vec<Record>>;

    /// Returns the app's form schema.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Network`] if the request fails.
    fn fetch_fields(&self, app: AppId) -> Result<FieldSchema>;

    /// Deletes records by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RemoteWrite`] if the service rejects the batch.
    fn delete_batch(&self, app: AppId, ids: &[RecordId]) -> Result<()>;

    /// Inserts records and returns their new ids.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RemoteWrite`] if the service rejects the batch.
    fn insert_batch(&self, app: AppId, records: &[Record]) -> Result<Vec<RecordId>>;
}
