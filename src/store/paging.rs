//! Paginated record retrieval.

use super::{PAGE_SIZE, RecordQuery, RecordStore};
use crate::models::{AppId, ID_FIELD, Record, RecordId};
use crate::{Error, Result};

/// Fetches every record matching a query in pages of [`PAGE_SIZE`].
///
/// The offset advances by the number of records each page returned, and
/// fetching stops at the first short page. `N` matching records therefore
/// take `N / PAGE_SIZE + 1` requests.
pub struct RecordFetcher<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> RecordFetcher<'a> {
    /// Creates a fetcher over a store.
    #[must_use]
    pub const fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// Returns a lazy iterator over the non-empty pages of `query`.
    ///
    /// Each call starts again from offset zero.
    #[must_use]
    pub const fn pages<'q>(&self, query: &'q RecordQuery) -> Pages<'a, 'q> {
        Pages {
            store: self.store,
            query,
            offset: 0,
            requests: 0,
            done: false,
        }
    }

    /// Fetches all matching records.
    ///
    /// # Errors
    ///
    /// Returns the first page error; records from earlier pages are dropped.
    pub fn fetch_all(&self, query: &RecordQuery) -> Result<Vec<Record>> {
        let mut pages = self.pages(query);
        let mut records = Vec::new();
        for page in &mut pages {
            records.extend(page?);
        }
        tracing::info!(
            app = %query.app,
            records = records.len(),
            requests = pages.requests(),
            "Fetched records"
        );
        Ok(records)
    }

    /// Fetches the ids of every record in an app.
    ///
    /// # Errors
    ///
    /// Returns the first page error, or [`Error::InvalidInput`] for a record
    /// without a readable id.
    pub fn fetch_ids(&self, app: AppId) -> Result<Vec<RecordId>> {
        let query = RecordQuery::new(app).with_fields(vec![ID_FIELD.to_string()]);
        let mut ids = Vec::new();
        for page in self.pages(&query) {
            for record in page? {
                let id = record.id().ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "record {} of app {app} has no readable {ID_FIELD}",
                        ids.len() + 1
                    ))
                })?;
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

/// Iterator over the pages of one query.
pub struct Pages<'a, 'q> {
    store: &'a dyn RecordStore,
    query: &'q RecordQuery,
    offset: usize,
    requests: usize,
    done: bool,
}

impl Pages<'_, '_> {
    /// Returns the number of requests made so far.
    #[must_use]
    pub const fn requests(&self) -> usize {
        self.requests
    }
}

impl Iterator for Pages<'_, '_> {
    type Item = Result<Vec<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.requests += 1;
        let page = match self.store.fetch_page(self.query, self.offset, PAGE_SIZE) {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                tracing::error!(offset = self.offset, error = %e, "Failed to fetch page");
                return Some(Err(e));
            },
        };

        tracing::debug!(offset = self.offset, count = page.len(), "Fetched page");
        self.offset += page.len();
        if page.len() < PAGE_SIZE {
            self.done = true;
        }

        if page.is_empty() { None } else { Some(Ok(page)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldType, FieldValue};
    use crate::store::{MemoryRecordStore, StoreCall};

    fn store_with(n: usize) -> MemoryRecordStore {
        let records = (0..n)
            .map(|i| {
                Record::new().with_field(
                    "n",
                    FieldType::Number,
                    FieldValue::Number(Some(i.to_string())),
                )
            })
            .collect();
        MemoryRecordStore::with_records(records)
    }

    #[test]
    fn test_offsets_advance_by_page_length() {
        let store = store_with(250);
        let query = RecordQuery::new(AppId::new(1));
        let records = RecordFetcher::new(&store).fetch_all(&query).unwrap();
        assert_eq!(records.len(), 250);

        let offsets: Vec<_> = store
            .calls()
            .unwrap()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::FetchPage { offset, returned, .. } => Some((offset, returned)),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![(0, 100), (100, 100), (200, 50)]);
    }

    #[test]
    fn test_pages_restart() {
        let store = store_with(150);
        let query = RecordQuery::new(AppId::new(1));
        let fetcher = RecordFetcher::new(&store);
        assert_eq!(fetcher.pages(&query).count(), 2);
        assert_eq!(fetcher.pages(&query).count(), 2);
    }

    #[test]
    fn test_error_aborts_fetch() {
        let store = store_with(250).fail_fetch_at(100);
        let query = RecordQuery::new(AppId::new(1));
        let result = RecordFetcher::new(&store).fetch_all(&query);
        assert!(matches!(result, Err(Error::Network { .. })));
    }

    #[test]
    fn test_fetch_ids() {
        let store = store_with(3);
        let ids = RecordFetcher::new(&store).fetch_ids(AppId::new(1)).unwrap();
        assert_eq!(ids, vec![RecordId::new(1), RecordId::new(2), RecordId::new(3)]);
    }

    /// Serves one page of records that carry no id.
    struct IdlessStore;

    impl RecordStore for IdlessStore {
        fn fetch_page(&self, _query: &RecordQuery, offset: usize, _limit: usize) -> Result<Vec<Record>> {
            if offset > 0 {
                return Ok(Vec::new());
            }
            Ok(vec![Record::new().with_field(
                "name",
                crate::models::FieldType::SingleLineText,
                crate::models::FieldValue::Text("x".to_string()),
            )])
        }

        fn fetch_fields(&self, _app: AppId) -> Result<crate::models::FieldSchema> {
            Ok(crate::models::FieldSchema::default())
        }

        fn delete_batch(&self, _app: AppId, _ids: &[RecordId]) -> Result<()> {
            Ok(())
        }

        fn insert_batch(&self, _app: AppId, _records: &[Record]) -> Result<Vec<RecordId>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_fetch_ids_rejects_record_without_id() {
        let result = RecordFetcher::new(&IdlessStore).fetch_ids(AppId::new(1));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
