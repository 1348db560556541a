//! In-memory record store for testing.
//!
//! Behaves like the REST service where tests can observe it: ids and
//! revisions are assigned on insert, service-maintained fields are dropped
//! from inserted records, batches above [`PAGE_SIZE`] are rejected and
//! deleting an unknown id fails the whole batch. Query filters are not
//! evaluated; every record matches.

use super::{PAGE_SIZE, RecordQuery, RecordStore};
use crate::models::{
    AppId, FieldSchema, FieldType, FieldValue, ID_FIELD, REVISION_FIELD, Record, RecordId,
};
use crate::{Error, Result};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A request made against a [`MemoryRecordStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// One page fetch.
    FetchPage {
        /// Requested offset.
        offset: usize,
        /// Requested limit.
        limit: usize,
        /// Records returned.
        returned: usize,
    },
    /// Form schema fetch.
    FetchFields,
    /// One delete batch.
    Delete {
        /// Ids in the batch.
        count: usize,
    },
    /// One insert batch.
    Insert {
        /// Records in the batch.
        count: usize,
    },
}

#[derive(Debug, Default)]
struct State {
    records: Vec<Record>,
    last_id: u64,
    calls: Vec<StoreCall>,
    insert_batches: usize,
    delete_batches: usize,
}

/// In-memory [`RecordStore`].
///
/// Uses `RwLock` for thread-safe access. Data is not persisted.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: RwLock<State>,
    schema: Option<FieldSchema>,
    fail_insert_batch: Option<usize>,
    fail_delete_batch: Option<usize>,
    fail_fetch_at: Option<usize>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `records`; records without `$id` get one.
    #[must_use]
    pub fn with_records(records: Vec<Record>) -> Self {
        let mut state = State::default();
        for record in records {
            match record.id() {
                Some(id) => {
                    state.last_id = state.last_id.max(id.get());
                    state.records.push(record);
                },
                None => {
                    state.last_id += 1;
                    state.records.push(stamp(&record, state.last_id));
                },
            }
        }
        Self {
            state: RwLock::new(state),
            ..Self::default()
        }
    }

    /// Sets the schema returned by [`RecordStore::fetch_fields`].
    ///
    /// Without one, the schema is discovered from the stored records.
    #[must_use]
    pub fn with_schema(mut self, schema: FieldSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Makes the insert batch with this 0-based index fail.
    #[must_use]
    pub const fn fail_insert_batch(mut self, batch: usize) -> Self {
        self.fail_insert_batch = Some(batch);
        self
    }

    /// Makes the delete batch with this 0-based index fail.
    #[must_use]
    pub const fn fail_delete_batch(mut self, batch: usize) -> Self {
        self.fail_delete_batch = Some(batch);
        self
    }

    /// Makes page fetches at this offset fail.
    #[must_use]
    pub const fn fail_fetch_at(mut self, offset: usize) -> Self {
        self.fail_fetch_at = Some(offset);
        self
    }

    /// Returns a copy of the stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn records(&self) -> Result<Vec<Record>> {
        Ok(self.read("records")?.records.clone())
    }

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read("len")?.records.len())
    }

    /// Returns whether the store is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the requests made so far, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn calls(&self) -> Result<Vec<StoreCall>> {
        Ok(self.read("calls")?.calls.clone())
    }

    /// Returns the number of page fetches made so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn fetch_requests(&self) -> Result<usize> {
        Ok(self
            .read("fetch_requests")?
            .calls
            .iter()
            .filter(|c| matches!(c, StoreCall::FetchPage { .. }))
            .count())
    }

    fn read(&self, operation: &str) -> Result<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| Error::OperationFailed {
            operation: operation.to_string(),
            cause: "Lock poisoned".to_string(),
        })
    }

    fn write(&self, operation: &str) -> Result<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| Error::OperationFailed {
            operation: operation.to_string(),
            cause: "Lock poisoned".to_string(),
        })
    }
}

/// Returns a copy of `record` with `$id` and `$revision` first.
fn stamp(record: &Record, id: u64) -> Record {
    let mut stamped = Record::new()
        .with_field(ID_FIELD, FieldType::Id, FieldValue::Text(id.to_string()))
        .with_field(
            REVISION_FIELD,
            FieldType::Revision,
            FieldValue::Text("1".to_string()),
        );
    for field in record.fields() {
        if field.code != ID_FIELD && field.code != REVISION_FIELD {
            stamped.set(field.clone());
        }
    }
    stamped
}

impl RecordStore for MemoryRecordStore {
    fn fetch_page(&self, query: &RecordQuery, offset: usize, limit: usize) -> Result<Vec<Record>> {
        let mut state = self.write("fetch_page")?;
        if self.fail_fetch_at == Some(offset) {
            return Err(Error::Network {
                operation: "fetch_records".to_string(),
                cause: format!("injected failure at offset {offset}"),
            });
        }

        let page: Vec<Record> = state
            .records
            .iter()
            .skip(offset)
            .take(limit)
            .map(|record| match &query.fields {
                Some(fields) => record.retain_fields(|f| fields.contains(&f.code)),
                None => record.clone(),
            })
            .collect();

        state.calls.push(StoreCall::FetchPage {
            offset,
            limit,
            returned: page.len(),
        });
        Ok(page)
    }

    fn fetch_fields(&self, _app: AppId) -> Result<FieldSchema> {
        let mut state = self.write("fetch_fields")?;
        state.calls.push(StoreCall::FetchFields);
        Ok(self
            .schema
            .clone()
            .unwrap_or_else(|| FieldSchema::discover(&state.records)))
    }

    fn delete_batch(&self, _app: AppId, ids: &[RecordId]) -> Result<()> {
        let mut state = self.write("delete_batch")?;
        let batch = state.delete_batches;
        state.delete_batches += 1;
        state.calls.push(StoreCall::Delete { count: ids.len() });

        if ids.len() > PAGE_SIZE || self.fail_delete_batch == Some(batch) {
            return Err(Error::RemoteWrite {
                operation: "delete_records".to_string(),
                cause: format!("batch {batch} rejected"),
            });
        }
        if let Some(missing) = ids
            .iter()
            .find(|id| !state.records.iter().any(|r| r.id() == Some(**id)))
        {
            return Err(Error::RemoteWrite {
                operation: "delete_records".to_string(),
                cause: format!("record {missing} not found"),
            });
        }

        state
            .records
            .retain(|r| r.id().is_none_or(|id| !ids.contains(&id)));
        Ok(())
    }

    fn insert_batch(&self, _app: AppId, records: &[Record]) -> Result<Vec<RecordId>> {
        let mut state = self.write("insert_batch")?;
        let batch = state.insert_batches;
        state.insert_batches += 1;
        state.calls.push(StoreCall::Insert {
            count: records.len(),
        });

        if records.len() > PAGE_SIZE || self.fail_insert_batch == Some(batch) {
            return Err(Error::RemoteWrite {
                operation: "insert_records".to_string(),
                cause: format!("batch {batch} rejected"),
            });
        }

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            state.last_id += 1;
            let writable = record.retain_fields(|f| f.field_type.is_writable());
            let stored = stamp(&writable, state.last_id);
            state.records.push(stored);
            ids.push(RecordId::new(state.last_id));
        }
        Ok(ids)
    }
}
