//! Data models for kintone-transfer.
//!
//! This module contains the typed record representation shared by the
//! fetcher, the serializers and the bulk writer.

mod field;
mod record;
mod schema;

pub use field::{
    DATE_FORMAT, DATETIME_FORMAT, Entity, FieldType, FieldValue, FileRef, MULTI_VALUE_SEPARATOR,
    TIME_FORMAT,
};
pub(crate) use field::parse_datetime;
pub use record::{AppId, Field, ID_FIELD, REVISION_FIELD, Record, RecordId, SubRow};
pub use schema::{FieldSchema, FieldSpec};
