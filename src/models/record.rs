//! Records, subtable rows and identifiers.

use super::field::{FieldType, FieldValue};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Field code of the internal record id.
pub const ID_FIELD: &str = "$id";

/// Field code of the internal revision counter.
pub const REVISION_FIELD: &str = "$revision";

/// Numeric identifier of a kintone app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(u64);

impl AppId {
    /// Creates an app id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AppId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(Error::InvalidInput(format!("invalid app id: {s}"))),
            Ok(id) => Ok(Self(id)),
        }
    }
}

/// Identifier of a record within an app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    /// Creates a record id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| Error::InvalidInput(format!("invalid record id: {s}")))
    }
}

/// A field code with its type and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field code.
    pub code: String,
    /// Field type.
    pub field_type: FieldType,
    /// Typed value.
    pub value: FieldValue,
}

impl Field {
    /// Creates a field.
    #[must_use]
    pub fn new(code: impl Into<String>, field_type: FieldType, value: FieldValue) -> Self {
        Self {
            code: code.into(),
            field_type,
            value,
        }
    }
}

/// Sets `field` in an ordered field list, replacing an existing entry with
/// the same code in place.
fn upsert(fields: &mut Vec<Field>, field: Field) {
    if let Some(existing) = fields.iter_mut().find(|f| f.code == field.code) {
        *existing = field;
    } else {
        fields.push(field);
    }
}

/// One row of a subtable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubRow {
    /// Row id assigned by the service; absent on rows built locally.
    pub id: Option<String>,
    fields: Vec<Field>,
}

impl SubRow {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, keeping insertion order.
    #[must_use]
    pub fn with_field(
        mut self,
        code: impl Into<String>,
        field_type: FieldType,
        value: FieldValue,
    ) -> Self {
        self.set(Field::new(code, field_type, value));
        self
    }

    /// Sets a field, replacing any field with the same code.
    pub fn set(&mut self, field: Field) {
        upsert(&mut self.fields, field);
    }

    /// Returns the fields in order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks up a field by code.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.code == code)
    }
}

/// A record: field codes mapped to typed values, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, keeping insertion order.
    #[must_use]
    pub fn with_field(
        mut self,
        code: impl Into<String>,
        field_type: FieldType,
        value: FieldValue,
    ) -> Self {
        self.set(Field::new(code, field_type, value));
        self
    }

    /// Sets a field, replacing any field with the same code.
    pub fn set(&mut self, field: Field) {
        upsert(&mut self.fields, field);
    }

    /// Returns the fields in order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks up a field by code.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.code == code)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the internal record id, if the record was fetched with it.
    #[must_use]
    pub fn id(&self) -> Option<RecordId> {
        let field = self
            .get(ID_FIELD)
            .or_else(|| self.fields.iter().find(|f| f.field_type == FieldType::Id))?;
        match &field.value {
            FieldValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Returns the subtable fields with their rows.
    pub fn subtables(&self) -> impl Iterator<Item = (&str, &[SubRow])> {
        self.fields
            .iter()
            .filter_map(|f| f.value.as_subtable().map(|rows| (f.code.as_str(), rows)))
    }

    /// Returns a copy that only keeps fields accepted by `keep`.
    #[must_use]
    pub fn retain_fields(&self, mut keep: impl FnMut(&Field) -> bool) -> Self {
        Self {
            fields: self.fields.iter().filter(|f| keep(f)).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    #[test]
    fn test_record_keeps_insertion_order() {
        let record = Record::new()
            .with_field("b", FieldType::SingleLineText, text("1"))
            .with_field("a", FieldType::SingleLineText, text("2"))
            .with_field("b", FieldType::SingleLineText, text("3"));

        let codes: Vec<_> = record.fields().iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["b", "a"]);
        assert_eq!(record.get("b").unwrap().value, text("3"));
    }

    #[test]
    fn test_record_id() {
        let record = Record::new().with_field(ID_FIELD, FieldType::Id, text("42"));
        assert_eq!(record.id(), Some(RecordId::new(42)));
        assert_eq!(Record::new().id(), None);
    }

    #[test]
    fn test_subtables() {
        let row = SubRow::new().with_field("item", FieldType::SingleLineText, text("pen"));
        let record = Record::new()
            .with_field("title", FieldType::SingleLineText, text("order"))
            .with_field("lines", FieldType::Subtable, FieldValue::Subtable(vec![row]));

        let tables: Vec<_> = record.subtables().collect();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].0, "lines");
        assert_eq!(tables[0].1.len(), 1);
    }

    #[test]
    fn test_app_id_parse() {
        assert_eq!("12".parse::<AppId>().unwrap(), AppId::new(12));
        assert!("0".parse::<AppId>().is_err());
        assert!("app".parse::<AppId>().is_err());
    }
}
