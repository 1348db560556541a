//! Field schemas.
//!
//! A [`FieldSchema`] lists an app's fields in order, with the inner fields of
//! each subtable. It either comes from the service's form definition or is
//! discovered from a page of fetched records.

use super::field::{FieldType, FieldValue};
use super::record::{ID_FIELD, REVISION_FIELD, Record};

/// One field of a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field code.
    pub code: String,
    /// Field type.
    pub field_type: FieldType,
    /// Inner fields, for subtables.
    pub sub_fields: Vec<FieldSpec>,
}

impl FieldSpec {
    /// Creates a field spec without inner fields.
    #[must_use]
    pub fn new(code: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            code: code.into(),
            field_type,
            sub_fields: Vec::new(),
        }
    }

    /// Adds an inner field.
    #[must_use]
    pub fn with_sub_field(mut self, code: impl Into<String>, field_type: FieldType) -> Self {
        self.sub_fields.push(Self::new(code, field_type));
        self
    }

    /// Looks up an inner field by code.
    #[must_use]
    pub fn sub_field(&self, code: &str) -> Option<&Self> {
        self.sub_fields.iter().find(|f| f.code == code)
    }
}

/// Ordered fields of an app.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
}

impl FieldSchema {
    /// Creates a schema from field specs, dropping layout-only fields.
    #[must_use]
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .filter(|f| !f.field_type.is_layout())
                .collect(),
        }
    }

    /// Derives a schema from fetched records.
    ///
    /// Fields are taken in first-seen order across the records. Inner
    /// subtable fields are the union of all rows' fields, also in first-seen
    /// order, so a subtable that is empty in the first record still gets its
    /// columns from later records of the same page.
    #[must_use]
    pub fn discover(records: &[Record]) -> Self {
        let mut fields: Vec<FieldSpec> = Vec::new();

        for record in records {
            for field in record.fields() {
                let idx = if let Some(idx) = fields.iter().position(|f| f.code == field.code) {
                    idx
                } else {
                    fields.push(FieldSpec::new(field.code.clone(), field.field_type));
                    fields.len() - 1
                };

                let FieldValue::Subtable(rows) = &field.value else {
                    continue;
                };
                let spec = &mut fields[idx];
                for sub in rows.iter().flat_map(|row| row.fields()) {
                    if spec.sub_field(&sub.code).is_none() {
                        spec.sub_fields
                            .push(FieldSpec::new(sub.code.clone(), sub.field_type));
                    }
                }
            }
        }

        Self::new(fields)
    }

    /// Returns the fields in order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Looks up a top-level field by code.
    ///
    /// `$id` and `$revision` resolve even when the schema does not list them;
    /// the form definition omits them.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<FieldSpec> {
        self.fields
            .iter()
            .find(|f| f.code == code)
            .cloned()
            .or_else(|| match code {
                ID_FIELD => Some(FieldSpec::new(ID_FIELD, FieldType::Id)),
                REVISION_FIELD => Some(FieldSpec::new(REVISION_FIELD, FieldType::Revision)),
                _ => None,
            })
    }

    /// Returns whether the schema has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
