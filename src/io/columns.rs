//! Flat column layout for CSV files.
//!
//! A [`Column`] is one `(table, code)` cell position. Top-level fields map to
//! one column each; a subtable expands in place into one column per inner
//! field. The column list is built once per run and fixes the CSV layout for
//! both directions.

use crate::models::{FieldSchema, FieldSpec, FieldType};
use crate::{Error, Result};

/// Separator between table code and field code in sub-field header labels.
pub const TABLE_SEPARATOR: char = '.';

/// One CSV column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Field code.
    pub code: String,
    /// Field type.
    pub field_type: FieldType,
    /// Subtable code for sub-field columns.
    pub table: Option<String>,
}

impl Column {
    /// Creates a top-level column.
    #[must_use]
    pub fn top_level(code: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            code: code.into(),
            field_type,
            table: None,
        }
    }

    /// Creates a column for a field inside a subtable.
    #[must_use]
    pub fn sub_field(
        table: impl Into<String>,
        code: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        Self {
            code: code.into(),
            field_type,
            table: Some(table.into()),
        }
    }

    /// Returns whether the column belongs to a subtable.
    #[must_use]
    pub const fn is_sub_field(&self) -> bool {
        self.table.is_some()
    }

    /// Returns the header label: `code`, or `table.code` for sub-fields.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.table {
            Some(table) => format!("{table}{TABLE_SEPARATOR}{}", self.code),
            None => self.code.clone(),
        }
    }

    /// Splits a header label into its optional table and field code.
    #[must_use]
    pub fn split_label(label: &str) -> (Option<&str>, &str) {
        match label.split_once(TABLE_SEPARATOR) {
            Some((table, code)) => (Some(table), code),
            None => (None, label),
        }
    }
}

/// What to do with fields that are missing from the fixed column list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFieldPolicy {
    /// Drop the field and keep going.
    #[default]
    Ignore,
    /// Fail with [`Error::SchemaMismatch`].
    Error,
}

/// Where a column list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaSource {
    /// Explicit field list supplied by the caller.
    Explicit,
    /// Discovered from the first page of records.
    Discovered,
    /// Read from a CSV header.
    Header,
}

/// The columns used for one run, with the field list they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSchema {
    columns: Vec<Column>,
    fields: Vec<String>,
    source: SchemaSource,
}

impl AppSchema {
    /// Returns the columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the top-level field codes the columns were derived from.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Returns where the columns came from.
    #[must_use]
    pub const fn source(&self) -> SchemaSource {
        self.source
    }

    /// Returns the header labels in column order.
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        self.columns.iter().map(Column::label).collect()
    }

    /// Returns whether any column belongs to a subtable.
    #[must_use]
    pub fn has_subtables(&self) -> bool {
        self.columns.iter().any(Column::is_sub_field)
    }

    /// Checks that `other` has the same `(table, code)` columns in the same
    /// order.
    pub fn ensure_compatible(&self, other: &Self) -> Result<()> {
        let ours: Vec<_> = self.columns.iter().map(|c| (&c.table, &c.code)).collect();
        let theirs: Vec<_> = other.columns.iter().map(|c| (&c.table, &c.code)).collect();
        if ours == theirs {
            Ok(())
        } else {
            Err(Error::SchemaMismatch(format!(
                "columns differ: expected [{}], found [{}]",
                self.header().join(", "),
                other.header().join(", ")
            )))
        }
    }
}

/// Builds column lists.
pub struct ColumnMapper;

impl ColumnMapper {
    /// Builds columns from a schema.
    ///
    /// With `fields`, columns follow that order and only those fields are
    /// included. Without it, every schema field is included in schema order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if a requested field is not in a
    /// non-empty schema. When the schema is empty (nothing was fetched), the
    /// requested fields become plain text columns.
    pub fn from_schema(schema: &FieldSchema, fields: Option<&[String]>) -> Result<AppSchema> {
        let Some(fields) = fields else {
            let mut columns = Vec::new();
            for spec in schema.fields() {
                push_columns(&mut columns, spec);
            }
            return Ok(AppSchema {
                columns,
                fields: schema.fields().iter().map(|f| f.code.clone()).collect(),
                source: SchemaSource::Discovered,
            });
        };

        let mut columns = Vec::new();
        for code in fields {
            match schema.get(code) {
                Some(spec) => push_columns(&mut columns, &spec),
                None if schema.is_empty() => {
                    columns.push(Column::top_level(code.clone(), FieldType::SingleLineText));
                },
                None => {
                    return Err(Error::SchemaMismatch(format!(
                        "requested field '{code}' is not in the app"
                    )));
                },
            }
        }
        Ok(AppSchema {
            columns,
            fields: fields.to_vec(),
            source: SchemaSource::Explicit,
        })
    }

    /// Builds columns from CSV header labels.
    ///
    /// With a schema, each column takes its type from the schema. Without
    /// one, every column is typed as single-line text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] for duplicate labels, labels naming
    /// fields or subtables the schema does not have, and labels naming a
    /// subtable itself instead of one of its fields.
    pub fn from_header<'a, I>(labels: I, schema: Option<&FieldSchema>) -> Result<AppSchema>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut columns: Vec<Column> = Vec::new();
        let mut fields: Vec<String> = Vec::new();

        for label in labels {
            let (table, code) = Column::split_label(label);
            let column = match schema {
                Some(schema) => Self::resolve_label(schema, table, code)?,
                None => match table {
                    Some(table) => Column::sub_field(table, code, FieldType::SingleLineText),
                    None => Column::top_level(code, FieldType::SingleLineText),
                },
            };

            if columns
                .iter()
                .any(|c| c.table == column.table && c.code == column.code)
            {
                return Err(Error::SchemaMismatch(format!(
                    "duplicate column '{label}'"
                )));
            }

            let owner = column.table.clone().unwrap_or_else(|| column.code.clone());
            if !fields.contains(&owner) {
                fields.push(owner);
            }
            columns.push(column);
        }

        Ok(AppSchema {
            columns,
            fields,
            source: SchemaSource::Header,
        })
    }

    fn resolve_label(schema: &FieldSchema, table: Option<&str>, code: &str) -> Result<Column> {
        match table {
            None => {
                let spec = schema.get(code).ok_or_else(|| {
                    Error::SchemaMismatch(format!("column '{code}' is not a field of the app"))
                })?;
                if spec.field_type == FieldType::Subtable {
                    return Err(Error::SchemaMismatch(format!(
                        "column '{code}' names a subtable; use '{code}{TABLE_SEPARATOR}<field>' columns"
                    )));
                }
                Ok(Column::top_level(code, spec.field_type))
            },
            Some(table) => {
                let spec = schema
                    .get(table)
                    .filter(|s| s.field_type == FieldType::Subtable)
                    .ok_or_else(|| {
                        Error::SchemaMismatch(format!("'{table}' is not a subtable of the app"))
                    })?;
                let sub = spec.sub_field(code).ok_or_else(|| {
                    Error::SchemaMismatch(format!(
                        "column '{table}{TABLE_SEPARATOR}{code}' is not a field of subtable '{table}'"
                    ))
                })?;
                Ok(Column::sub_field(table, code, sub.field_type))
            },
        }
    }
}

fn push_columns(columns: &mut Vec<Column>, spec: &FieldSpec) {
    if spec.field_type == FieldType::Subtable {
        for sub in &spec.sub_fields {
            columns.push(Column::sub_field(&spec.code, &sub.code, sub.field_type));
        }
    } else {
        columns.push(Column::top_level(&spec.code, spec.field_type));
    }
}
