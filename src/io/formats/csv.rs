//! CSV format adapter for import/export.
//!
//! Each record becomes one row per flattened unit. A record without
//! subtable rows writes a single row; a record with a populated subtable
//! writes one row per subtable row, repeating its top-level values. When a
//! record has several populated subtables their rows are zipped: row `j`
//! carries the `j`-th row of every subtable, and shorter subtables leave
//! their cells empty.
//!
//! Reading reverses this: consecutive rows whose top-level cells are all
//! equal fold into one record. Blank subtable cells on the first row of a
//! record read back as one blank sub-row, so a record whose subtable has no
//! rows returns with a single blank row.

use crate::io::columns::{AppSchema, Column, ColumnMapper, UnknownFieldPolicy};
use crate::io::encoding::TextEncoding;
use crate::io::traits::{ExportSink, ImportSource};
use crate::models::{Field, FieldSchema, FieldType, FieldValue, Record, SubRow};
use crate::{Error, Result};
use std::io::{Read, Write};

/// Flattens a record into CSV rows laid out by `columns`.
///
/// Always returns at least one row.
#[must_use]
pub fn flatten_record(columns: &[Column], record: &Record) -> Vec<Vec<String>> {
    let row_count = columns
        .iter()
        .filter_map(|c| c.table.as_deref())
        .filter_map(|table| record.get(table))
        .filter_map(|field| field.value.as_subtable())
        .map(<[SubRow]>::len)
        .max()
        .unwrap_or(0)
        .max(1);

    (0..row_count)
        .map(|j| {
            columns
                .iter()
                .map(|column| cell_for(column, record, j))
                .collect()
        })
        .collect()
}

fn cell_for(column: &Column, record: &Record, row: usize) -> String {
    match &column.table {
        None => record
            .get(&column.code)
            .map(|f| f.value.render())
            .unwrap_or_default(),
        Some(table) => record
            .get(table)
            .and_then(|f| f.value.as_subtable())
            .and_then(|rows| rows.get(row))
            .and_then(|sub| sub.get(&column.code))
            .map(|f| f.value.render())
            .unwrap_or_default(),
    }
}

fn csv_error(operation: &str, e: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

/// CSV export sink.
///
/// Rows are buffered as UTF-8 and transcoded into the configured encoding
/// when the sink is finalized.
pub struct CsvExportSink<W: Write> {
    writer: csv::Writer<Vec<u8>>,
    output: W,
    schema: AppSchema,
    encoding: TextEncoding,
    unknown_fields: UnknownFieldPolicy,
    /// Whether headers have been written.
    headers_written: bool,
}

impl<W: Write> CsvExportSink<W> {
    /// Creates a new CSV export sink.
    #[must_use]
    pub fn new(output: W, schema: AppSchema, encoding: TextEncoding) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false) // We write headers manually
            .from_writer(Vec::new());

        Self {
            writer,
            output,
            schema,
            encoding,
            unknown_fields: UnknownFieldPolicy::default(),
            headers_written: false,
        }
    }

    /// Sets how fields outside the column list are handled.
    #[must_use]
    pub const fn with_unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }

    /// Writes headers if not already written.
    fn ensure_headers(&mut self) -> Result<()> {
        if !self.headers_written && !self.schema.columns().is_empty() {
            self.writer
                .write_record(self.schema.header())
                .map_err(|e| csv_error("write_csv_headers", e))?;
            self.headers_written = true;
        }
        Ok(())
    }

    /// Applies the unknown-field policy to fields the columns do not cover.
    fn check_fields(&self, record: &Record) -> Result<()> {
        let columns = self.schema.columns();
        for field in record.fields() {
            let unknown: Vec<String> = match &field.value {
                FieldValue::Subtable(rows) => {
                    if columns.iter().any(|c| c.table.as_ref() == Some(&field.code)) {
                        rows.iter()
                            .flat_map(SubRow::fields)
                            .filter(|sub| {
                                !columns.iter().any(|c| {
                                    c.table.as_ref() == Some(&field.code) && c.code == sub.code
                                })
                            })
                            .map(|sub| format!("{}.{}", field.code, sub.code))
                            .collect()
                    } else if rows.is_empty() {
                        Vec::new()
                    } else {
                        vec![field.code.clone()]
                    }
                },
                _ => {
                    if columns
                        .iter()
                        .any(|c| c.table.is_none() && c.code == field.code)
                    {
                        Vec::new()
                    } else {
                        vec![field.code.clone()]
                    }
                },
            };

            for code in unknown {
                match self.unknown_fields {
                    UnknownFieldPolicy::Ignore => {
                        tracing::debug!(field = %code, "Dropping field outside the column list");
                    },
                    UnknownFieldPolicy::Error => {
                        return Err(Error::SchemaMismatch(format!(
                            "field '{code}' appeared after the columns were fixed"
                        )));
                    },
                }
            }
        }
        Ok(())
    }
}

impl<W: Write> ExportSink for CsvExportSink<W> {
    fn write(&mut self, record: &Record) -> Result<()> {
        self.ensure_headers()?;
        self.check_fields(record)?;
        if self.schema.columns().is_empty() {
            return Ok(());
        }

        for row in flatten_record(self.schema.columns(), record) {
            self.writer
                .write_record(&row)
                .map_err(|e| csv_error("write_csv", e))?;
        }
        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<()> {
        self.ensure_headers()?;
        let Self {
            writer,
            mut output,
            encoding,
            ..
        } = *self;

        let buffer = writer
            .into_inner()
            .map_err(|e| csv_error("flush_csv", e.error()))?;
        let text = String::from_utf8(buffer).map_err(|e| csv_error("flush_csv", e))?;
        let bytes = encoding.encode(&text)?;

        output
            .write_all(&bytes)
            .and_then(|()| output.flush())
            .map_err(|e| csv_error("write_csv_output", e))?;
        Ok(())
    }
}

/// A data row with its 1-based index.
struct Row {
    index: usize,
    cells: Vec<String>,
}

/// CSV import source.
///
/// The first row is the header. Columns are either inferred from the header
/// labels (typed through an optional [`FieldSchema`]) or supplied by the
/// caller and checked against the header.
pub struct CsvImportSource<R: Read> {
    reader: csv::Reader<R>,
    schema: AppSchema,
    /// Indices of top-level columns; their cells form the grouping key.
    key_columns: Vec<usize>,
    /// Subtable codes with the indices of their columns, in column order.
    tables: Vec<(String, Vec<usize>)>,
    /// Row read ahead while grouping.
    pending: Option<Row>,
    rows_read: usize,
}

impl<R: Read> CsvImportSource<R> {
    /// Creates a source that infers columns from the header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be read or does not match the
    /// schema.
    pub fn new(reader: R, schema: Option<&FieldSchema>) -> Result<Self> {
        let mut reader = Self::reader(reader);
        let headers = reader
            .headers()
            .map_err(|e| csv_error("read_csv_headers", e))?
            .clone();
        let app = ColumnMapper::from_header(headers.iter(), schema)?;
        Ok(Self::from_parts(reader, app))
    }

    /// Creates a source with a caller-supplied column list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if the header labels differ from the
    /// columns.
    pub fn with_columns(reader: R, schema: AppSchema) -> Result<Self> {
        let mut reader = Self::reader(reader);
        let headers = reader
            .headers()
            .map_err(|e| csv_error("read_csv_headers", e))?
            .clone();
        let found = ColumnMapper::from_header(headers.iter(), None)?;
        schema.ensure_compatible(&found)?;
        Ok(Self::from_parts(reader, schema))
    }

    fn reader(reader: R) -> csv::Reader<R> {
        csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // Width is checked per row to report the row index
            .from_reader(reader)
    }

    fn from_parts(reader: csv::Reader<R>, schema: AppSchema) -> Self {
        let mut key_columns = Vec::new();
        let mut tables: Vec<(String, Vec<usize>)> = Vec::new();
        for (i, column) in schema.columns().iter().enumerate() {
            match &column.table {
                None => key_columns.push(i),
                Some(table) => match tables.iter_mut().find(|(t, _)| t == table) {
                    Some((_, indices)) => indices.push(i),
                    None => tables.push((table.clone(), vec![i])),
                },
            }
        }

        Self {
            reader,
            schema,
            key_columns,
            tables,
            pending: None,
            rows_read: 0,
        }
    }

    /// Returns the columns used for parsing.
    #[must_use]
    pub const fn schema(&self) -> &AppSchema {
        &self.schema
    }

    fn read_row(&mut self) -> Result<Option<Row>> {
        let mut record = csv::StringRecord::new();
        let has_record = self
            .reader
            .read_record(&mut record)
            .map_err(|e| csv_error("read_csv", e))?;
        if !has_record {
            return Ok(None);
        }
        self.rows_read += 1;

        let columns = self.schema.columns();
        if record.len() != columns.len() {
            let column = columns
                .get(record.len())
                .map_or_else(|| "(extra)".to_string(), Column::label);
            return Err(Error::FieldFormat {
                row: self.rows_read,
                column,
                message: format!(
                    "expected {} fields, found {}",
                    columns.len(),
                    record.len()
                ),
            });
        }

        Ok(Some(Row {
            index: self.rows_read,
            cells: record.iter().map(String::from).collect(),
        }))
    }

    fn same_key(&self, a: &Row, b: &Row) -> bool {
        self.key_columns.iter().all(|&i| a.cells[i] == b.cells[i])
    }

    fn parse(&self, row: &Row, i: usize) -> Result<Field> {
        let column = &self.schema.columns()[i];
        let value = column
            .field_type
            .parse_cell(&row.cells[i])
            .map_err(|message| Error::FieldFormat {
                row: row.index,
                column: column.label(),
                message,
            })?;
        Ok(Field::new(column.code.clone(), column.field_type, value))
    }

    /// Adds the `j`-th row of each subtable found in `row`.
    ///
    /// A subtable whose cells are all empty is zip padding when another
    /// subtable has data on the same row or its own run already ended.
    /// Otherwise the blank cells are a blank sub-row.
    fn append_sub_rows(&self, row: &Row, j: usize, sub_rows: &mut [Vec<SubRow>]) -> Result<()> {
        let blank: Vec<bool> = self
            .tables
            .iter()
            .map(|(_, indices)| indices.iter().all(|&i| row.cells[i].is_empty()))
            .collect();
        let any_data = blank.iter().any(|b| !b);

        for (((_, indices), rows), &is_blank) in
            self.tables.iter().zip(sub_rows.iter_mut()).zip(&blank)
        {
            if is_blank && (any_data || rows.len() < j) {
                continue;
            }
            let mut sub = SubRow::new();
            for &i in indices {
                sub.set(self.parse(row, i)?);
            }
            rows.push(sub);
        }
        Ok(())
    }
}

impl<R: Read> ImportSource for CsvImportSource<R> {
    fn next(&mut self) -> Result<Option<Record>> {
        let first = match self.pending.take() {
            Some(row) => row,
            None => match self.read_row()? {
                Some(row) => row,
                None => return Ok(None),
            },
        };

        let mut sub_rows: Vec<Vec<SubRow>> = vec![Vec::new(); self.tables.len()];
        self.append_sub_rows(&first, 0, &mut sub_rows)?;

        if !self.tables.is_empty() {
            let mut j = 1;
            while let Some(row) = self.read_row()? {
                if self.same_key(&first, &row) {
                    self.append_sub_rows(&row, j, &mut sub_rows)?;
                    j += 1;
                } else {
                    self.pending = Some(row);
                    break;
                }
            }
        }

        // Fields follow column order; a subtable sits at its first column.
        let mut record = Record::new();
        let mut sub_rows = sub_rows.into_iter().map(Some).collect::<Vec<_>>();
        for (i, column) in self.schema.columns().iter().enumerate() {
            match &column.table {
                None => record.set(self.parse(&first, i)?),
                Some(table) => {
                    let Some(t) = self.tables.iter().position(|(code, _)| code == table) else {
                        continue;
                    };
                    if let Some(rows) = sub_rows[t].take() {
                        record.set(Field::new(
                            table.clone(),
                            FieldType::Subtable,
                            FieldValue::Subtable(rows),
                        ));
                    }
                },
            }
        }

        Ok(Some(record))
    }
}
