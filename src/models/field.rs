//! Field types and typed field values.
//!
//! Every kintone field carries a type tag next to its value. The type decides
//! which [`FieldValue`] variant holds the value, how the value is rendered
//! into a single CSV cell and how a cell is parsed back.

use super::record::SubRow;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the values of a multi-valued field inside one CSV cell.
///
/// Rendering joins with it and parsing splits on it, so values that contain
/// a newline themselves cannot round-trip.
pub const MULTI_VALUE_SEPARATOR: char = '\n';

/// Canonical calendar-date form (`2024-03-31`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Canonical time-of-day form (`09:30`).
pub const TIME_FORMAT: &str = "%H:%M";

/// Canonical UTC timestamp form (`2024-03-31T09:30:00Z`).
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Field kinds known to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    /// Sequential record number.
    RecordNumber,
    /// Internal record id (`$id`).
    #[serde(rename = "__ID__")]
    Id,
    /// Internal revision counter (`$revision`).
    #[serde(rename = "__REVISION__")]
    Revision,
    /// User who created the record.
    Creator,
    /// Creation timestamp.
    CreatedTime,
    /// User who last updated the record.
    Modifier,
    /// Last update timestamp.
    UpdatedTime,
    /// Single-line text.
    SingleLineText,
    /// Multi-line text.
    MultiLineText,
    /// Rich text (HTML).
    RichText,
    /// Decimal number.
    Number,
    /// Calculated value.
    Calc,
    /// Check boxes (multiple choice).
    CheckBox,
    /// Radio buttons (single choice).
    RadioButton,
    /// Drop-down (single choice).
    DropDown,
    /// Multi-choice list.
    MultiSelect,
    /// Attachments.
    File,
    /// Link (URL, phone, mail).
    Link,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    Datetime,
    /// User selection.
    UserSelect,
    /// Department selection.
    OrganizationSelect,
    /// Group selection.
    GroupSelect,
    /// Categories.
    Category,
    /// Process management status.
    Status,
    /// Process management assignees.
    StatusAssignee,
    /// Nested table.
    Subtable,
    /// Layout label (no value).
    Label,
    /// Layout spacer (no value).
    Spacer,
    /// Layout border (no value).
    Hr,
    /// Layout field group (no value).
    Group,
    /// Related records view (no value).
    ReferenceTable,
}

impl FieldType {
    /// Returns all field types.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::RecordNumber,
            Self::Id,
            Self::Revision,
            Self::Creator,
            Self::CreatedTime,
            Self::Modifier,
            Self::UpdatedTime,
            Self::SingleLineText,
            Self::MultiLineText,
            Self::RichText,
            Self::Number,
            Self::Calc,
            Self::CheckBox,
            Self::RadioButton,
            Self::DropDown,
            Self::MultiSelect,
            Self::File,
            Self::Link,
            Self::Date,
            Self::Time,
            Self::Datetime,
            Self::UserSelect,
            Self::OrganizationSelect,
            Self::GroupSelect,
            Self::Category,
            Self::Status,
            Self::StatusAssignee,
            Self::Subtable,
            Self::Label,
            Self::Spacer,
            Self::Hr,
            Self::Group,
            Self::ReferenceTable,
        ]
    }

    /// Returns the wire name of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RecordNumber => "RECORD_NUMBER",
            Self::Id => "__ID__",
            Self::Revision => "__REVISION__",
            Self::Creator => "CREATOR",
            Self::CreatedTime => "CREATED_TIME",
            Self::Modifier => "MODIFIER",
            Self::UpdatedTime => "UPDATED_TIME",
            Self::SingleLineText => "SINGLE_LINE_TEXT",
            Self::MultiLineText => "MULTI_LINE_TEXT",
            Self::RichText => "RICH_TEXT",
            Self::Number => "NUMBER",
            Self::Calc => "CALC",
            Self::CheckBox => "CHECK_BOX",
            Self::RadioButton => "RADIO_BUTTON",
            Self::DropDown => "DROP_DOWN",
            Self::MultiSelect => "MULTI_SELECT",
            Self::File => "FILE",
            Self::Link => "LINK",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Datetime => "DATETIME",
            Self::UserSelect => "USER_SELECT",
            Self::OrganizationSelect => "ORGANIZATION_SELECT",
            Self::GroupSelect => "GROUP_SELECT",
            Self::Category => "CATEGORY",
            Self::Status => "STATUS",
            Self::StatusAssignee => "STATUS_ASSIGNEE",
            Self::Subtable => "SUBTABLE",
            Self::Label => "LABEL",
            Self::Spacer => "SPACER",
            Self::Hr => "HR",
            Self::Group => "GROUP",
            Self::ReferenceTable => "REFERENCE_TABLE",
        }
    }

    /// Returns whether the type only affects form layout and holds no value.
    #[must_use]
    pub const fn is_layout(&self) -> bool {
        matches!(
            self,
            Self::Label | Self::Spacer | Self::Hr | Self::Group | Self::ReferenceTable
        )
    }

    /// Returns whether a value of this type may be sent when adding a record.
    ///
    /// System fields, calculated fields, process management fields and
    /// attachments are maintained by the service.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        !matches!(
            self,
            Self::RecordNumber
                | Self::Id
                | Self::Revision
                | Self::Creator
                | Self::CreatedTime
                | Self::Modifier
                | Self::UpdatedTime
                | Self::Calc
                | Self::Status
                | Self::StatusAssignee
                | Self::Category
                | Self::File
        ) && !self.is_layout()
    }

    /// Returns the value a field of this type has when it is blank.
    #[must_use]
    pub const fn empty_value(&self) -> FieldValue {
        match self {
            Self::Number => FieldValue::Number(None),
            Self::Date => FieldValue::Date(None),
            Self::Time => FieldValue::Time(None),
            Self::CreatedTime | Self::UpdatedTime | Self::Datetime => FieldValue::DateTime(None),
            Self::CheckBox | Self::MultiSelect | Self::Category => {
                FieldValue::Choices(Vec::new())
            },
            Self::UserSelect
            | Self::OrganizationSelect
            | Self::GroupSelect
            | Self::StatusAssignee => FieldValue::Entities(Vec::new()),
            Self::Creator | Self::Modifier => FieldValue::Entity(None),
            Self::File => FieldValue::Files(Vec::new()),
            Self::Subtable => FieldValue::Subtable(Vec::new()),
            _ => FieldValue::Text(String::new()),
        }
    }

    /// Parses the text of one CSV cell as a value of this type.
    ///
    /// Returns a description of the problem on failure; callers attach the
    /// row and column.
    pub fn parse_cell(&self, cell: &str) -> std::result::Result<FieldValue, String> {
        if cell.is_empty() {
            return Ok(self.empty_value());
        }

        let value = match self {
            Self::Number => {
                if !is_decimal(cell) {
                    return Err(format!("expected a decimal number, got '{cell}'"));
                }
                FieldValue::Number(Some(cell.to_string()))
            },
            Self::Date => NaiveDate::parse_from_str(cell, DATE_FORMAT)
                .map(|d| FieldValue::Date(Some(d)))
                .map_err(|_| format!("expected a date (YYYY-MM-DD), got '{cell}'"))?,
            Self::Time => NaiveTime::parse_from_str(cell, TIME_FORMAT)
                .or_else(|_| NaiveTime::parse_from_str(cell, "%H:%M:%S"))
                .map(|t| FieldValue::Time(Some(t)))
                .map_err(|_| format!("expected a time (HH:MM), got '{cell}'"))?,
            Self::CreatedTime | Self::UpdatedTime | Self::Datetime => parse_datetime(cell)
                .map(|dt| FieldValue::DateTime(Some(dt)))
                .ok_or_else(|| format!("expected an RFC 3339 timestamp, got '{cell}'"))?,
            Self::CheckBox | Self::MultiSelect | Self::Category => {
                FieldValue::Choices(split_multi(cell).map(String::from).collect())
            },
            Self::UserSelect
            | Self::OrganizationSelect
            | Self::GroupSelect
            | Self::StatusAssignee => {
                FieldValue::Entities(split_multi(cell).map(Entity::new).collect())
            },
            Self::Creator | Self::Modifier => FieldValue::Entity(Some(Entity::new(cell))),
            Self::File => FieldValue::Files(split_multi(cell).map(FileRef::named).collect()),
            Self::Subtable => {
                return Err("a subtable has no single-cell value".to_string());
            },
            _ => FieldValue::Text(cell.to_string()),
        };
        Ok(value)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidInput(format!("unknown field type: {s}")))
    }
}

/// Parses an RFC 3339 timestamp into UTC.
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Accepts `-?digits(.digits)?`, the only number form the service stores.
fn is_decimal(cell: &str) -> bool {
    let unsigned = cell.strip_prefix('-').unwrap_or(cell);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    digits(whole) && fraction.is_none_or(digits)
}

fn split_multi(cell: &str) -> impl Iterator<Item = &str> {
    cell.split(MULTI_VALUE_SEPARATOR)
}

/// A user, department or group reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Login name or entity code.
    pub code: String,
    /// Display name, present on fetched records only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Entity {
    /// Creates an entity reference from its code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: None,
        }
    }
}

/// An attachment reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    /// Download key issued by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_key: Option<String>,
    /// File name.
    pub name: String,
    /// MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Size in bytes, as the service reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl FileRef {
    /// Creates a reference that only knows the file name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            file_key: None,
            name: name.into(),
            content_type: None,
            size: None,
        }
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Free text, single choices, links, calculated values and system ids.
    Text(String),
    /// Decimal number kept in its textual form; `None` when blank.
    Number(Option<String>),
    /// Calendar date.
    Date(Option<NaiveDate>),
    /// Time of day.
    Time(Option<NaiveTime>),
    /// Timestamp.
    DateTime(Option<DateTime<Utc>>),
    /// Selected options.
    Choices(Vec<String>),
    /// Selected users, departments or groups.
    Entities(Vec<Entity>),
    /// A single user (creator or modifier).
    Entity(Option<Entity>),
    /// Attachments.
    Files(Vec<FileRef>),
    /// Subtable rows.
    Subtable(Vec<SubRow>),
}

impl FieldValue {
    /// Renders the value as the text of one CSV cell.
    ///
    /// Subtables render empty; their rows are flattened into columns.
    #[must_use]
    pub fn render(&self) -> String {
        let sep = MULTI_VALUE_SEPARATOR.to_string();
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.clone().unwrap_or_default(),
            Self::Date(d) => d.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default(),
            Self::Time(t) => t.map(|t| t.format(TIME_FORMAT).to_string()).unwrap_or_default(),
            Self::DateTime(dt) => dt
                .map(|dt| dt.format(DATETIME_FORMAT).to_string())
                .unwrap_or_default(),
            Self::Choices(choices) => choices.join(&sep),
            Self::Entities(entities) => entities
                .iter()
                .map(|e| e.code.as_str())
                .collect::<Vec<_>>()
                .join(&sep),
            Self::Entity(entity) => entity.as_ref().map(|e| e.code.clone()).unwrap_or_default(),
            Self::Files(files) => files
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(&sep),
            Self::Subtable(_) => String::new(),
        }
    }

    /// Returns whether the value is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Number(n) => n.is_none(),
            Self::Date(d) => d.is_none(),
            Self::Time(t) => t.is_none(),
            Self::DateTime(dt) => dt.is_none(),
            Self::Choices(v) => v.is_empty(),
            Self::Entities(v) => v.is_empty(),
            Self::Entity(e) => e.is_none(),
            Self::Files(v) => v.is_empty(),
            Self::Subtable(rows) => rows.is_empty(),
        }
    }

    /// Returns the subtable rows if this is a subtable value.
    #[must_use]
    pub fn as_subtable(&self) -> Option<&[SubRow]> {
        match self {
            Self::Subtable(rows) => Some(rows),
            _ => None,
        }
    }
}
