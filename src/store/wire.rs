//! kintone REST wire format.
//!
//! A record travels as an object keyed by field code, each entry carrying
//! the field type and value: `{"title": {"type": "SINGLE_LINE_TEXT", "value":
//! "x"}}`. Subtable values are arrays of `{"id": "...", "value": {...}}` rows.
//!
//! Date, time and number values use the same text forms as CSV cells, so both
//! directions reuse [`FieldType::parse_cell`] and [`FieldValue::render`].

use crate::models::{
    AppId, Entity, Field, FieldSchema, FieldSpec, FieldType, FieldValue, FileRef, Record,
    RecordId, SubRow,
};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

/// Converts a record into its wire object.
#[must_use]
pub fn record_to_json(record: &Record) -> Value {
    Value::Object(fields_to_json(record.fields(), false))
}

/// Builds the body of an add-records request.
///
/// Fields the service maintains itself are left out, as are subtable row
/// ids.
#[must_use]
pub fn insert_payload(app: AppId, records: &[Record]) -> Value {
    let records: Vec<Value> = records
        .iter()
        .map(|r| Value::Object(fields_to_json(r.fields(), true)))
        .collect();
    json!({ "app": app.get(), "records": records })
}

/// Builds the body of a delete-records request.
#[must_use]
pub fn delete_payload(app: AppId, ids: &[RecordId]) -> Value {
    let ids: Vec<u64> = ids.iter().map(|id| id.get()).collect();
    json!({ "app": app.get(), "ids": ids })
}

/// Parses the `records` array of a get-records response.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the body is not a records response.
pub fn records_from_response(body: &Value) -> Result<Vec<Record>> {
    body.get("records")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::InvalidInput("response has no 'records' array".to_string()))?
        .iter()
        .map(record_from_json)
        .collect()
}

/// Parses the `ids` array of an add-records response.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if an id is missing or not numeric.
pub fn ids_from_response(body: &Value) -> Result<Vec<RecordId>> {
    body.get("ids")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::InvalidInput("response has no 'ids' array".to_string()))?
        .iter()
        .map(|id| match id {
            Value::String(s) => s.parse(),
            Value::Number(n) => n.to_string().parse(),
            other => Err(Error::InvalidInput(format!("invalid record id: {other}"))),
        })
        .collect()
}

/// Parses one wire record.
///
/// Fields with types this crate does not know are skipped with a warning.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for values that do not fit their type.
pub fn record_from_json(value: &Value) -> Result<Record> {
    let object = value
        .as_object()
        .ok_or_else(|| Error::InvalidInput(format!("record is not an object: {value}")))?;

    let mut record = Record::new();
    for field in fields_from_json(object)? {
        record.set(field);
    }
    Ok(record)
}

/// Parses a form-fields response into a schema.
///
/// Fields with types this crate does not know are skipped.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the body has no `properties` object.
pub fn schema_from_form_fields(body: &Value) -> Result<FieldSchema> {
    let properties = body
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::InvalidInput("response has no 'properties' object".to_string()))?;
    Ok(FieldSchema::new(specs_from_properties(properties)))
}

fn specs_from_properties(properties: &Map<String, Value>) -> Vec<FieldSpec> {
    let mut specs = Vec::new();
    for (key, property) in properties {
        let code = property.get("code").and_then(Value::as_str).unwrap_or(key);
        let type_name = property.get("type").and_then(Value::as_str).unwrap_or_default();
        let Ok(field_type) = type_name.parse::<FieldType>() else {
            tracing::warn!(field = code, r#type = type_name, "Skipping field of unknown type");
            continue;
        };

        let mut spec = FieldSpec::new(code, field_type);
        if let Some(inner) = property.get("fields").and_then(Value::as_object) {
            spec.sub_fields = specs_from_properties(inner);
        }
        specs.push(spec);
    }
    specs
}

fn fields_to_json(fields: &[Field], writable_only: bool) -> Map<String, Value> {
    fields
        .iter()
        .filter(|f| !writable_only || f.field_type.is_writable())
        .map(|f| {
            let entry = json!({
                "type": f.field_type.as_str(),
                "value": value_to_json(&f.value, writable_only),
            });
            (f.code.clone(), entry)
        })
        .collect()
}

fn value_to_json(value: &FieldValue, writable_only: bool) -> Value {
    match value {
        FieldValue::Text(_)
        | FieldValue::Number(_)
        | FieldValue::Date(_)
        | FieldValue::Time(_)
        | FieldValue::DateTime(_) => Value::String(value.render()),
        FieldValue::Choices(choices) => choices.iter().cloned().map(Value::String).collect(),
        FieldValue::Entities(entities) => entities.iter().map(entity_to_json).collect(),
        FieldValue::Entity(entity) => entity.as_ref().map_or(Value::Null, entity_to_json),
        FieldValue::Files(files) => files.iter().map(file_to_json).collect(),
        FieldValue::Subtable(rows) => rows
            .iter()
            .map(|row| {
                let mut object = Map::new();
                if let (Some(id), false) = (&row.id, writable_only) {
                    object.insert("id".to_string(), Value::String(id.clone()));
                }
                object.insert(
                    "value".to_string(),
                    Value::Object(fields_to_json(row.fields(), writable_only)),
                );
                Value::Object(object)
            })
            .collect(),
    }
}

fn entity_to_json(entity: &Entity) -> Value {
    let mut object = Map::new();
    object.insert("code".to_string(), Value::String(entity.code.clone()));
    if let Some(name) = &entity.name {
        object.insert("name".to_string(), Value::String(name.clone()));
    }
    Value::Object(object)
}

fn file_to_json(file: &FileRef) -> Value {
    let mut object = Map::new();
    if let Some(key) = &file.file_key {
        object.insert("fileKey".to_string(), Value::String(key.clone()));
    }
    object.insert("name".to_string(), Value::String(file.name.clone()));
    if let Some(content_type) = &file.content_type {
        object.insert("contentType".to_string(), Value::String(content_type.clone()));
    }
    if let Some(size) = &file.size {
        object.insert("size".to_string(), Value::String(size.clone()));
    }
    Value::Object(object)
}

fn fields_from_json(object: &Map<String, Value>) -> Result<Vec<Field>> {
    let mut fields = Vec::with_capacity(object.len());
    for (code, entry) in object {
        let type_name = entry.get("type").and_then(Value::as_str).ok_or_else(|| {
            Error::InvalidInput(format!("field '{code}' has no type"))
        })?;
        let Ok(field_type) = type_name.parse::<FieldType>() else {
            tracing::warn!(field = %code, r#type = type_name, "Skipping record field of unknown type");
            continue;
        };
        let raw = entry.get("value").unwrap_or(&Value::Null);
        let value = value_from_json(field_type, raw)
            .map_err(|message| Error::InvalidInput(format!("field '{code}': {message}")))?;
        fields.push(Field::new(code.clone(), field_type, value));
    }
    Ok(fields)
}

fn value_from_json(field_type: FieldType, value: &Value) -> std::result::Result<FieldValue, String> {
    if value.is_null() {
        return Ok(field_type.empty_value());
    }

    match field_type {
        FieldType::CheckBox | FieldType::MultiSelect | FieldType::Category => {
            typed(value).map(FieldValue::Choices)
        },
        FieldType::UserSelect
        | FieldType::OrganizationSelect
        | FieldType::GroupSelect
        | FieldType::StatusAssignee => typed(value).map(FieldValue::Entities),
        FieldType::Creator | FieldType::Modifier => typed(value).map(FieldValue::Entity),
        FieldType::File => typed(value).map(FieldValue::Files),
        FieldType::Subtable => value
            .as_array()
            .ok_or_else(|| format!("expected an array of rows, got {value}"))?
            .iter()
            .map(sub_row_from_json)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(FieldValue::Subtable),
        FieldType::Number
        | FieldType::Date
        | FieldType::Time
        | FieldType::Datetime
        | FieldType::CreatedTime
        | FieldType::UpdatedTime => field_type.parse_cell(&scalar_text(value)?),
        _ => scalar_text(value).map(FieldValue::Text),
    }
}

fn sub_row_from_json(row: &Value) -> std::result::Result<SubRow, String> {
    let inner = row
        .get("value")
        .and_then(Value::as_object)
        .ok_or_else(|| format!("subtable row has no 'value' object: {row}"))?;

    let mut sub = SubRow::new();
    sub.id = match row.get("id") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    };
    for field in fields_from_json(inner).map_err(|e| e.to_string())? {
        sub.set(field);
    }
    Ok(sub)
}

fn scalar_text(value: &Value) -> std::result::Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("expected a scalar, got {other}")),
    }
}

fn typed<T: DeserializeOwned>(value: &Value) -> std::result::Result<T, String> {
    T::deserialize(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> Value {
        json!({
            "$id": {"type": "__ID__", "value": "7"},
            "$revision": {"type": "__REVISION__", "value": "3"},
            "title": {"type": "SINGLE_LINE_TEXT", "value": "Order"},
            "amount": {"type": "NUMBER", "value": "12.5"},
            "due": {"type": "DATE", "value": "2024-05-01"},
            "tags": {"type": "CHECK_BOX", "value": ["a", "b"]},
            "owner": {"type": "USER_SELECT", "value": [{"code": "alice", "name": "Alice"}]},
            "creator": {"type": "CREATOR", "value": {"code": "bob", "name": "Bob"}},
            "total": {"type": "CALC", "value": "25"},
            "lines": {"type": "SUBTABLE", "value": [
                {"id": "101", "value": {
                    "item": {"type": "SINGLE_LINE_TEXT", "value": "pen"},
                    "qty": {"type": "NUMBER", "value": ""}
                }}
            ]}
        })
    }

    #[test]
    fn test_record_from_json() {
        let record = record_from_json(&sample()).unwrap();
        let codes: Vec<_> = record.fields().iter().map(|f| f.code.as_str()).collect();
        assert_eq!(
            codes,
            vec!["$id", "$revision", "title", "amount", "due", "tags", "owner", "creator", "total", "lines"]
        );
        assert_eq!(record.id(), Some(RecordId::new(7)));
        assert_eq!(
            record.get("due").unwrap().value,
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 5, 1))
        );
        assert_eq!(record.get("owner").unwrap().value.render(), "alice");

        let rows = record.get("lines").unwrap().value.as_subtable().unwrap();
        assert_eq!(rows[0].id.as_deref(), Some("101"));
        assert_eq!(rows[0].get("qty").unwrap().value, FieldValue::Number(None));
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = record_from_json(&sample()).unwrap();
        let back = record_from_json(&record_to_json(&record)).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_insert_payload_strips_service_fields() {
        let record = record_from_json(&sample()).unwrap();
        let payload = insert_payload(AppId::new(9), &[record]);

        assert_eq!(payload["app"], 9);
        let sent = payload["records"][0].as_object().unwrap();
        for code in ["$id", "$revision", "creator", "total"] {
            assert!(!sent.contains_key(code), "{code} should be stripped");
        }
        assert_eq!(sent["title"]["value"], "Order");
        assert!(sent["lines"]["value"][0].get("id").is_none());
        assert_eq!(sent["lines"]["value"][0]["value"]["item"]["value"], "pen");
    }

    #[test]
    fn test_ids_and_delete_payload() {
        let ids = ids_from_response(&json!({"ids": ["1", "2"], "revisions": ["1", "1"]})).unwrap();
        assert_eq!(ids, vec![RecordId::new(1), RecordId::new(2)]);
        assert_eq!(
            delete_payload(AppId::new(4), &ids),
            json!({"app": 4, "ids": [1, 2]})
        );
    }

    #[test]
    fn test_schema_from_form_fields() {
        let body = json!({
            "properties": {
                "title": {"type": "SINGLE_LINE_TEXT", "code": "title", "label": "Title"},
                "spacer": {"type": "SPACER", "code": "spacer"},
                "lines": {"type": "SUBTABLE", "code": "lines", "fields": {
                    "item": {"type": "SINGLE_LINE_TEXT", "code": "item"},
                    "qty": {"type": "NUMBER", "code": "qty"}
                }},
                "odd": {"type": "SOMETHING_NEW", "code": "odd"}
            },
            "revision": "5"
        });
        let schema = schema_from_form_fields(&body).unwrap();
        let codes: Vec<_> = schema.fields().iter().map(|f| f.code.as_str()).collect();
        assert_eq!(codes, vec!["title", "lines"]);
        assert_eq!(schema.get("lines").unwrap().sub_fields.len(), 2);
    }

    #[test]
    fn test_unknown_record_field_types_are_skipped() {
        let body = json!({"records": [{
            "title": {"type": "SINGLE_LINE_TEXT", "value": "Order"},
            "odd": {"type": "SOMETHING_NEW", "value": {"nested": true}},
            "lines": {"type": "SUBTABLE", "value": [
                {"id": "1", "value": {
                    "item": {"type": "SINGLE_LINE_TEXT", "value": "pen"},
                    "odd": {"type": "SOMETHING_NEW", "value": [1, 2]}
                }}
            ]}
        }]});

        let records = records_from_response(&body).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].get("odd").is_none());
        assert_eq!(records[0].get("title").unwrap().value.render(), "Order");
        let rows = records[0].get("lines").unwrap().value.as_subtable().unwrap();
        assert_eq!(rows[0].fields().len(), 1);

        let exported = record_to_json(&records[0]);
        assert_eq!(exported["title"]["value"], "Order");
        assert!(exported.get("odd").is_none());
    }

    #[test]
    fn test_bad_values_are_rejected() {
        let bad_date = json!({"due": {"type": "DATE", "value": "05/01/2024"}});
        assert!(matches!(record_from_json(&bad_date), Err(Error::InvalidInput(_))));

        let untyped = json!({"x": {"value": ""}});
        assert!(record_from_json(&untyped).is_err());

        assert!(records_from_response(&json!({"totalCount": null})).is_err());
    }
}
