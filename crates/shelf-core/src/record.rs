use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;

use crate::store::StoreError;

/// Name of the identifier field; also the object store's key path.
pub const ID_FIELD: &str = "id";

/// Store-assigned record identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    /// Returns `None` for zero, which no key generator hands out.
    pub fn new(value: u64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Converts a JSON number into an identifier.
    ///
    /// Accepts positive integers, including integral floats such as `2.0` (IndexedDB keys
    /// are JS numbers and may round-trip through `f64`).
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => {
                if let Some(v) = n.as_u64() {
                    return Self::new(v);
                }
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f > 0.0 && f <= MAX_SAFE_INTEGER {
                    Self::new(f as u64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }
}

/// Largest integer a JS number represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored record: an identifier plus arbitrary fields ordered by name.
///
/// Serializes as a flat JSON object (`{"id": 2, "name": "B"}`); the `id` key is omitted
/// while the record is unsaved.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, JsonValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    /// Parses a record destined for insertion.
    ///
    /// Any caller-supplied `id` is discarded whatever its value; the store assigns one.
    pub fn parse_for_insert(json: &str) -> Result<Self, StoreError> {
        let mut object = parse_object(json)?;
        object.remove(ID_FIELD);
        Ok(Self {
            id: None,
            fields: object.into_iter().collect(),
        })
    }

    /// Parses a record destined for an upsert.
    ///
    /// The `id` field is required and must be a positive integer.
    pub fn parse_for_put(json: &str) -> Result<Self, StoreError> {
        let mut object = parse_object(json)?;
        let id = match object.remove(ID_FIELD) {
            None | Some(JsonValue::Null) => {
                return Err(StoreError::Malformed("record has no `id` field".to_string()))
            }
            Some(raw) => RecordId::from_json(&raw).ok_or_else(|| {
                StoreError::Malformed(format!("`id` must be a positive integer, got {raw}"))
            })?,
        };
        Ok(Self {
            id: Some(id),
            fields: object.into_iter().collect(),
        })
    }

    pub fn to_json_string(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Serializes a snapshot of records as a JSON array string.
pub fn records_to_json(records: &[Record]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(records)?)
}

fn parse_object(json: &str) -> Result<Map<String, JsonValue>, StoreError> {
    match serde_json::from_str::<JsonValue>(json)? {
        JsonValue::Object(object) => Ok(object),
        other => Err(StoreError::Malformed(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn insert_parse_strips_any_id() {
        let record = Record::parse_for_insert(r#"{"id":"bogus","name":"A"}"#).unwrap();
        assert_eq!(record, Record::new().with_field("name", "A"));

        let record = Record::parse_for_insert(r#"{"id":7,"price":12.5}"#).unwrap();
        assert_eq!(record.id, None);
        assert_eq!(record.fields.get("price"), Some(&json!(12.5)));
    }

    #[test]
    fn put_parse_requires_positive_integer_id() {
        let record = Record::parse_for_put(r#"{"id":3,"name":"C"}"#).unwrap();
        assert_eq!(record.id, RecordId::new(3));

        let record = Record::parse_for_put(r#"{"id":3.0,"name":"C"}"#).unwrap();
        assert_eq!(record.id, RecordId::new(3));

        for bad in [
            r#"{"name":"C"}"#,
            r#"{"id":null}"#,
            r#"{"id":0}"#,
            r#"{"id":-1}"#,
            r#"{"id":1.5}"#,
            r#"{"id":"3"}"#,
        ] {
            let err = Record::parse_for_put(bad).expect_err(bad);
            assert!(matches!(err, StoreError::Malformed(_)), "{bad}: {err}");
        }
    }

    #[test]
    fn non_objects_are_malformed() {
        let err = Record::parse_for_insert("[1,2]").unwrap_err();
        assert_eq!(err.to_string(), "malformed record: expected a JSON object, got an array");

        let err = Record::parse_for_insert("{not json").unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }

    #[test]
    fn serializes_flat_with_sorted_fields() {
        let record = Record::new()
            .with_field("name", "B")
            .with_field("favorite", false)
            .with_id(RecordId::new(2).unwrap());
        assert_eq!(
            record.to_json_string().unwrap(),
            r#"{"id":2,"favorite":false,"name":"B"}"#
        );

        let unsaved = Record::new().with_field("name", "A");
        assert_eq!(unsaved.to_json_string().unwrap(), r#"{"name":"A"}"#);
    }

    #[test]
    fn stored_records_deserialize_with_id() {
        let records: Vec<Record> = serde_json::from_str(r#"[{"id":2,"name":"B"}]"#).unwrap();
        assert_eq!(
            records,
            vec![Record::new()
                .with_field("name", "B")
                .with_id(RecordId::new(2).unwrap())]
        );
    }
}
