use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::store::StoreError;

/// Free-form document payload
pub type DataMap = Map<String, Value>;

/// Stored document envelope, serialized as `{_id, data, createdAt, updatedAt}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub data: DataMap,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(data: DataMap) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            data,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        lookup(&self.data, field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Deserialize `data` into a typed record
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(self.data.clone()))
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

/// Strict dotted-path lookup (`a.b.0.c`); no array unwrapping
pub fn lookup<'a>(data: &'a DataMap, field: &str) -> Option<&'a Value> {
    let mut parts = field.split('.');
    let mut current = data.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(obj) => obj.get(part)?,
            Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render a scalar for display: strings unquoted, null as empty
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse a path parameter as a document id
pub fn parse_id(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw.trim()).map_err(|_| StoreError::InvalidId(raw.to_string()))
}

/// Serialize a typed record into a document payload
pub fn to_data<T: Serialize>(record: &T) -> Result<DataMap, StoreError> {
    match serde_json::to_value(record).map_err(|e| StoreError::Decode(e.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Decode(format!(
            "expected object payload, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> DataMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn serializes_envelope_field_names() {
        let doc = Document::new(data(json!({"name": "7A"})));
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("_id").is_some());
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_some());
        assert_eq!(value["data"]["name"], "7A");
    }

    #[test]
    fn looks_up_nested_paths() {
        let map = data(json!({"a": {"b": [{"c": 1}, {"c": 2}]}}));
        assert_eq!(lookup(&map, "a.b.1.c"), Some(&json!(2)));
        assert_eq!(lookup(&map, "a.x"), None);
        assert_eq!(lookup(&map, "a.b.c"), None);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(matches!(parse_id("not-an-id"), Err(StoreError::InvalidId(_))));
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }
}
