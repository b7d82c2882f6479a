//! Typed source record with a residual bag for everything else.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Source primary key. Most entities use hex object ids, a few use integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Text(String),
    Number(i64),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Text(s) => f.write_str(s),
            RecordId::Number(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Error)]
#[error("record must be a JSON object, found {0}")]
pub struct NotAnObject(&'static str);

/// One extracted entity.
///
/// Fields shared by every source entity are typed. A field whose value does
/// not fit its typed slot stays in `extra` untouched, so serializing a record
/// reproduces everything the source sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Record {
    /// `_id`
    pub id: Option<RecordId>,
    pub uuid: Option<String>,
    /// `_user`
    pub user: Option<String>,
    /// `_client`, the owning tenant
    pub client: Option<String>,
    /// `_app`
    pub app: Option<String>,
    pub name: Option<String>,
    /// `type`
    pub kind: Option<String>,
    pub date: Option<i64>,
    pub created: Option<i64>,
    pub updated: Option<i64>,
    pub created_ms: Option<i64>,
    pub deleted: Option<bool>,
    pub extra: Map<String, Value>,
}

const ID: &str = "_id";
const UUID: &str = "uuid";
const USER: &str = "_user";
const CLIENT: &str = "_client";
const APP: &str = "_app";
const NAME: &str = "name";
const KIND: &str = "type";
const DATE: &str = "date";
const CREATED: &str = "created";
const UPDATED: &str = "updated";
const CREATED_MS: &str = "created_ms";
const DELETED: &str = "deleted";

impl Record {
    /// Any field by its source name, typed or residual. A known field whose
    /// value did not fit its typed slot is found in `extra`.
    pub fn field(&self, name: &str) -> Option<Value> {
        let typed = match name {
            ID => self.id.as_ref().map(|id| match id {
                RecordId::Text(s) => Value::from(s.as_str()),
                RecordId::Number(n) => Value::from(*n),
            }),
            UUID => self.uuid.clone().map(Value::from),
            USER => self.user.clone().map(Value::from),
            CLIENT => self.client.clone().map(Value::from),
            APP => self.app.clone().map(Value::from),
            NAME => self.name.clone().map(Value::from),
            KIND => self.kind.clone().map(Value::from),
            DATE => self.date.map(Value::from),
            CREATED => self.created.map(Value::from),
            UPDATED => self.updated.map(Value::from),
            CREATED_MS => self.created_ms.map(Value::from),
            DELETED => self.deleted.map(Value::from),
            _ => None,
        };
        typed.or_else(|| self.extra.get(name).cloned())
    }

    /// Normalized primary key: strings as-is, integers in decimal.
    pub fn primary_key(&self, field: &str) -> Option<String> {
        key_string(&self.field(field)?)
    }

    /// Wrap a bare scalar payload item (e.g. a category name) into a record
    /// with a synthetic id derived from its position.
    pub fn from_scalar(prefix: &str, index: usize, value: &Value) -> Option<Self> {
        let name = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        let mut extra = Map::new();
        extra.insert("sort_order".to_string(), Value::from(index as u64));
        Some(Self {
            id: Some(RecordId::Text(format!("{}{:05}", prefix, index))),
            name: Some(name),
            extra,
            ..Default::default()
        })
    }
}

/// Key string of a JSON id value. `42` and `"42"` share a key, as they do
/// in the text key column.
pub fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => n
            .as_i64()
            .map(|i| i.to_string())
            .or_else(|| n.as_u64().map(|u| u.to_string())),
        _ => None,
    }
}

/// Integer timestamps may arrive as integers, integral floats or numeric strings.
pub(crate) fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn take<T>(map: &mut Map<String, Value>, key: &str, convert: impl Fn(&Value) -> Option<T>) -> Option<T> {
    let converted = map.get(key).and_then(&convert)?;
    map.remove(key);
    Some(converted)
}

fn as_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn as_id(value: &Value) -> Option<RecordId> {
    match value {
        Value::String(s) => Some(RecordId::Text(s.clone())),
        Value::Number(n) => n.as_i64().map(RecordId::Number),
        _ => None,
    }
}

impl TryFrom<Value> for Record {
    type Error = NotAnObject;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let mut map = match value {
            Value::Object(map) => map,
            Value::Null => return Err(NotAnObject("null")),
            Value::Bool(_) => return Err(NotAnObject("a boolean")),
            Value::Number(_) => return Err(NotAnObject("a number")),
            Value::String(_) => return Err(NotAnObject("a string")),
            Value::Array(_) => return Err(NotAnObject("an array")),
        };

        Ok(Self {
            id: take(&mut map, ID, as_id),
            uuid: take(&mut map, UUID, as_string),
            user: take(&mut map, USER, as_string),
            client: take(&mut map, CLIENT, as_string),
            app: take(&mut map, APP, as_string),
            name: take(&mut map, NAME, as_string),
            kind: take(&mut map, KIND, as_string),
            date: take(&mut map, DATE, lenient_i64),
            created: take(&mut map, CREATED, lenient_i64),
            updated: take(&mut map, UPDATED, lenient_i64),
            created_ms: take(&mut map, CREATED_MS, lenient_i64),
            deleted: take(&mut map, DELETED, Value::as_bool),
            extra: map,
        })
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        let mut map = record.extra.clone();
        for key in [
            ID, UUID, USER, CLIENT, APP, NAME, KIND, DATE, CREATED, UPDATED, CREATED_MS, DELETED,
        ] {
            if let Some(value) = record.field(key) {
                map.insert(key.to_string(), value);
            }
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_fields_are_typed() {
        let record: Record = serde_json::from_value(json!({
            "_id": "5a1", "_client": "t1", "name": "Main store", "type": "store",
            "created": 1700000000, "updated": "1700000100", "created_ms": 1.7e12,
            "deleted": false, "balance": {"cash": 10}
        }))
        .unwrap();

        assert_eq!(record.id, Some(RecordId::Text("5a1".into())));
        assert_eq!(record.client.as_deref(), Some("t1"));
        assert_eq!(record.kind.as_deref(), Some("store"));
        assert_eq!(record.updated, Some(1_700_000_100));
        assert_eq!(record.created_ms, Some(1_700_000_000_000));
        assert_eq!(record.deleted, Some(false));
        assert_eq!(record.extra.get("balance"), Some(&json!({"cash": 10})));
    }

    #[test]
    fn test_mismatched_types_stay_in_extra() {
        let record: Record = serde_json::from_value(json!({
            "_id": 17, "name": {"ru": "x"}, "date": "yesterday", "_user": null
        }))
        .unwrap();

        assert_eq!(record.id, Some(RecordId::Number(17)));
        assert!(record.name.is_none());
        assert_eq!(record.extra.get("name"), Some(&json!({"ru": "x"})));
        assert_eq!(record.extra.get("date"), Some(&json!("yesterday")));
        assert_eq!(record.extra.get("_user"), Some(&Value::Null));
    }

    #[test]
    fn test_serializes_back_with_unknown_fields() {
        let source = json!({"_id": "p1", "sku": "A-1", "stock": {"s1": 3}, "name": "Tea"});
        let record: Record = serde_json::from_value(source.clone()).unwrap();
        assert_eq!(serde_json::to_value(&record).unwrap(), source);
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(serde_json::from_value::<Record>(json!("Drinks")).is_err());
        assert!(serde_json::from_value::<Record>(json!([1])).is_err());
    }

    #[test]
    fn test_primary_key_normalization() {
        let text: Record = serde_json::from_value(json!({"_id": "abc"})).unwrap();
        let number: Record = serde_json::from_value(json!({"id": 42})).unwrap();
        let empty: Record = serde_json::from_value(json!({"_id": ""})).unwrap();

        assert_eq!(text.primary_key("_id").as_deref(), Some("abc"));
        assert_eq!(number.primary_key("id").as_deref(), Some("42"));
        assert_eq!(number.primary_key("_id"), None);
        assert_eq!(empty.primary_key("_id"), None);
    }

    #[test]
    fn test_mistyped_known_fields_stay_reachable() {
        let record: Record = serde_json::from_value(json!({
            "_id": 18446744073709551615u64, "deleted": 1, "name": 42, "created": 1.5
        }))
        .unwrap();

        assert!(record.id.is_none());
        assert!(record.deleted.is_none());
        assert_eq!(record.field("deleted"), Some(json!(1)));
        assert_eq!(record.field("name"), Some(json!(42)));
        assert_eq!(record.field("created"), Some(json!(1.5)));
        assert_eq!(record.primary_key("_id").as_deref(), Some("18446744073709551615"));
    }

    #[test]
    fn test_numeric_and_text_ids_share_a_key() {
        let number: Record = serde_json::from_value(json!({"_id": 42})).unwrap();
        let text: Record = serde_json::from_value(json!({"_id": "42"})).unwrap();
        assert_eq!(number.primary_key("_id"), text.primary_key("_id"));
    }

    #[test]
    fn test_from_scalar() {
        let record = Record::from_scalar("cat_", 7, &json!("Drinks")).unwrap();
        assert_eq!(record.primary_key("_id").as_deref(), Some("cat_00007"));
        assert_eq!(record.name.as_deref(), Some("Drinks"));
        assert_eq!(record.field("sort_order"), Some(json!(7)));
        assert!(Record::from_scalar("cat_", 0, &json!({"a": 1})).is_none());
    }
}
