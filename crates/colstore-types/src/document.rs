use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TypeError;
use crate::name::DocumentId;

/// Field data of a document: field name to JSON value.
pub type Fields = Map<String, Value>;

/// Name of the synthetic identifier field injected into every [`Record`].
pub const ID_FIELD: &str = "id";

/// A document as stored by the remote service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: DocumentId, fields: Fields) -> Self {
        Self { id, fields }
    }

    /// Look up a field by name. Dotted names walk into nested maps.
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.fields.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Build the read-model record for this document.
    ///
    /// The document identifier overrides any stored field named `id`.
    pub fn to_record(&self) -> Record {
        let mut map = self.fields.clone();
        map.insert(ID_FIELD.to_string(), Value::String(self.id.to_string()));
        Record(map)
    }

    pub fn into_record(self) -> Record {
        let mut map = self.fields;
        map.insert(ID_FIELD.to_string(), Value::String(self.id.into()));
        Record(map)
    }
}

/// A document's fields merged with its identifier under `id`.
///
/// This is the element type of the observable list. It serializes as a
/// flat JSON object.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Fields);

impl Record {
    /// The identifier of the source document.
    ///
    /// `None` for records that did not come from a document and lack a
    /// string `id`, such as ones deserialized directly or set locally.
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Fields {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl TryFrom<Value> for Record {
    type Error = TypeError;

    /// Accepts a JSON object that carries a string `id` field.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => match map.get(ID_FIELD) {
                Some(Value::String(_)) => Ok(Self(map)),
                _ => Err(TypeError::Serialization(
                    "record requires a string `id` field".into(),
                )),
            },
            other => Err(TypeError::Serialization(format!(
                "record must be a JSON object, got {other}"
            ))),
        }
    }
}

impl PartialEq<Value> for Record {
    fn eq(&self, other: &Value) -> bool {
        other.as_object() == Some(&self.0)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record({})", Value::Object(self.0.clone()))
    }
}
