use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{ResourceId, normalize_value};

/// Field carrying an item's identifier.
pub const ID_FIELD: &str = "id";
/// Field added to every hydrated item, naming its owning collection.
pub const TYPE_FIELD: &str = "type";

/// A flat record exactly as the remote collection endpoint returned it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawItem(Map<String, Value>);

impl RawItem {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Normalized id, if the record carries a usable one.
    pub fn id(&self) -> Option<ResourceId> {
        self.0.get(ID_FIELD).and_then(normalize_value)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for RawItem {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl TryFrom<Value> for RawItem {
    type Error = Value;

    /// Only JSON objects are records; anything else is handed back untouched.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(other),
        }
    }
}

/// A record whose reference fields have been replaced by the records they name.
///
/// Built once by [`HydratedItem::assemble`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HydratedItem(Map<String, Value>);

impl HydratedItem {
    /// Copy every raw field, overwrite the resolved targets, then stamp `type`.
    pub fn assemble<I>(raw: &RawItem, resolved: I, item_type: &str) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut fields = raw.fields().clone();
        fields.extend(resolved);
        fields.insert(TYPE_FIELD.to_owned(), Value::String(item_type.to_owned()));
        Self(fields)
    }

    pub fn id(&self) -> Option<ResourceId> {
        self.0.get(ID_FIELD).and_then(normalize_value)
    }

    pub fn item_type(&self) -> Option<&str> {
        self.0.get(TYPE_FIELD).and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}
