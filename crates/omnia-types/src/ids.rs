use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

use crate::plan::LegacyFormat;

/// Canonical identifier of a remote item.
///
/// Every comparison and every map key in the engine goes through this type, so
/// `20`, `"20"` and `" 20 "` all name the same item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    /// Reads any id shape [`normalize_value`] accepts.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        normalize_value(&value)
            .ok_or_else(|| de::Error::custom(format!("`{value}` is not a resource id")))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        normalize(value)
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        normalize(&value)
    }
}

impl From<&String> for ResourceId {
    fn from(value: &String) -> Self {
        normalize(value)
    }
}

impl From<&ResourceId> for ResourceId {
    fn from(value: &ResourceId) -> Self {
        value.clone()
    }
}

macro_rules! integer_ids {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ResourceId {
                fn from(value: $ty) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

integer_ids!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

/// Canonicalize a textual id.
pub fn normalize(raw: &str) -> ResourceId {
    ResourceId(raw.trim().to_owned())
}

/// Canonicalize a single JSON id value.
///
/// Accepts strings, numbers, and `{ "id": … }` link objects. Anything else,
/// including blank strings, yields `None`.
pub fn normalize_value(value: &Value) -> Option<ResourceId> {
    match value {
        Value::String(raw) => {
            let id = normalize(raw);
            (!id.is_empty()).then_some(id)
        }
        Value::Number(number) => {
            if let Some(int) = number.as_u64() {
                return Some(int.into());
            }
            if let Some(int) = number.as_i64() {
                return Some(int.into());
            }
            // Whole floats come from loosely typed exports; `20.0` is item 20.
            match number.as_f64() {
                Some(float) if float.is_finite() && float.fract() == 0.0 => {
                    Some(ResourceId(format!("{float:.0}")))
                }
                _ => Some(ResourceId(number.to_string())),
            }
        }
        Value::Object(link) => link.get(crate::item::ID_FIELD).and_then(normalize_value),
        Value::Null | Value::Bool(_) | Value::Array(_) => None,
    }
}

/// Split a legacy comma-separated id string.
///
/// Segments are trimmed; empty segments are skipped.
pub fn split_csv(raw: &str) -> Vec<ResourceId> {
    raw.split(',')
        .map(normalize)
        .filter(|id| !id.is_empty())
        .collect()
}

/// Parse a reference field into its list of ids.
///
/// - `Array`: arrays are read element by element, any other value is one id.
/// - `Csv`: every string, including array elements, is split on commas.
/// - `Auto`: arrays are read element by element; a bare string is split when it
///   contains a comma.
///
/// This is the only place that understands the comma-separated legacy shape.
pub fn parse_id_list(value: &Value, format: LegacyFormat) -> Vec<ResourceId> {
    match (value, format) {
        (Value::Null, _) => Vec::new(),
        (Value::Array(items), LegacyFormat::Csv) => items
            .iter()
            .flat_map(|item| match item {
                Value::String(raw) => split_csv(raw),
                other => normalize_value(other).into_iter().collect(),
            })
            .collect(),
        (Value::Array(items), LegacyFormat::Array | LegacyFormat::Auto) => {
            items.iter().filter_map(normalize_value).collect()
        }
        (Value::String(raw), LegacyFormat::Csv | LegacyFormat::Auto) => split_csv(raw),
        (other, _) => normalize_value(other).into_iter().collect(),
    }
}
