use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored record: field name to JSON value.
pub type Record = serde_json::Map<String, Value>;

/// Field holding the record identifier.
pub const ID_FIELD: &str = "_id";

/// Record identifier in its canonical string form.
///
/// Numeric identifiers are accepted and compared by their decimal rendering,
/// so a seed record declaring `_id: 7` is found with `RecordId::from(7)` or
/// `RecordId::from("7")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an identifier out of a JSON value. Only strings and integers qualify.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self(n.to_string())),
            _ => None,
        }
    }

    /// Identifier stored under `field` in `record`, if present and usable.
    #[must_use]
    pub fn of(record: &Record, field: &str) -> Option<Self> {
        record.get(field).and_then(Self::from_value)
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }

    /// Every JSON value a record may store this id as: the string, and the
    /// integer when the string is an integer's canonical rendering.
    #[must_use]
    pub fn stored_forms(&self) -> Vec<Value> {
        let mut forms = vec![self.to_value()];
        let number = self
            .0
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| self.0.parse::<u64>().map(Value::from));
        if let Ok(number) = number
            && number.to_string() == self.0
        {
            forms.push(number);
        }
        forms
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&String> for RecordId {
    fn from(s: &String) -> Self {
        Self(s.clone())
    }
}

impl From<&RecordId> for RecordId {
    fn from(id: &RecordId) -> Self {
        id.clone()
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl From<u64> for RecordId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}
