use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Seed records kept apart from the object definition.
///
/// Registered under [`crate::kind::DATA`] with the object name as id and
/// merged with the definition's inline `data` when the engine seeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedData {
    pub object: String,
    #[serde(default)]
    pub records: Vec<Map<String, Value>>,
}

impl SeedData {
    #[must_use]
    pub fn new(object: impl Into<String>, records: Vec<Map<String, Value>>) -> Self {
        Self {
            object: object.into(),
            records,
        }
    }
}
