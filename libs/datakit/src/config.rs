use serde::{Deserialize, Serialize};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Datasource used by objects that do not name one, and by transactions.
    pub default_datasource: String,
    pub bookkeeping: BookkeepingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_datasource: "default".to_owned(),
            bookkeeping: BookkeepingConfig::default(),
        }
    }
}

/// Fields filled from the caller's context on write when the record lacks them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BookkeepingConfig {
    pub enabled: bool,
    pub created_by_field: String,
    pub updated_by_field: String,
    pub space_field: String,
}

impl Default for BookkeepingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            created_by_field: "created_by".to_owned(),
            updated_by_field: "updated_by".to_owned(),
            space_field: "space_id".to_owned(),
        }
    }
}
