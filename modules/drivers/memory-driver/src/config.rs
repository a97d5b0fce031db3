use serde::{Deserialize, Serialize};

/// Configuration for [`crate::MemoryDriver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryDriverConfig {
    /// Field holding the primary key.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// When `false` the driver reports no transaction support and the engine
    /// runs transaction callbacks directly.
    #[serde(default = "default_transactions")]
    pub transactions: bool,
}

impl Default for MemoryDriverConfig {
    fn default() -> Self {
        Self {
            id_field: default_id_field(),
            transactions: default_transactions(),
        }
    }
}

fn default_id_field() -> String {
    datakit::query::ID_FIELD.to_owned()
}

fn default_transactions() -> bool {
    true
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_keys_take_defaults() {
        let cfg: MemoryDriverConfig = serde_json::from_value(json!({"transactions": false})).unwrap();

        assert_eq!(cfg.id_field, "_id");
        assert!(!cfg.transactions);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let res = serde_json::from_value::<MemoryDriverConfig>(json!({"idField": "id"}));

        assert!(res.is_err());
    }
}
