use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use datakit::EngineConfig;
use datakit::metadata::ObjectDefinition;
use datakit::query::Record;
use datakit_memory_driver::MemoryDriverConfig;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;

/// Prefix of environment variables overriding the file, e.g.
/// `DATAKIT_LOGGING__LEVEL=debug`.
pub const ENV_PREFIX: &str = "DATAKIT_";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub memory_driver: MemoryDriverConfig,
    pub logging: LoggingConfig,
    pub objects: Vec<ObjectDefinition>,
    /// Seed records per object name.
    pub data: BTreeMap<String, Vec<Record>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// Layered sources: defaults, then the YAML file if it exists, then
    /// `DATAKIT_` environment variables.
    #[must_use]
    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// # Errors
    /// Fails when a source cannot be parsed or holds unknown keys.
    pub fn from_figment(figment: &Figment) -> anyhow::Result<Self> {
        figment.extract().context("invalid configuration")
    }

    /// # Errors
    /// See [`AppConfig::from_figment`].
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Self::from_figment(&Self::figment(path))
            .with_context(|| format!("loading {}", path.display()))
    }
}
