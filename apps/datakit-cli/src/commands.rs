use std::sync::Arc;

use anyhow::Context as _;
use datakit::metadata::{MetadataEntry, SeedData, kind};
use datakit::query::{Filters, Query, Record, SortSpec};
use datakit::{Driver, Engine, SecurityContext};
use datakit_memory_driver::MemoryDriver;

use crate::config::AppConfig;

/// Engine over a single memory datasource with the configured objects and
/// seed data registered.
#[must_use]
pub fn build_engine(config: &AppConfig) -> Engine {
    let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new(config.memory_driver.clone()));
    let mut builder = Engine::builder()
        .config(config.engine.clone())
        .default_datasource(driver);
    for object in &config.objects {
        builder = builder.object(object.clone());
    }
    let engine = builder.build();

    for (object, records) in &config.data {
        engine.registry().register(MetadataEntry::new(
            kind::DATA,
            object.clone(),
            SeedData::new(object.clone(), records.clone()),
        ));
    }
    engine
}

#[must_use]
pub fn security_context(user: Option<&str>, space: Option<&str>) -> SecurityContext {
    match user {
        Some(user) => {
            let mut builder = SecurityContext::builder().user_id(user);
            if let Some(space) = space {
                builder = builder.space_id(space);
            }
            builder.build()
        }
        None => SecurityContext::system(),
    }
}

#[must_use]
pub fn objects(engine: &Engine) -> Vec<serde_json::Value> {
    let mut objects = engine.registry().objects();
    objects.sort_by(|a, b| a.name.cmp(&b.name));
    objects
        .iter()
        .map(|o| {
            serde_json::json!({
                "name": o.name,
                "label": o.label,
                "datasource": o.datasource.as_deref().unwrap_or(&engine.config().default_datasource),
                "fields": o.fields.keys().collect::<Vec<_>>(),
                "actions": o.actions.keys().collect::<Vec<_>>(),
            })
        })
        .collect()
}

/// Arguments of the `query` and `count` subcommands.
#[derive(Debug, Default)]
pub struct QueryArgs {
    pub filters: Option<String>,
    pub sort: Vec<String>,
    pub fields: Vec<String>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub expand: Vec<String>,
}

impl QueryArgs {
    /// # Errors
    /// Fails when `filters` is not a JSON filter list.
    pub fn filters(&self) -> anyhow::Result<Filters> {
        self.filters.as_deref().map_or_else(
            || Ok(Filters::new()),
            |raw| serde_json::from_str(raw).context("filters must be a JSON filter list"),
        )
    }

    /// `-field` sorts descending.
    ///
    /// # Errors
    /// See [`QueryArgs::filters`].
    pub fn query(&self) -> anyhow::Result<Query> {
        let mut query = Query::new().with_filters(self.filters()?);
        for key in &self.sort {
            query = query.sort(match key.strip_prefix('-') {
                Some(field) => SortSpec::desc(field),
                None => SortSpec::asc(key.as_str()),
            });
        }
        if !self.fields.is_empty() {
            query = query.fields(self.fields.iter().cloned());
        }
        if let Some(skip) = self.skip {
            query = query.skip(skip);
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        for field in &self.expand {
            query = query.expand(field.as_str());
        }
        Ok(query)
    }
}

/// # Errors
/// Engine errors from the query, or invalid arguments.
pub async fn query(
    engine: &Engine,
    security: SecurityContext,
    object: &str,
    args: &QueryArgs,
) -> anyhow::Result<Vec<Record>> {
    let query = args.query()?;
    let records = engine
        .create_context(security)
        .object(object)
        .find(&query)
        .await?;
    Ok(records)
}

/// # Errors
/// Engine errors from the count, or invalid arguments.
pub async fn count(
    engine: &Engine,
    security: SecurityContext,
    object: &str,
    args: &QueryArgs,
) -> anyhow::Result<u64> {
    let filters = args.filters()?;
    Ok(engine
        .create_context(security)
        .object(object)
        .count(&filters)
        .await?)
}
