use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use datakit_metadata::{MetadataRegistry, ObjectDefinition, kind};
use datakit_query::{Record, RecordId};
use datakit_security::SecurityContext;
use serde_json::Value;

use crate::actions::{ActionHandler, ActionRegistry, FnAction};
use crate::config::EngineConfig;
use crate::context::Context;
use crate::driver::Driver;
use crate::error::{BoxError, EngineError};
use crate::hooks::{FnListener, HookContext, HookName, HookRegistry, Listener};

pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    pub(crate) registry: Arc<MetadataRegistry>,
    pub(crate) datasources: HashMap<String, Arc<dyn Driver>>,
    pub(crate) hooks: HookRegistry,
    pub(crate) actions: ActionRegistry,
}

impl EngineInner {
    pub(crate) fn datasource(&self, name: &str) -> Result<Arc<dyn Driver>, EngineError> {
        self.datasources
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::datasource_not_found(name))
    }
}

/// Outcome of [`Engine::init`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    /// Records whose id already existed.
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    registry: Option<Arc<MetadataRegistry>>,
    datasources: HashMap<String, Arc<dyn Driver>>,
    objects: Vec<ObjectDefinition>,
}

impl EngineBuilder {
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing registry instead of creating one.
    #[must_use]
    pub fn registry(mut self, registry: Arc<MetadataRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn datasource(mut self, name: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        self.datasources.insert(name.into(), driver);
        self
    }

    /// Register `driver` under the configured default datasource name.
    ///
    /// Call after [`EngineBuilder::config`] when the config renames it.
    #[must_use]
    pub fn default_datasource(self, driver: Arc<dyn Driver>) -> Self {
        let name = self.config.default_datasource.clone();
        self.datasource(name, driver)
    }

    #[must_use]
    pub fn object(mut self, object: ObjectDefinition) -> Self {
        self.objects.push(object);
        self
    }

    #[must_use]
    pub fn build(self) -> Engine {
        let registry = self.registry.unwrap_or_default();
        for object in self.objects {
            registry.register_object(object, None);
        }
        for name in self.datasources.keys() {
            tracing::info!(datasource = %name, "datasource registered");
        }
        if !self.datasources.contains_key(&self.config.default_datasource) {
            tracing::warn!(
                datasource = %self.config.default_datasource,
                "default datasource is not configured"
            );
        }
        Engine {
            inner: Arc::new(EngineInner {
                config: self.config,
                registry,
                datasources: self.datasources,
                hooks: HookRegistry::default(),
                actions: ActionRegistry::default(),
            }),
        }
    }
}

/// Engine instance: metadata, datasources, listeners and actions.
///
/// Cheap to clone; clones share state. Created with [`Engine::builder`] and
/// released with [`Engine::close`].
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn registry(&self) -> &MetadataRegistry {
        &self.inner.registry
    }

    /// Datasource registered under `name`.
    ///
    /// # Errors
    /// [`EngineError::DatasourceNotFound`] if there is none.
    pub fn datasource(&self, name: &str) -> Result<Arc<dyn Driver>, EngineError> {
        self.inner.datasource(name)
    }

    pub fn register_object(&self, object: ObjectDefinition) {
        self.inner.registry.register_object(object, None);
    }

    /// Register objects as one package, removable with [`Engine::unregister_package`].
    pub fn register_package(&self, package: &str, objects: impl IntoIterator<Item = ObjectDefinition>) {
        for object in objects {
            self.inner.registry.register_object(object, Some(package));
        }
    }

    /// Remove an object with its listeners and actions.
    pub fn unregister_object(&self, name: &str) {
        self.inner.registry.unregister(kind::OBJECT, name);
        self.inner.hooks.remove_object(name);
        self.inner.actions.remove_object(name);
    }

    /// Remove every metadata entry, listener and action registered under `package`.
    pub fn unregister_package(&self, package: &str) {
        let entries = self.inner.registry.unregister_package(package);
        let listeners = self.inner.hooks.remove_package(package);
        let actions = self.inner.actions.remove_package(package);
        tracing::info!(package, entries, listeners, actions, "package removed");
    }

    pub fn listen(&self, object: &str, hook: HookName, listener: Arc<dyn Listener>) {
        self.inner.hooks.add(object, hook, None, listener);
    }

    pub fn listen_in_package(
        &self,
        package: &str,
        object: &str,
        hook: HookName,
        listener: Arc<dyn Listener>,
    ) {
        self.inner.hooks.add(object, hook, Some(package), listener);
    }

    /// Register a synchronous closure as a listener.
    pub fn on<F>(&self, object: &str, hook: HookName, f: F)
    where
        F: Fn(&mut HookContext<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.listen(object, hook, Arc::new(FnListener(f)));
    }

    pub fn register_action(&self, object: &str, action: &str, handler: Arc<dyn ActionHandler>) {
        self.inner.actions.add(object, action, None, handler);
    }

    pub fn register_action_in_package(
        &self,
        package: &str,
        object: &str,
        action: &str,
        handler: Arc<dyn ActionHandler>,
    ) {
        self.inner.actions.add(object, action, Some(package), handler);
    }

    /// Bind an async closure as an action handler.
    pub fn on_action<F, Fut>(&self, object: &str, action: &str, f: F)
    where
        F: Fn(Context, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        self.register_action(object, action, Arc::new(FnAction(f)));
    }

    #[must_use]
    pub fn create_context(&self, security: SecurityContext) -> Context {
        Context::new(Arc::clone(&self.inner), security)
    }

    /// Insert seed records for every registered object.
    ///
    /// Seeds come from the definition's inline `data` followed by any
    /// [`datakit_metadata::SeedData`] registered for the object. Records whose
    /// id already exists are skipped. A failing record is logged and the rest
    /// are still attempted.
    pub async fn init(&self) -> SeedReport {
        let ctx = self.create_context(SecurityContext::system());
        let mut objects = self.inner.registry.objects();
        objects.sort_by(|a, b| a.name.cmp(&b.name));

        let mut report = SeedReport::default();
        for object in objects {
            let mut records: Vec<Record> = object.data.clone();
            if let Some(seed) = self.inner.registry.seed_data(&object.name) {
                records.extend(seed.records.iter().cloned());
            }
            if records.is_empty() {
                continue;
            }
            tracing::info!(object = %object.name, records = records.len(), "seeding object");

            let repo = ctx.object(object.name.clone());
            let id_field = match self.inner.datasource(
                object
                    .datasource
                    .as_deref()
                    .unwrap_or(&self.inner.config.default_datasource),
            ) {
                Ok(driver) => driver.id_field().to_owned(),
                Err(e) => {
                    tracing::error!(object = %object.name, error = %e, "cannot seed object");
                    report.failed += records.len();
                    continue;
                }
            };

            for record in records {
                let id = RecordId::of(&record, &id_field);
                if let Some(id) = &id {
                    match repo.find_one(id).await {
                        Ok(Some(_)) => {
                            report.skipped += 1;
                            continue;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!(object = %object.name, id = %id, error = %e, "seed lookup failed");
                            report.failed += 1;
                            continue;
                        }
                    }
                }
                match repo.create(record).await {
                    Ok(_) => {
                        tracing::debug!(object = %object.name, id = ?id, "inserted seed record");
                        report.inserted += 1;
                    }
                    Err(e) => {
                        tracing::error!(object = %object.name, error = %e, "failed to insert seed record");
                        report.failed += 1;
                    }
                }
            }
        }

        tracing::info!(
            inserted = report.inserted,
            skipped = report.skipped,
            failed = report.failed,
            "seeding finished"
        );
        report
    }

    /// Close every datasource. All are attempted; the first error is returned.
    ///
    /// # Errors
    /// The first [`EngineError::Driver`] raised by a driver's `close`.
    pub async fn close(&self) -> Result<(), EngineError> {
        let mut first = None;
        for (name, driver) in &self.inner.datasources {
            if let Err(e) = driver.close().await {
                tracing::error!(datasource = %name, error = %e, "failed to close datasource");
                first.get_or_insert(e);
            }
        }
        tracing::info!("engine closed");
        first.map_or(Ok(()), |e| Err(e.into()))
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .field("datasources", &self.inner.datasources.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
