use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use datakit_metadata::{MetadataError, ObjectDefinition};
use datakit_query::{CompiledQuery, Condition, Filters, Query, Record, RecordId};
use serde_json::Value;

use crate::context::Context;
use crate::driver::{Driver, DriverOptions, Lookup};
use crate::error::EngineError;
use crate::hooks::{HookContext, HookName, Payload};

/// Target of [`Repository::find_one`].
#[derive(Debug, Clone, PartialEq)]
pub enum FindOne {
    Id(RecordId),
    /// First record the query returns.
    Query(Query),
}

impl From<RecordId> for FindOne {
    fn from(id: RecordId) -> Self {
        Self::Id(id)
    }
}

impl From<&RecordId> for FindOne {
    fn from(id: &RecordId) -> Self {
        Self::Id(id.clone())
    }
}

impl From<&str> for FindOne {
    fn from(id: &str) -> Self {
        Self::Id(RecordId::from(id))
    }
}

impl From<String> for FindOne {
    fn from(id: String) -> Self {
        Self::Id(RecordId::from(id))
    }
}

impl From<Query> for FindOne {
    fn from(query: Query) -> Self {
        Self::Query(query)
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// CRUD and query access to one object, bound to a [`Context`].
///
/// Each call resolves the object definition, runs the before-listeners,
/// calls the object's driver, then runs the after-listeners on the result.
#[derive(Debug, Clone)]
pub struct Repository {
    object: String,
    context: Context,
}

impl Repository {
    pub(crate) fn new(object: String, context: Context) -> Self {
        Self { object, context }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.object
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    fn definition(&self) -> Result<Arc<ObjectDefinition>, EngineError> {
        self.context
            .engine
            .registry
            .object(&self.object)
            .ok_or_else(|| EngineError::object_not_found(&self.object))
    }

    /// Driver for the object's datasource. The transaction handle is passed
    /// only to the default datasource, the one transactions are opened on.
    fn driver(&self, def: &ObjectDefinition) -> Result<(Arc<dyn Driver>, DriverOptions), EngineError> {
        let engine = &self.context.engine;
        let default = &engine.config.default_datasource;
        let name = def.datasource.as_ref().unwrap_or(default);
        let driver = engine.datasource(name)?;
        let options = match self.context.transaction_handle() {
            Some(handle) if name == default => DriverOptions::in_transaction(handle.clone()),
            _ => DriverOptions::default(),
        };
        Ok((driver, options))
    }

    async fn run_hook(
        &self,
        hook: HookName,
        id: Option<&RecordId>,
        payload: Payload<'_>,
    ) -> Result<(), EngineError> {
        let mut hook_ctx = HookContext::new(&self.object, hook, &self.context, id, payload);
        self.context.engine.hooks.run(&mut hook_ctx).await
    }

    /// Fill bookkeeping fields the record does not already carry.
    fn stamp(&self, record: &mut Record, creating: bool) {
        let cfg = &self.context.engine.config.bookkeeping;
        if !cfg.enabled {
            return;
        }
        let mut fill = |field: &str, value: Option<&str>| {
            if let Some(value) = value {
                record
                    .entry(field.to_owned())
                    .or_insert_with(|| Value::String(value.to_owned()));
            }
        };
        if creating {
            fill(&cfg.created_by_field, self.context.user_id());
            fill(&cfg.space_field, self.context.space_id());
        }
        fill(&cfg.updated_by_field, self.context.user_id());
    }

    /// Create one record. Returns it as stored, with listener and
    /// bookkeeping changes applied.
    ///
    /// # Errors
    /// [`EngineError::ObjectNotFound`], [`EngineError::DatasourceNotFound`],
    /// a failing listener, or the driver's error.
    #[tracing::instrument(skip_all, fields(object = %self.object))]
    pub async fn create(&self, mut data: Record) -> Result<Record, EngineError> {
        let def = self.definition()?;
        let (driver, options) = self.driver(&def)?;

        self.run_hook(HookName::BeforeCreate, None, Payload::Doc(&mut data))
            .await?;
        self.stamp(&mut data, true);

        tracing::debug!("driver create");
        let mut record = driver.create(&self.object, data, &options).await?;
        self.stamp(&mut record, true);

        self.run_hook(HookName::AfterCreate, None, Payload::Doc(&mut record))
            .await?;
        Ok(record)
    }

    /// Create several records with a single driver call. Listeners still run
    /// once per record.
    ///
    /// # Errors
    /// Same as [`Repository::create`].
    #[tracing::instrument(skip_all, fields(object = %self.object, count = records.len()))]
    pub async fn create_many(&self, mut records: Vec<Record>) -> Result<Vec<Record>, EngineError> {
        let def = self.definition()?;
        let (driver, options) = self.driver(&def)?;

        for data in &mut records {
            self.run_hook(HookName::BeforeCreate, None, Payload::Doc(data))
                .await?;
            self.stamp(data, true);
        }

        tracing::debug!("driver create_many");
        let mut created = driver.create_many(&self.object, records, &options).await?;

        for record in &mut created {
            self.stamp(record, true);
            self.run_hook(HookName::AfterCreate, None, Payload::Doc(record))
                .await?;
        }
        Ok(created)
    }

    /// # Errors
    /// [`EngineError::ObjectNotFound`] (also for unregistered expand targets),
    /// [`EngineError::DatasourceNotFound`], a failing listener, or the driver's error.
    #[tracing::instrument(skip_all, fields(object = %self.object))]
    pub async fn find(&self, query: &Query) -> Result<Vec<Record>, EngineError> {
        let def = self.definition()?;
        let (driver, options) = self.driver(&def)?;
        let mut compiled = query.compile();

        self.run_hook(HookName::BeforeFind, None, Payload::Query(&mut compiled))
            .await?;

        tracing::debug!("driver find");
        let mut records = driver.find(&self.object, &compiled, &options).await?;
        self.expand(&def, &compiled.expand, &mut records).await?;

        self.run_hook(HookName::AfterFind, None, Payload::Records(&mut records))
            .await?;
        Ok(records)
    }

    fn find_boxed<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Vec<Record>, EngineError>> {
        Box::pin(self.find(query))
    }

    /// Look up one record by id or by query. `None` when nothing matches.
    ///
    /// An id lookup reaches the driver as [`Lookup::Id`] only while the
    /// `beforeFind` listeners leave its query untouched. Any restriction or
    /// other change to the query sends it as [`Lookup::Query`] instead.
    ///
    /// # Errors
    /// Same as [`Repository::find`].
    #[tracing::instrument(skip_all, fields(object = %self.object))]
    pub async fn find_one(&self, target: impl Into<FindOne>) -> Result<Option<Record>, EngineError> {
        let def = self.definition()?;
        let (driver, options) = self.driver(&def)?;

        let (id, mut compiled) = match target.into() {
            FindOne::Id(id) => {
                let by_id = Condition::is_in(driver.id_field(), id.stored_forms());
                (Some(id), CompiledQuery::filtered(Some(by_id.into())))
            }
            FindOne::Query(query) => (None, query.compile()),
        };
        compiled.limit = Some(1);
        let sent = compiled.clone();

        self.run_hook(HookName::BeforeFind, None, Payload::Query(&mut compiled))
            .await?;

        let lookup = match id {
            Some(id) if compiled == sent => Lookup::Id(id),
            _ => Lookup::Query(compiled.clone()),
        };

        tracing::debug!("driver find_one");
        let mut found = driver.find_one(&self.object, &lookup, &options).await?;
        if let Some(record) = found.take() {
            let mut one = vec![record];
            self.expand(&def, &compiled.expand, &mut one).await?;
            found = one.pop();
        }

        self.run_hook(HookName::AfterFindOne, None, Payload::Found(&mut found))
            .await?;
        Ok(found)
    }

    /// # Errors
    /// Same as [`Repository::create`].
    #[tracing::instrument(skip_all, fields(object = %self.object))]
    pub async fn update(&self, id: impl Into<RecordId>, mut data: Record) -> Result<Record, EngineError> {
        let id = id.into();
        let def = self.definition()?;
        let (driver, options) = self.driver(&def)?;

        self.run_hook(HookName::BeforeUpdate, Some(&id), Payload::Doc(&mut data))
            .await?;
        self.stamp(&mut data, false);

        tracing::debug!(id = %id, "driver update");
        let mut record = driver.update(&self.object, &id, data, &options).await?;

        self.run_hook(HookName::AfterUpdate, Some(&id), Payload::Doc(&mut record))
            .await?;
        Ok(record)
    }

    /// # Errors
    /// Same as [`Repository::create`].
    #[tracing::instrument(skip_all, fields(object = %self.object))]
    pub async fn delete(&self, id: impl Into<RecordId>) -> Result<(), EngineError> {
        let id = id.into();
        let def = self.definition()?;
        let (driver, options) = self.driver(&def)?;

        self.run_hook(HookName::BeforeDelete, Some(&id), Payload::None)
            .await?;

        tracing::debug!(id = %id, "driver delete");
        driver.delete(&self.object, &id, &options).await?;

        self.run_hook(HookName::AfterDelete, Some(&id), Payload::None)
            .await?;
        Ok(())
    }

    /// Number of records matching `filters`, after `beforeFind` restrictions.
    ///
    /// # Errors
    /// Same as [`Repository::find`].
    #[tracing::instrument(skip_all, fields(object = %self.object))]
    pub async fn count(&self, filters: &Filters) -> Result<u64, EngineError> {
        let def = self.definition()?;
        let (driver, options) = self.driver(&def)?;
        let mut compiled = CompiledQuery::filtered(filters.compile());

        self.run_hook(HookName::BeforeFind, None, Payload::Query(&mut compiled))
            .await?;

        tracing::debug!("driver count");
        Ok(driver
            .count(&self.object, compiled.filter.as_ref(), &options)
            .await?)
    }

    /// Run a custom action bound with [`crate::Engine::register_action`].
    ///
    /// # Errors
    /// [`EngineError::ActionNotFound`] when no handler is bound, or
    /// [`EngineError::Action`] wrapping the handler's error.
    #[tracing::instrument(skip_all, fields(object = %self.object, action = %action))]
    pub async fn execute_action(&self, action: &str, params: Value) -> Result<Value, EngineError> {
        self.definition()?;
        let handler = self
            .context
            .engine
            .actions
            .get(&self.object, action)
            .ok_or_else(|| EngineError::ActionNotFound {
                object: self.object.clone(),
                action: action.to_owned(),
            })?;

        handler
            .execute(&self.context, params)
            .await
            .map_err(|source| EngineError::Action {
                object: self.object.clone(),
                action: action.to_owned(),
                source,
            })
    }

    /// Replace scalar references in `fields` with the referenced records.
    ///
    /// Referenced records are read through their own repository in the same
    /// context, so its listeners and restrictions apply. Ids with no match
    /// are left as they are.
    async fn expand(
        &self,
        def: &ObjectDefinition,
        fields: &[String],
        records: &mut [Record],
    ) -> Result<(), EngineError> {
        for field in fields {
            let target = self
                .context
                .engine
                .registry
                .resolve_reference(def, field)
                .map_err(|e| match e {
                    MetadataError::ReferenceNotFound { target, .. } => {
                        EngineError::object_not_found(target)
                    }
                    other => EngineError::Metadata(other),
                })?;

            let mut ids: Vec<Value> = Vec::new();
            let mut seen = HashSet::new();
            for record in records.iter() {
                if let Some(id) = record.get(field).and_then(RecordId::from_value)
                    && seen.insert(id.clone())
                {
                    ids.extend(id.stored_forms());
                }
            }
            if ids.is_empty() {
                continue;
            }

            let repo = self.context.object(target.name.clone());
            let (target_driver, _) = repo.driver(&target)?;
            let id_field = target_driver.id_field().to_owned();
            let query = Query::new().filter(Condition::is_in(id_field.clone(), ids));
            let related: HashMap<RecordId, Record> = repo
                .find_boxed(&query)
                .await?
                .into_iter()
                .filter_map(|r| RecordId::of(&r, &id_field).map(|id| (id, r)))
                .collect();

            for record in records.iter_mut() {
                let hit = record
                    .get(field)
                    .and_then(RecordId::from_value)
                    .and_then(|id| related.get(&id));
                if let Some(hit) = hit {
                    record.insert(field.clone(), Value::Object(hit.clone()));
                }
            }
        }
        Ok(())
    }
}
