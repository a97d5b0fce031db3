#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use datakit::metadata::{FieldDefinition, FieldType, ObjectDefinition};
use datakit::query::eval::{execute, filter_records};
use datakit::query::{CompiledQuery, FilterExpr, ID_FIELD, Record, RecordId};
use datakit::{Driver, DriverError, DriverOptions, Engine, Lookup, TransactionHandle};
use parking_lot::Mutex;
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
#[error("rejected by backend: {0}")]
pub struct Rejected(pub String);

/// Test double that keeps rows in memory and records every call.
#[derive(Default)]
pub struct RecordingDriver {
    pub transactional: bool,
    pub fail_rollback: bool,
    /// `create` fails for records with this title.
    pub reject_title: Option<String>,

    pub tables: Mutex<HashMap<String, Vec<Record>>>,
    pub created: Mutex<Vec<Record>>,
    pub lookups: Mutex<Vec<Lookup>>,
    pub queries: Mutex<Vec<CompiledQuery>>,
    pub handles: Mutex<Vec<Option<TransactionHandle>>>,
    pub begins: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub next_id: AtomicUsize,
}

impl RecordingDriver {
    pub fn transactional() -> Self {
        Self {
            transactional: true,
            ..Self::default()
        }
    }

    pub fn rows(&self, object: &str) -> Vec<Record> {
        self.tables.lock().get(object).cloned().unwrap_or_default()
    }

    pub fn insert(&self, object: &str, row: Value) {
        self.tables
            .lock()
            .entry(object.to_owned())
            .or_default()
            .push(row.as_object().cloned().unwrap());
    }

    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    fn seen(&self, options: &DriverOptions) {
        self.handles.lock().push(options.transaction.clone());
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    async fn find(
        &self,
        object: &str,
        query: &CompiledQuery,
        options: &DriverOptions,
    ) -> Result<Vec<Record>, DriverError> {
        self.seen(options);
        self.queries.lock().push(query.clone());
        let rows = self.rows(object);
        execute(&rows, query, ID_FIELD).map_err(DriverError::new)
    }

    async fn find_one(
        &self,
        object: &str,
        lookup: &Lookup,
        options: &DriverOptions,
    ) -> Result<Option<Record>, DriverError> {
        self.seen(options);
        self.lookups.lock().push(lookup.clone());
        let rows = self.rows(object);
        match lookup {
            Lookup::Id(id) => Ok(rows
                .into_iter()
                .find(|r| RecordId::of(r, ID_FIELD).as_ref() == Some(id))),
            Lookup::Query(query) => Ok(execute(&rows, query, ID_FIELD)
                .map_err(DriverError::new)?
                .into_iter()
                .next()),
        }
    }

    async fn create(
        &self,
        object: &str,
        mut data: Record,
        options: &DriverOptions,
    ) -> Result<Record, DriverError> {
        self.seen(options);
        self.created.lock().push(data.clone());
        if let Some(title) = &self.reject_title
            && data.get("title") == Some(&json!(title))
        {
            return Err(DriverError::new(Rejected(title.clone())));
        }
        if !data.contains_key(ID_FIELD) {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            data.insert(ID_FIELD.to_owned(), json!(format!("rec-{n}")));
        }
        self.tables
            .lock()
            .entry(object.to_owned())
            .or_default()
            .push(data.clone());
        Ok(data)
    }

    async fn update(
        &self,
        object: &str,
        id: &RecordId,
        data: Record,
        options: &DriverOptions,
    ) -> Result<Record, DriverError> {
        self.seen(options);
        let mut tables = self.tables.lock();
        let row = tables
            .get_mut(object)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|r| RecordId::of(r, ID_FIELD).as_ref() == Some(id))
            })
            .ok_or_else(|| DriverError::msg(format!("{object} {id} not found")))?;
        row.extend(data);
        Ok(row.clone())
    }

    async fn delete(
        &self,
        object: &str,
        id: &RecordId,
        options: &DriverOptions,
    ) -> Result<(), DriverError> {
        self.seen(options);
        if let Some(rows) = self.tables.lock().get_mut(object) {
            rows.retain(|r| RecordId::of(r, ID_FIELD).as_ref() != Some(id));
        }
        Ok(())
    }

    async fn count(
        &self,
        object: &str,
        filter: Option<&FilterExpr>,
        options: &DriverOptions,
    ) -> Result<u64, DriverError> {
        self.seen(options);
        self.queries
            .lock()
            .push(CompiledQuery::filtered(filter.cloned()));
        let rows = self.rows(object);
        let matched = filter_records(&rows, filter).map_err(DriverError::new)?;
        Ok(matched.len() as u64)
    }

    fn supports_transactions(&self) -> bool {
        self.transactional
    }

    async fn begin_transaction(&self) -> Result<TransactionHandle, DriverError> {
        let n = self.begins.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TransactionHandle::new(n))
    }

    async fn commit_transaction(&self, _handle: &TransactionHandle) -> Result<(), DriverError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback_transaction(&self, _handle: &TransactionHandle) -> Result<(), DriverError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        if self.fail_rollback {
            return Err(DriverError::msg("connection lost during rollback"));
        }
        Ok(())
    }
}

pub fn todo_object() -> ObjectDefinition {
    ObjectDefinition::new("todo")
        .field("title", FieldDefinition::new(FieldType::Text))
        .field("completed", FieldDefinition::new(FieldType::Boolean))
        .field("owner", FieldDefinition::new(FieldType::Text))
}

pub fn engine_with(driver: &Arc<RecordingDriver>) -> Engine {
    Engine::builder()
        .default_datasource(Arc::clone(driver) as Arc<dyn Driver>)
        .object(todo_object())
        .build()
}

pub fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}
