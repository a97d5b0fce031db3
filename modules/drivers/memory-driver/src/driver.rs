use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use datakit::query::eval::{execute, filter_records};
use datakit::query::{CompiledQuery, FilterExpr, Record, RecordId};
use datakit::{Driver, DriverError, DriverOptions, Lookup, TransactionHandle};
use parking_lot::RwLock;
use serde_json::Value;

use crate::config::MemoryDriverConfig;
use crate::error::MemoryDriverError;
use crate::store::{Op, Tables, Transaction};

/// Token stored in the [`TransactionHandle`]s this driver hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TxId(u64);

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    transactions: HashMap<TxId, Transaction>,
}

/// Driver keeping every object in process memory.
///
/// Reads inside a transaction see the snapshot taken at begin plus the
/// transaction's own writes; commit replays those writes onto the live
/// tables atomically.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    config: MemoryDriverConfig,
    state: RwLock<State>,
    next_tx: AtomicU64,
}

impl MemoryDriver {
    #[must_use]
    pub fn new(config: MemoryDriverConfig) -> Self {
        Self {
            config,
            state: RwLock::default(),
            next_tx: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn config(&self) -> &MemoryDriverConfig {
        &self.config
    }

    /// Committed rows of `object`, bypassing any open transaction.
    #[must_use]
    pub fn records(&self, object: &str) -> Vec<Record> {
        self.state.read().tables.rows(object).to_vec()
    }

    fn tx_id(options: &DriverOptions) -> Result<Option<TxId>, MemoryDriverError> {
        options
            .transaction
            .as_ref()
            .map(|h| h.downcast_ref::<TxId>().copied().ok_or(MemoryDriverError::UnknownTransaction))
            .transpose()
    }

    /// Run `f` against the tables visible to `options`.
    fn read<T>(
        &self,
        options: &DriverOptions,
        f: impl FnOnce(&Tables) -> Result<T, MemoryDriverError>,
    ) -> Result<T, MemoryDriverError> {
        let tx = Self::tx_id(options)?;
        let state = self.state.read();
        match tx {
            Some(tx) => {
                let open = state
                    .transactions
                    .get(&tx)
                    .ok_or(MemoryDriverError::UnknownTransaction)?;
                f(&open.snapshot)
            }
            None => f(&state.tables),
        }
    }

    /// Apply `op` to the live tables, or to the transaction in `options`.
    fn write(&self, options: &DriverOptions, op: Op) -> Result<(), MemoryDriverError> {
        let id_field = &self.config.id_field;
        let tx = Self::tx_id(options)?;
        let mut state = self.state.write();
        match tx {
            Some(tx) => state
                .transactions
                .get_mut(&tx)
                .ok_or(MemoryDriverError::UnknownTransaction)?
                .write(op, id_field),
            None => op.apply(&mut state.tables, id_field),
        }
    }

    fn finish(&self, handle: &TransactionHandle) -> Result<(TxId, Transaction), MemoryDriverError> {
        let tx = handle
            .downcast_ref::<TxId>()
            .copied()
            .ok_or(MemoryDriverError::UnknownTransaction)?;
        let open = self
            .state
            .write()
            .transactions
            .remove(&tx)
            .ok_or(MemoryDriverError::UnknownTransaction)?;
        Ok((tx, open))
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn id_field(&self) -> &str {
        &self.config.id_field
    }

    async fn find(
        &self,
        object: &str,
        query: &CompiledQuery,
        options: &DriverOptions,
    ) -> Result<Vec<Record>, DriverError> {
        let id_field = &self.config.id_field;
        let rows = self.read(options, |tables| {
            Ok(execute(tables.rows(object), query, id_field)?)
        })?;
        tracing::trace!(object, rows = rows.len(), "memory find");
        Ok(rows)
    }

    async fn find_one(
        &self,
        object: &str,
        lookup: &Lookup,
        options: &DriverOptions,
    ) -> Result<Option<Record>, DriverError> {
        let id_field = &self.config.id_field;
        Ok(self.read(options, |tables| match lookup {
            Lookup::Id(id) => Ok(tables.get(object, id_field, id).cloned()),
            Lookup::Query(query) => Ok(execute(tables.rows(object), query, id_field)?
                .into_iter()
                .next()),
        })?)
    }

    async fn create(
        &self,
        object: &str,
        mut data: Record,
        options: &DriverOptions,
    ) -> Result<Record, DriverError> {
        let id_field = &self.config.id_field;
        if RecordId::of(&data, id_field).is_none() {
            data.insert(
                id_field.clone(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
        }
        self.write(
            options,
            Op::Insert {
                object: object.to_owned(),
                record: data.clone(),
            },
        )?;
        tracing::trace!(object, "memory create");
        Ok(data)
    }

    async fn update(
        &self,
        object: &str,
        id: &RecordId,
        data: Record,
        options: &DriverOptions,
    ) -> Result<Record, DriverError> {
        self.write(
            options,
            Op::Update {
                object: object.to_owned(),
                id: id.clone(),
                patch: data,
            },
        )?;
        let id_field = &self.config.id_field;
        Ok(self.read(options, |tables| {
            tables
                .get(object, id_field, id)
                .cloned()
                .ok_or_else(|| MemoryDriverError::not_found(object, id))
        })?)
    }

    async fn delete(
        &self,
        object: &str,
        id: &RecordId,
        options: &DriverOptions,
    ) -> Result<(), DriverError> {
        self.write(
            options,
            Op::Delete {
                object: object.to_owned(),
                id: id.clone(),
            },
        )?;
        Ok(())
    }

    async fn count(
        &self,
        object: &str,
        filter: Option<&FilterExpr>,
        options: &DriverOptions,
    ) -> Result<u64, DriverError> {
        let matched = self.read(options, |tables| {
            Ok(filter_records(tables.rows(object), filter)?.len())
        })?;
        Ok(u64::try_from(matched).unwrap_or(u64::MAX))
    }

    fn supports_transactions(&self) -> bool {
        self.config.transactions
    }

    async fn begin_transaction(&self) -> Result<TransactionHandle, DriverError> {
        if !self.config.transactions {
            return Err(MemoryDriverError::TransactionsDisabled.into());
        }
        let tx = TxId(self.next_tx.fetch_add(1, Ordering::Relaxed) + 1);
        let mut state = self.state.write();
        let open = Transaction::begin(&state.tables);
        state.transactions.insert(tx, open);
        tracing::debug!(tx = tx.0, "memory transaction started");
        Ok(TransactionHandle::new(tx))
    }

    async fn commit_transaction(&self, handle: &TransactionHandle) -> Result<(), DriverError> {
        let (tx, open) = self.finish(handle)?;
        let id_field = &self.config.id_field;
        let writes = open.commit(&mut self.state.write().tables, id_field)?;
        tracing::debug!(tx = tx.0, writes, "memory transaction committed");
        Ok(())
    }

    async fn rollback_transaction(&self, handle: &TransactionHandle) -> Result<(), DriverError> {
        let (tx, open) = self.finish(handle)?;
        tracing::debug!(tx = tx.0, discarded = open.journal.len(), "memory transaction rolled back");
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut state = self.state.write();
        let open = state.transactions.len();
        state.transactions.clear();
        if open > 0 {
            tracing::warn!(open, "closing memory driver with open transactions");
        }
        Ok(())
    }
}
