//! The storage contract.
//!
//! A driver receives filters already parsed into a [`FilterExpr`] tree and
//! must reproduce its semantics; [`datakit_query::eval`] is the reference.
//! When a call happens inside a transaction, [`DriverOptions::transaction`]
//! carries the handle the driver returned from
//! [`Driver::begin_transaction`], and every operation must go through it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use datakit_query::{CompiledQuery, FilterExpr, ID_FIELD, Record, RecordId};

use crate::error::DriverError;

/// Opaque, driver-specific transaction token.
#[derive(Clone)]
pub struct TransactionHandle(Arc<dyn Any + Send + Sync>);

impl TransactionHandle {
    pub fn new<T: Any + Send + Sync>(token: T) -> Self {
        Self(Arc::new(token))
    }

    /// The driver's own token type, if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Whether both handles refer to the same transaction.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle").finish_non_exhaustive()
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    pub transaction: Option<TransactionHandle>,
}

impl DriverOptions {
    #[must_use]
    pub fn in_transaction(handle: TransactionHandle) -> Self {
        Self {
            transaction: Some(handle),
        }
    }
}

/// What `find_one` looks up.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Id(RecordId),
    /// First record of the query. `limit` is already 1.
    Query(CompiledQuery),
}

#[async_trait]
pub trait Driver: Send + Sync {
    /// Field holding record identifiers.
    fn id_field(&self) -> &str {
        ID_FIELD
    }

    async fn find(
        &self,
        object: &str,
        query: &CompiledQuery,
        options: &DriverOptions,
    ) -> Result<Vec<Record>, DriverError>;

    async fn find_one(
        &self,
        object: &str,
        lookup: &Lookup,
        options: &DriverOptions,
    ) -> Result<Option<Record>, DriverError>;

    /// Persist `data` and return the stored record, including generated ids.
    async fn create(
        &self,
        object: &str,
        data: Record,
        options: &DriverOptions,
    ) -> Result<Record, DriverError>;

    async fn update(
        &self,
        object: &str,
        id: &RecordId,
        data: Record,
        options: &DriverOptions,
    ) -> Result<Record, DriverError>;

    async fn delete(
        &self,
        object: &str,
        id: &RecordId,
        options: &DriverOptions,
    ) -> Result<(), DriverError>;

    async fn count(
        &self,
        object: &str,
        filter: Option<&FilterExpr>,
        options: &DriverOptions,
    ) -> Result<u64, DriverError>;

    async fn create_many(
        &self,
        object: &str,
        records: Vec<Record>,
        options: &DriverOptions,
    ) -> Result<Vec<Record>, DriverError> {
        let mut created = Vec::with_capacity(records.len());
        for record in records {
            created.push(self.create(object, record, options).await?);
        }
        Ok(created)
    }

    /// Apply `data` to every record matching `filter`. Returns how many were updated.
    async fn update_many(
        &self,
        object: &str,
        filter: Option<&FilterExpr>,
        data: Record,
        options: &DriverOptions,
    ) -> Result<u64, DriverError> {
        let mut updated = 0;
        for id in self.matching_ids(object, filter, options).await? {
            self.update(object, &id, data.clone(), options).await?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Delete every record matching `filter`. Returns how many were deleted.
    async fn delete_many(
        &self,
        object: &str,
        filter: Option<&FilterExpr>,
        options: &DriverOptions,
    ) -> Result<u64, DriverError> {
        let mut deleted = 0;
        for id in self.matching_ids(object, filter, options).await? {
            self.delete(object, &id, options).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// Ids of the records matching `filter`, used by the default bulk operations.
    async fn matching_ids(
        &self,
        object: &str,
        filter: Option<&FilterExpr>,
        options: &DriverOptions,
    ) -> Result<Vec<RecordId>, DriverError> {
        let id_field = self.id_field().to_owned();
        let query = CompiledQuery {
            fields: Some(vec![id_field.clone()]),
            ..CompiledQuery::filtered(filter.cloned())
        };
        let rows = self.find(object, &query, options).await?;
        Ok(rows
            .iter()
            .filter_map(|r| RecordId::of(r, &id_field))
            .collect())
    }

    /// Whether the transaction trio is implemented. Without it every context
    /// stays outside a transaction and multi-call atomicity is not available.
    fn supports_transactions(&self) -> bool {
        false
    }

    async fn begin_transaction(&self) -> Result<TransactionHandle, DriverError> {
        Err(DriverError::unsupported("begin_transaction"))
    }

    async fn commit_transaction(&self, _handle: &TransactionHandle) -> Result<(), DriverError> {
        Err(DriverError::unsupported("commit_transaction"))
    }

    async fn rollback_transaction(&self, _handle: &TransactionHandle) -> Result<(), DriverError> {
        Err(DriverError::unsupported("rollback_transaction"))
    }

    /// Release backend resources. Called by [`crate::Engine::close`].
    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}
