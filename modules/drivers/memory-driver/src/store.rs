//! Table storage and the write journal replayed on commit.

use std::collections::HashMap;

use datakit::query::{Record, RecordId};

use crate::error::MemoryDriverError;

/// Rows per object, in insertion order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    rows: HashMap<String, Vec<Record>>,
}

impl Tables {
    pub(crate) fn rows(&self, object: &str) -> &[Record] {
        self.rows.get(object).map_or(&[][..], Vec::as_slice)
    }

    pub(crate) fn get(&self, object: &str, id_field: &str, id: &RecordId) -> Option<&Record> {
        self.rows(object)
            .iter()
            .find(|r| RecordId::of(r, id_field).as_ref() == Some(id))
    }

    /// `record` must already carry its id.
    pub(crate) fn insert(
        &mut self,
        object: &str,
        id_field: &str,
        record: Record,
    ) -> Result<(), MemoryDriverError> {
        if let Some(id) = RecordId::of(&record, id_field)
            && self.get(object, id_field, &id).is_some()
        {
            return Err(MemoryDriverError::duplicate(object, id));
        }
        self.rows.entry(object.to_owned()).or_default().push(record);
        Ok(())
    }

    /// Merge `patch` into the stored record. The id field is never rewritten.
    pub(crate) fn update(
        &mut self,
        object: &str,
        id_field: &str,
        id: &RecordId,
        mut patch: Record,
    ) -> Result<Record, MemoryDriverError> {
        patch.remove(id_field);
        let row = self
            .rows
            .get_mut(object)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|r| RecordId::of(r, id_field).as_ref() == Some(id))
            })
            .ok_or_else(|| MemoryDriverError::not_found(object, id))?;
        row.extend(patch);
        Ok(row.clone())
    }

    /// Returns whether a record was removed.
    pub(crate) fn delete(&mut self, object: &str, id_field: &str, id: &RecordId) -> bool {
        let Some(rows) = self.rows.get_mut(object) else {
            return false;
        };
        let before = rows.len();
        rows.retain(|r| RecordId::of(r, id_field).as_ref() != Some(id));
        rows.len() != before
    }
}

/// A write performed inside a transaction.
#[derive(Debug, Clone)]
pub(crate) enum Op {
    Insert { object: String, record: Record },
    Update { object: String, id: RecordId, patch: Record },
    Delete { object: String, id: RecordId },
}

impl Op {
    pub(crate) fn apply(self, tables: &mut Tables, id_field: &str) -> Result<(), MemoryDriverError> {
        match self {
            Op::Insert { object, record } => tables.insert(&object, id_field, record),
            Op::Update { object, id, patch } => tables.update(&object, id_field, &id, patch).map(drop),
            Op::Delete { object, id } => {
                tables.delete(&object, id_field, &id);
                Ok(())
            }
        }
    }
}

/// Open transaction: a private copy of the tables taken at begin, plus the
/// writes made since, replayed onto the live tables on commit.
#[derive(Debug)]
pub(crate) struct Transaction {
    pub(crate) snapshot: Tables,
    pub(crate) journal: Vec<Op>,
}

impl Transaction {
    pub(crate) fn begin(tables: &Tables) -> Self {
        Self {
            snapshot: tables.clone(),
            journal: Vec::new(),
        }
    }

    /// Apply `op` to the snapshot and record it.
    pub(crate) fn write(&mut self, op: Op, id_field: &str) -> Result<(), MemoryDriverError> {
        op.clone().apply(&mut self.snapshot, id_field)?;
        self.journal.push(op);
        Ok(())
    }

    /// Replay the journal onto `tables`. Nothing changes if any write fails.
    pub(crate) fn commit(self, tables: &mut Tables, id_field: &str) -> Result<usize, MemoryDriverError> {
        let writes = self.journal.len();
        let mut next = tables.clone();
        for op in self.journal {
            op.apply(&mut next, id_field)?;
        }
        *tables = next;
        Ok(writes)
    }
}
