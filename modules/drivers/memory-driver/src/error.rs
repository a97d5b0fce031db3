use datakit::DriverError;
use datakit::query::{EvalError, RecordId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryDriverError {
    #[error("{object} record '{id}' not found")]
    RecordNotFound { object: String, id: RecordId },

    #[error("{object} record '{id}' already exists")]
    DuplicateId { object: String, id: RecordId },

    #[error("transaction handle does not belong to this driver or is already finished")]
    UnknownTransaction,

    #[error("transactions are disabled for this driver")]
    TransactionsDisabled,

    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl MemoryDriverError {
    #[must_use]
    pub fn not_found(object: &str, id: &RecordId) -> Self {
        Self::RecordNotFound {
            object: object.to_owned(),
            id: id.clone(),
        }
    }

    #[must_use]
    pub fn duplicate(object: &str, id: RecordId) -> Self {
        Self::DuplicateId {
            object: object.to_owned(),
            id,
        }
    }
}

impl From<MemoryDriverError> for DriverError {
    fn from(e: MemoryDriverError) -> Self {
        DriverError::new(e)
    }
}
