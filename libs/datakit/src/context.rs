use std::fmt;
use std::sync::Arc;

use datakit_security::SecurityContext;

use crate::driver::TransactionHandle;
use crate::engine::EngineInner;
use crate::repository::Repository;

/// Per-operation execution context.
///
/// Cheap to clone. Never mutated after creation: [`Context::sudo`] and
/// [`Context::transaction`] hand out derived contexts instead.
#[derive(Clone)]
pub struct Context {
    pub(crate) engine: Arc<EngineInner>,
    security: SecurityContext,
    transaction: Option<TransactionHandle>,
}

impl Context {
    pub(crate) fn new(engine: Arc<EngineInner>, security: SecurityContext) -> Self {
        Self {
            engine,
            security,
            transaction: None,
        }
    }

    #[must_use]
    pub fn security(&self) -> &SecurityContext {
        &self.security
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.security.user_id()
    }

    #[must_use]
    pub fn space_id(&self) -> Option<&str> {
        self.security.space_id()
    }

    #[must_use]
    pub fn roles(&self) -> &[String] {
        self.security.roles()
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        self.security.is_system()
    }

    #[must_use]
    pub fn ignore_triggers(&self) -> bool {
        self.security.ignore_triggers()
    }

    /// Active transaction, if this context was handed out by [`Context::transaction`].
    #[must_use]
    pub fn transaction_handle(&self) -> Option<&TransactionHandle> {
        self.transaction.as_ref()
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Repository for `name`. Never fails here; an unknown object is reported
    /// by the first repository call.
    #[must_use]
    pub fn object(&self, name: impl Into<String>) -> Repository {
        Repository::new(name.into(), self.clone())
    }

    /// Same context with restrictions bypassed.
    #[must_use]
    pub fn sudo(&self) -> Self {
        Self {
            security: self.security.elevated(),
            ..self.clone()
        }
    }

    /// Same context with listeners disabled.
    #[must_use]
    pub fn without_triggers(&self) -> Self {
        Self {
            security: self.security.with_ignore_triggers(true),
            ..self.clone()
        }
    }

    pub(crate) fn with_transaction(&self, handle: TransactionHandle) -> Self {
        Self {
            transaction: Some(handle),
            ..self.clone()
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("security", &self.security)
            .field("transaction", &self.transaction)
            .finish_non_exhaustive()
    }
}
