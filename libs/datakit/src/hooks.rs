//! Lifecycle listeners.
//!
//! Listeners are registered per object and hook. Several listeners on the
//! same hook run one after another in registration order, each seeing the
//! mutations of the previous ones. The first failing listener aborts the
//! repository call.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use datakit_query::{CompiledQuery, Condition, FilterExpr, Operator, Record, RecordId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{BoxError, EngineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookName {
    BeforeCreate,
    AfterCreate,
    BeforeFind,
    AfterFind,
    AfterFindOne,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
}

impl HookName {
    pub const ALL: [Self; 9] = [
        Self::BeforeCreate,
        Self::AfterCreate,
        Self::BeforeFind,
        Self::AfterFind,
        Self::AfterFindOne,
        Self::BeforeUpdate,
        Self::AfterUpdate,
        Self::BeforeDelete,
        Self::AfterDelete,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeCreate => "beforeCreate",
            Self::AfterCreate => "afterCreate",
            Self::BeforeFind => "beforeFind",
            Self::AfterFind => "afterFind",
            Self::AfterFindOne => "afterFindOne",
            Self::BeforeUpdate => "beforeUpdate",
            Self::AfterUpdate => "afterUpdate",
            Self::BeforeDelete => "beforeDelete",
            Self::AfterDelete => "afterDelete",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-flight data a hook may inspect or mutate.
pub(crate) enum Payload<'a> {
    /// Outgoing document (before create/update) or stored record (after).
    Doc(&'a mut Record),
    Query(&'a mut CompiledQuery),
    Records(&'a mut Vec<Record>),
    Found(&'a mut Option<Record>),
    None,
}

/// What a listener receives.
pub struct HookContext<'a> {
    object: &'a str,
    hook: HookName,
    context: &'a Context,
    id: Option<&'a RecordId>,
    payload: Payload<'a>,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(
        object: &'a str,
        hook: HookName,
        context: &'a Context,
        id: Option<&'a RecordId>,
        payload: Payload<'a>,
    ) -> Self {
        Self {
            object,
            hook,
            context,
            id,
            payload,
        }
    }

    #[must_use]
    pub fn object(&self) -> &str {
        self.object
    }

    #[must_use]
    pub fn hook(&self) -> HookName {
        self.hook
    }

    /// Execution context of the call. Use it to reach other repositories.
    #[must_use]
    pub fn context(&self) -> &Context {
        self.context
    }

    /// Target record id for update and delete hooks.
    #[must_use]
    pub fn id(&self) -> Option<&RecordId> {
        self.id
    }

    /// Document for create and update hooks.
    #[must_use]
    pub fn doc(&self) -> Option<&Record> {
        match &self.payload {
            Payload::Doc(doc) => Some(&**doc),
            Payload::Found(found) => found.as_ref(),
            _ => None,
        }
    }

    pub fn doc_mut(&mut self) -> Option<&mut Record> {
        match &mut self.payload {
            Payload::Doc(doc) => Some(&mut **doc),
            Payload::Found(found) => found.as_mut(),
            _ => None,
        }
    }

    /// Outgoing query for `beforeFind`.
    #[must_use]
    pub fn query(&self) -> Option<&CompiledQuery> {
        match &self.payload {
            Payload::Query(q) => Some(&**q),
            _ => None,
        }
    }

    pub fn query_mut(&mut self) -> Option<&mut CompiledQuery> {
        match &mut self.payload {
            Payload::Query(q) => Some(&mut **q),
            _ => None,
        }
    }

    /// Results for `afterFind`.
    pub fn records_mut(&mut self) -> Option<&mut Vec<Record>> {
        match &mut self.payload {
            Payload::Records(r) => Some(&mut **r),
            _ => None,
        }
    }

    /// Row-level restriction.
    ///
    /// On `beforeFind` the condition is AND-ed onto the outgoing query. On
    /// `beforeCreate` an `=` condition becomes a default value for the field.
    /// System contexts bypass both. Anywhere else the call is ignored.
    pub fn restrict(&mut self, condition: Condition) {
        if self.context.is_system() {
            tracing::debug!(object = self.object, hook = %self.hook, "restriction bypassed for system context");
            return;
        }
        match &mut self.payload {
            Payload::Query(query) => {
                let current = std::mem::take(&mut **query);
                **query = current.restrict(FilterExpr::from(condition));
            }
            Payload::Doc(doc) if self.hook == HookName::BeforeCreate => {
                if *condition.op() == Operator::Eq {
                    doc.entry(condition.field().to_owned())
                        .or_insert_with(|| condition.value().clone());
                } else {
                    tracing::warn!(
                        object = self.object,
                        op = %condition.op(),
                        "only '=' restrictions apply to created documents"
                    );
                }
            }
            _ => {
                tracing::warn!(object = self.object, hook = %self.hook, "restriction ignored on this hook");
            }
        }
    }
}

#[async_trait]
pub trait Listener: Send + Sync {
    /// # Errors
    /// Any error aborts the repository call and is reported as
    /// [`EngineError::Listener`].
    async fn handle(&self, hook: &mut HookContext<'_>) -> Result<(), BoxError>;
}

/// Adapter for synchronous closures.
pub struct FnListener<F>(pub F);

#[async_trait]
impl<F> Listener for FnListener<F>
where
    F: Fn(&mut HookContext<'_>) -> Result<(), BoxError> + Send + Sync,
{
    async fn handle(&self, hook: &mut HookContext<'_>) -> Result<(), BoxError> {
        (self.0)(hook)
    }
}

struct Registered {
    package: Option<String>,
    listener: Arc<dyn Listener>,
}

/// object -> hook -> listeners in registration order
#[derive(Default)]
pub(crate) struct HookRegistry {
    inner: RwLock<HashMap<String, BTreeMap<HookName, Vec<Registered>>>>,
}

impl HookRegistry {
    pub(crate) fn add(
        &self,
        object: &str,
        hook: HookName,
        package: Option<&str>,
        listener: Arc<dyn Listener>,
    ) {
        self.inner
            .write()
            .entry(object.to_owned())
            .or_default()
            .entry(hook)
            .or_default()
            .push(Registered {
                package: package.map(ToOwned::to_owned),
                listener,
            });
    }

    pub(crate) fn listeners(&self, object: &str, hook: HookName) -> Vec<Arc<dyn Listener>> {
        self.inner
            .read()
            .get(object)
            .and_then(|hooks| hooks.get(&hook))
            .map(|list| list.iter().map(|r| Arc::clone(&r.listener)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn remove_package(&self, package: &str) -> usize {
        let mut inner = self.inner.write();
        let mut removed = 0;
        for hooks in inner.values_mut() {
            for list in hooks.values_mut() {
                let before = list.len();
                list.retain(|r| r.package.as_deref() != Some(package));
                removed += before - list.len();
            }
        }
        removed
    }

    pub(crate) fn remove_object(&self, object: &str) {
        self.inner.write().remove(object);
    }

    /// Run every listener of `hook.hook()` for `hook.object()` in order.
    pub(crate) async fn run(&self, hook: &mut HookContext<'_>) -> Result<(), EngineError> {
        if hook.context.ignore_triggers() {
            return Ok(());
        }
        let listeners = self.listeners(hook.object, hook.hook);
        if listeners.is_empty() {
            return Ok(());
        }
        tracing::trace!(object = hook.object, hook = %hook.hook, count = listeners.len(), "running listeners");
        for listener in listeners {
            listener
                .handle(hook)
                .await
                .map_err(|source| EngineError::Listener {
                    object: hook.object.to_owned(),
                    hook: hook.hook,
                    source,
                })?;
        }
        Ok(())
    }
}
