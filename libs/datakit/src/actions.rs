//! Custom object actions.
//!
//! Actions are declared in [`datakit_metadata::ActionDefinition`] and bound to
//! handlers on the engine. A handler runs with the caller's [`Context`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::context::Context;
use crate::error::BoxError;

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(&self, context: &Context, params: Value) -> Result<Value, BoxError>;
}

/// Adapter for async closures taking an owned context.
pub struct FnAction<F>(pub F);

#[async_trait]
impl<F, Fut> ActionHandler for FnAction<F>
where
    F: Fn(Context, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, BoxError>> + Send,
{
    async fn execute(&self, context: &Context, params: Value) -> Result<Value, BoxError> {
        (self.0)(context.clone(), params).await
    }
}

struct Registered {
    package: Option<String>,
    handler: Arc<dyn ActionHandler>,
}

/// (object, action) -> handler
#[derive(Default)]
pub(crate) struct ActionRegistry {
    inner: RwLock<HashMap<(String, String), Registered>>,
}

impl ActionRegistry {
    pub(crate) fn add(
        &self,
        object: &str,
        action: &str,
        package: Option<&str>,
        handler: Arc<dyn ActionHandler>,
    ) {
        self.inner.write().insert(
            (object.to_owned(), action.to_owned()),
            Registered {
                package: package.map(ToOwned::to_owned),
                handler,
            },
        );
    }

    pub(crate) fn get(&self, object: &str, action: &str) -> Option<Arc<dyn ActionHandler>> {
        self.inner
            .read()
            .get(&(object.to_owned(), action.to_owned()))
            .map(|r| Arc::clone(&r.handler))
    }

    pub(crate) fn remove_package(&self, package: &str) -> usize {
        let mut inner = self.inner.write();
        let before = inner.len();
        inner.retain(|_, r| r.package.as_deref() != Some(package));
        before - inner.len()
    }

    pub(crate) fn remove_object(&self, object: &str) {
        self.inner.write().retain(|(o, _), _| o != object);
    }
}
