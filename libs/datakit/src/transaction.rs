//! Transaction coordination.
//!
//! Transactions are flat: a context that already carries a handle runs the
//! callback inline and the outermost call alone commits or rolls back.

use std::future::Future;

use crate::context::Context;
use crate::error::EngineError;

impl Context {
    /// Run `f` inside a transaction on the default datasource.
    ///
    /// Commits when `f` succeeds. When `f` fails the transaction is rolled
    /// back and `f`'s error is returned; a failed rollback is logged and does
    /// not replace it. If the default datasource has no transaction support,
    /// `f` runs without one.
    ///
    /// # Errors
    /// Whatever `f` returns, or the begin/commit failure converted into `E`.
    pub async fn transaction<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<EngineError>,
    {
        if self.in_transaction() {
            tracing::trace!("joining active transaction");
            return f(self.clone()).await;
        }

        let name = &self.engine.config.default_datasource;
        let driver = match self.engine.datasource(name) {
            Ok(driver) if driver.supports_transactions() => driver,
            _ => {
                tracing::debug!(datasource = %name, "datasource is not transactional, running callback directly");
                return f(self.clone()).await;
            }
        };

        let handle = driver
            .begin_transaction()
            .await
            .map_err(EngineError::from)?;
        tracing::debug!(datasource = %name, "transaction started");

        match f(self.with_transaction(handle.clone())).await {
            Ok(value) => {
                driver
                    .commit_transaction(&handle)
                    .await
                    .map_err(EngineError::from)?;
                tracing::debug!(datasource = %name, "transaction committed");
                Ok(value)
            }
            Err(err) => {
                match driver.rollback_transaction(&handle).await {
                    Ok(()) => tracing::debug!(datasource = %name, "transaction rolled back"),
                    Err(rollback) => {
                        tracing::error!(datasource = %name, error = %rollback, "transaction rollback failed");
                    }
                }
                Err(err)
            }
        }
    }
}
