//! Metadata-driven data access engine.
//!
//! An [`Engine`] owns the metadata registry, the named datasources
//! ([`Driver`] implementations), listeners and action handlers. Callers get a
//! [`Context`] per logical operation and a [`Repository`] per object from it:
//!
//! ```ignore
//! let ctx = engine.create_context(SecurityContext::builder().user_id("u1").build());
//! let todo = ctx.object("todo").create(record).await?;
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod actions;
pub mod config;
pub mod context;
pub mod driver;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod repository;
mod transaction;

pub use actions::{ActionHandler, FnAction};
pub use config::{BookkeepingConfig, EngineConfig};
pub use context::Context;
pub use driver::{Driver, DriverOptions, Lookup, TransactionHandle};
pub use engine::{Engine, EngineBuilder, SeedReport};
pub use error::{BoxError, DriverError, EngineError};
pub use hooks::{FnListener, HookContext, HookName, Listener};
pub use repository::{FindOne, Repository};

pub use datakit_metadata as metadata;
pub use datakit_query as query;
pub use datakit_security::SecurityContext;
