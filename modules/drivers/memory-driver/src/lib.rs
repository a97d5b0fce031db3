//! In-memory datakit driver.
//!
//! Keeps every object as an ordered list of JSON records and evaluates
//! queries with `datakit::query::eval`. Transactions are snapshot based and
//! can be switched off through [`MemoryDriverConfig::transactions`].
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
mod driver;
pub mod error;
mod store;

pub use config::MemoryDriverConfig;
pub use driver::MemoryDriver;
pub use error::MemoryDriverError;
