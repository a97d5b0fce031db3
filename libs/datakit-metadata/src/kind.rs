//! Well-known registry kinds.

pub const OBJECT: &str = "object";
/// Seed records for an object, keyed by object name.
pub const DATA: &str = "data";
pub const APP: &str = "app";
pub const CHART: &str = "chart";
pub const PAGE: &str = "page";
