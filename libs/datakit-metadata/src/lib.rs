//! Metadata for datakit: object definitions and the registry that holds them.
//!
//! The registry is a typed store keyed by `(kind, id)`. Entries may be
//! registered under a package name so a whole package can be removed at once.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod error;
pub mod kind;
pub mod object;
pub mod registry;
pub mod seed;

pub use error::MetadataError;
pub use object::{ActionDefinition, FieldDefinition, FieldOption, FieldType, ObjectDefinition};
pub use registry::{MetadataEntry, MetadataRegistry};
pub use seed::SeedData;
