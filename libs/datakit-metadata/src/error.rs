/// Errors raised when metadata is read, not when it is registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("object '{object}' has no field '{field}'")]
    UnknownField { object: String, field: String },

    #[error("field '{object}.{field}' is not a reference field")]
    NotAReference { object: String, field: String },

    /// The field points at an object that is not registered (or declares no target).
    #[error("field '{object}.{field}' references unknown object '{target}'")]
    ReferenceNotFound {
        object: String,
        field: String,
        target: String,
    },
}
