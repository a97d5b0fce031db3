use std::error::Error as StdError;
use std::fmt;

use datakit_metadata::MetadataError;

use crate::hooks::HookName;

/// Error type listeners and action handlers return.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Whatever a driver raised. The engine never inspects or rewraps it.
pub struct DriverError(BoxError);

impl DriverError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Box::new(error))
    }

    pub fn msg(message: impl Into<String>) -> Self {
        Self(BoxError::from(message.into()))
    }

    /// Returned by the default bodies of optional driver operations.
    #[must_use]
    pub fn unsupported(operation: &str) -> Self {
        Self::msg(format!("operation '{operation}' is not supported by this driver"))
    }

    #[must_use]
    pub fn downcast_ref<T: StdError + 'static>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    #[must_use]
    pub fn into_inner(self) -> BoxError {
        self.0
    }
}

impl From<BoxError> for DriverError {
    fn from(error: BoxError) -> Self {
        Self(error)
    }
}

impl fmt::Debug for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for DriverError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("object '{name}' is not registered")]
    ObjectNotFound { name: String },

    #[error("datasource '{name}' is not configured")]
    DatasourceNotFound { name: String },

    #[error("{hook} listener on '{object}' failed: {source}")]
    Listener {
        object: String,
        hook: HookName,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("object '{object}' has no action '{action}'")]
    ActionNotFound { object: String, action: String },

    #[error("action '{action}' on '{object}' failed: {source}")]
    Action {
        object: String,
        action: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl EngineError {
    pub fn object_not_found(name: impl Into<String>) -> Self {
        Self::ObjectNotFound { name: name.into() }
    }

    pub fn datasource_not_found(name: impl Into<String>) -> Self {
        Self::DatasourceNotFound { name: name.into() }
    }

    /// The driver error, if this is one.
    #[must_use]
    pub fn as_driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Driver(e) => Some(e),
            _ => None,
        }
    }
}
