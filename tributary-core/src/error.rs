//! Error Types
//!
//! Failures fall into three groups:
//!
//! - Configuration errors are raised while building a feature or an engine
//!   and never reach a state stream.
//! - Storage errors come from a [`Storage`](crate::storage::Storage)
//!   implementation.
//! - Engine errors terminate a state stream. They are cloned to every
//!   subscriber, so the originating error is kept behind an `Arc`.

use std::fmt;
use std::sync::Arc;

/// The error type returned by user-supplied closures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A cloneable, shareable error.
#[derive(Clone)]
pub struct SharedError(Arc<dyn std::error::Error + Send + Sync + 'static>);

impl SharedError {
    /// Wrap any error.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Borrow the wrapped error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.0
    }
}

impl From<BoxError> for SharedError {
    fn from(error: BoxError) -> Self {
        Self(Arc::from(error))
    }
}

impl fmt::Debug for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for SharedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// Raised while assembling features and engines.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An engine needs at least one feature to fold.
    #[error("must provide at least one feature")]
    NoFeatures,

    /// Neither an initial state nor a storage was provided.
    #[error("must provide an initial state or a storage")]
    MissingInitialState,

    /// No tokio runtime was given and none is current.
    #[error("no tokio runtime available to drive the engine")]
    MissingRuntime,

    /// A mandatory feature setting was never provided.
    #[error("'{0}' must be provided")]
    Missing(&'static str),

    /// A feature setting was provided more than once.
    #[error("cannot define '{0}' twice")]
    Duplicate(&'static str),
}

/// Raised by storage adapters.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Nothing has been persisted yet.
    #[error("nothing stored yet")]
    Empty,

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode state: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode state: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Any other failure from a custom storage.
    #[error("{0}")]
    Other(BoxError),
}

/// Terminal failure of an engine's state stream.
///
/// The display output is the message of the error that caused the failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// A feature failed while building a reducer.
    #[error("{0}")]
    Feature(SharedError),

    /// A reducer failed when applied to the state.
    #[error("{0}")]
    Reducer(SharedError),

    /// Loading the initial state or saving a state failed.
    #[error("{0}")]
    Storage(SharedError),
}

impl EngineError {
    /// The underlying error, whatever its origin.
    pub fn cause(&self) -> &SharedError {
        match self {
            Self::Feature(e) | Self::Reducer(e) | Self::Storage(e) => e,
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(error: StorageError) -> Self {
        Self::Storage(SharedError::new(error))
    }
}
