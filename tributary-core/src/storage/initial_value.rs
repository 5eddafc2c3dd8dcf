//! First-Load Default
//!
//! [`InitialValueStorage`] wraps another storage. The very first `load`
//! falls back to a default value when the wrapped storage fails, which
//! covers the "nothing saved yet" case of a fresh install. Every later
//! `load` goes straight to the wrapped storage, failures included: once
//! the application has started, a failing storage must not be masked.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use super::Storage;
use crate::error::StorageError;

/// Masks only the first failed load of the decorated storage.
pub struct InitialValueStorage<S, St> {
    decorated: St,
    default: Box<dyn Fn() -> S + Send + Sync>,
    first_load: AtomicBool,
}

impl<S, St> InitialValueStorage<S, St>
where
    St: Storage<S>,
{
    pub fn new<F>(decorated: St, default: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        Self {
            decorated,
            default: Box::new(default),
            first_load: AtomicBool::new(true),
        }
    }

    /// The decorated storage.
    pub fn inner(&self) -> &St {
        &self.decorated
    }
}

impl<S, St> Storage<S> for InitialValueStorage<S, St>
where
    St: Storage<S>,
{
    fn load(&self) -> Result<S, StorageError> {
        if self.first_load.swap(false, Ordering::SeqCst) {
            return self.decorated.load().or_else(|_| Ok((self.default)()));
        }
        self.decorated.load()
    }

    fn save(&self, state: &S) -> Result<(), StorageError> {
        self.decorated.save(state)
    }
}

impl<S, St> fmt::Debug for InitialValueStorage<S, St>
where
    St: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitialValueStorage")
            .field("decorated", &self.decorated)
            .field("first_load", &self.first_load.load(Ordering::SeqCst))
            .finish()
    }
}
