//! Storage Adapters
//!
//! An engine configured with a storage loads its initial state from it
//! each time a run starts, and saves every published state.
//!
//! - [`MemoryStorage`]: keeps the last saved state in memory.
//! - [`InitialValueStorage`]: masks the first failed load with a default.
//! - [`QueueFileStorage`]: appends states to a file.

mod file;
mod initial_value;
mod memory;

pub use file::QueueFileStorage;
pub use initial_value::InitialValueStorage;
pub use memory::MemoryStorage;

use std::sync::Arc;

use crate::error::StorageError;

/// Source of the initial state and sink of published states.
pub trait Storage<S>: Send + Sync {
    /// Load the stored state. Fails when nothing is stored.
    fn load(&self) -> Result<S, StorageError>;

    /// Persist `state`.
    fn save(&self, state: &S) -> Result<(), StorageError>;
}

impl<S, T> Storage<S> for Arc<T>
where
    T: Storage<S> + ?Sized,
{
    fn load(&self) -> Result<S, StorageError> {
        (**self).load()
    }

    fn save(&self, state: &S) -> Result<(), StorageError> {
        (**self).save(state)
    }
}

/// Decorators available on every storage.
pub trait StorageExt<S>: Storage<S> + Sized {
    /// Mask the first failed [`load`](Storage::load) with `default`.
    fn initial_value<F>(self, default: F) -> InitialValueStorage<S, Self>
    where
        F: Fn() -> S + Send + Sync + 'static,
    {
        InitialValueStorage::new(self, default)
    }
}

impl<S, T: Storage<S>> StorageExt<S> for T {}
