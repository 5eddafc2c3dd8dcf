//! In-memory storage.

use parking_lot::Mutex;

use super::Storage;
use crate::error::StorageError;

/// Keeps the most recently saved state.
#[derive(Debug)]
pub struct MemoryStorage<S> {
    state: Mutex<Option<S>>,
}

impl<S> MemoryStorage<S> {
    /// A storage already holding `state`.
    pub fn new(state: S) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }

    /// A storage holding nothing: `load` fails until a state is saved.
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    /// Forget the stored state.
    pub fn clear(&self) {
        *self.state.lock() = None;
    }
}

impl<S> Default for MemoryStorage<S> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S> Storage<S> for MemoryStorage<S>
where
    S: Clone + Send,
{
    fn load(&self) -> Result<S, StorageError> {
        self.state.lock().clone().ok_or(StorageError::Empty)
    }

    fn save(&self, state: &S) -> Result<(), StorageError> {
        *self.state.lock() = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_initial_state() {
        let storage = MemoryStorage::new("initial!".to_string());
        assert_eq!(storage.load().unwrap(), "initial!");
    }

    #[test]
    fn empty_storage_fails_to_load() {
        let storage = MemoryStorage::<i32>::empty();
        assert!(matches!(storage.load(), Err(StorageError::Empty)));
    }

    #[test]
    fn load_returns_last_saved_state() {
        let storage = MemoryStorage::empty();
        storage.save(&1).unwrap();
        storage.save(&2).unwrap();

        assert_eq!(storage.load().unwrap(), 2);
    }
}
