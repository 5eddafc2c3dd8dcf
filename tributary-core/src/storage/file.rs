//! Queue File Storage
//!
//! States are appended to a file as a queue of records. Each record is a
//! big-endian `u32` length followed by the MessagePack encoding of one
//! state. `load` returns the most recent complete record; a partially
//! written record at the end of the file (an interrupted save) is ignored.
//!
//! # Growth
//!
//! Every save appends a record and `load` reads the whole file, so the
//! file and the cost of loading grow with each published state. Call
//! [`QueueFileStorage::compact`] from time to time (on startup, for
//! instance) to keep only the latest record.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Storage;
use crate::error::StorageError;

const LENGTH_PREFIX: usize = 4;

/// Append-only file of serialized states.
#[derive(Debug)]
pub struct QueueFileStorage<S> {
    path: PathBuf,
    /// Serializes appends and reads of the file.
    lock: Mutex<()>,
    _state: PhantomData<fn() -> S>,
}

impl<S> QueueFileStorage<S> {
    /// Use the queue stored at `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _state: PhantomData,
        }
    }

    /// Location of the queue file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the file so that it holds only the most recent record.
    ///
    /// The new content is written next to the file and renamed over it, so
    /// an interrupted compaction leaves the old queue intact. Does nothing
    /// when the file is missing or holds no complete record.
    pub fn compact(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let bytes = match self.read_all() {
            Ok(bytes) => bytes,
            Err(StorageError::Empty) => return Ok(()),
            Err(e) => return Err(e),
        };
        let Some(record) = last_record(&bytes) else {
            return Ok(());
        };
        let length = u32::try_from(record.len())
            .map_err(|_| StorageError::Other("state too large for a queue record".into()))?;

        let staging = self.path.with_extension("compacting");
        let mut file = File::create(&staging)?;
        file.write_all(&length.to_be_bytes())?;
        file.write_all(record)?;
        file.sync_data()?;
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<u8>, StorageError> {
        let mut bytes = Vec::new();
        match File::open(&self.path) {
            Ok(mut file) => {
                file.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::Empty),
            Err(e) => Err(e.into()),
        }
    }
}

/// Slice of the last complete record in `bytes`.
fn last_record(bytes: &[u8]) -> Option<&[u8]> {
    let mut offset = 0;
    let mut last = None;
    while bytes.len() - offset >= LENGTH_PREFIX {
        let mut prefix = [0u8; LENGTH_PREFIX];
        prefix.copy_from_slice(&bytes[offset..offset + LENGTH_PREFIX]);
        let length = u32::from_be_bytes(prefix) as usize;
        let start = offset + LENGTH_PREFIX;
        let Some(end) = start.checked_add(length).filter(|end| *end <= bytes.len()) else {
            break;
        };
        last = Some(&bytes[start..end]);
        offset = end;
    }
    last
}

impl<S> Storage<S> for QueueFileStorage<S>
where
    S: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<S, StorageError> {
        let _guard = self.lock.lock();
        let bytes = self.read_all()?;
        let record = last_record(&bytes).ok_or(StorageError::Empty)?;
        Ok(rmp_serde::from_slice(record)?)
    }

    fn save(&self, state: &S) -> Result<(), StorageError> {
        let encoded = rmp_serde::to_vec(state)?;
        let length = u32::try_from(encoded.len())
            .map_err(|_| StorageError::Other("state too large for a queue record".into()))?;

        let mut record = Vec::with_capacity(LENGTH_PREFIX + encoded.len());
        record.extend_from_slice(&length.to_be_bytes());
        record.extend_from_slice(&encoded);

        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&record)?;
        file.sync_data()?;
        Ok(())
    }
}
