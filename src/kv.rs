//! A small file-backed key/value store.
//!
//! Writes are appended to a JSON-lines log and mirrored in an in-memory map.
//! Opening a store replays the log, so the last write of a key wins. The
//! store is shared between threads through cheap [`Store::handle`] clones.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt store entry on line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store is closed")]
    Closed,
}

#[derive(Serialize, Deserialize)]
struct Entry<S> {
    key: S,
    value: S,
}

#[derive(Debug)]
struct Inner {
    /// `None` once the store is closed
    writer: Option<BufWriter<File>>,
    data: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
    inner: Arc<Mutex<Inner>>,
}

impl Store {
    /// Opens or creates the store at `path`, replaying its log.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let mut data = HashMap::new();
        for (i, line) in BufReader::new(file.try_clone()?).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: Entry<String> = serde_json::from_str(&line)
                .map_err(|source| StoreError::Corrupt { line: i + 1, source })?;
            data.insert(entry.key, entry.value);
        }
        debug!("Opened store {} with {} keys", path.display(), data.len());

        Ok(Store {
            path,
            inner: Arc::new(Mutex::new(Inner {
                writer: Some(BufWriter::new(file)),
                data,
            })),
        })
    }

    /// Another handle to the same store.
    pub fn handle(&self) -> Store {
        self.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let writer = inner.writer.as_mut().ok_or(StoreError::Closed)?;
        serde_json::to_writer(&mut *writer, &Entry { key, value }).map_err(io::Error::from)?;
        writer.write_all(b"\n")?;
        inner.data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.data.get(key).cloned())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.data.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Writes buffered entries through to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if let Some(writer) = inner.writer.as_mut() {
            writer.flush()?;
            writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    /// Flushes and closes the store for every handle. Reads keep working;
    /// writes fail with [`StoreError::Closed`].
    pub fn close(&self) -> Result<(), StoreError> {
        self.flush()?;
        self.lock()?.writer = None;
        debug!("Closed store {}", self.path.display());
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}
