// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pluggable log storage backends.
//!
//! [`LogStorageBackend`] is the seam a real deployment swaps for whatever
//! distributed filesystem it runs on; this crate ships three
//! implementations — [`MemoryLogStorage`] for tests, [`LocalFileLogStorage`]
//! for a single local disk, and [`RemoteFsLogStorage`] as the pluggable
//! placeholder rooted at a caller-supplied mount point.

use crate::wire::{self, WireError};
use fluxtask_core::LogRecord;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
}

pub trait LogAppender: Send {
    fn append(&mut self, record: &LogRecord) -> Result<(), StorageError>;
    fn flush(&mut self) -> Result<(), StorageError>;
}

pub trait LogReader: Send {
    /// Read every well-formed record from the start of the log. Stops
    /// cleanly at the first record that fails to decode rather than
    /// propagating an error for the rest of a truncated or corrupted tail.
    fn read_all(&mut self) -> Result<Vec<LogRecord>, StorageError>;
}

pub trait LogStorageBackend: Send + Sync {
    fn exists(&self, name: &str) -> Result<bool, StorageError>;
    fn open_append_or_create(&self, name: &str) -> Result<Box<dyn LogAppender>, StorageError>;
    fn open_read(&self, name: &str) -> Result<Box<dyn LogReader>, StorageError>;
    /// Clearing a log that does not exist is a no-op, not an error.
    fn clear(&self, name: &str) -> Result<(), StorageError>;
    fn delete(&self, name: &str) -> Result<(), StorageError>;
}

// --- Memory backend --------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryLogStorage {
    logs: std::sync::Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryLogStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryAppender {
    name: String,
    store: std::sync::Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pending: Vec<u8>,
}

impl LogAppender for MemoryAppender {
    fn append(&mut self, record: &LogRecord) -> Result<(), StorageError> {
        self.pending.extend_from_slice(&wire::encode(record)?);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        let mut logs = self.store.lock().unwrap_or_else(|e| e.into_inner());
        logs.entry(self.name.clone()).or_default().extend_from_slice(&self.pending);
        self.pending.clear();
        Ok(())
    }
}

struct MemoryReader {
    bytes: Vec<u8>,
}

impl LogReader for MemoryReader {
    fn read_all(&mut self) -> Result<Vec<LogRecord>, StorageError> {
        read_all_tolerant(&mut std::io::Cursor::new(&self.bytes))
    }
}

impl LogStorageBackend for MemoryLogStorage {
    fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.logs.lock().unwrap_or_else(|e| e.into_inner()).contains_key(name))
    }

    fn open_append_or_create(&self, name: &str) -> Result<Box<dyn LogAppender>, StorageError> {
        self.logs.lock().unwrap_or_else(|e| e.into_inner()).entry(name.to_string()).or_default();
        Ok(Box::new(MemoryAppender {
            name: name.to_string(),
            store: self.logs.clone(),
            pending: Vec::new(),
        }))
    }

    fn open_read(&self, name: &str) -> Result<Box<dyn LogReader>, StorageError> {
        let bytes = self
            .logs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(MemoryReader { bytes }))
    }

    fn clear(&self, name: &str) -> Result<(), StorageError> {
        self.logs.lock().unwrap_or_else(|e| e.into_inner()).remove(name);
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.clear(name)
    }
}

// --- Local file backend ------------------------------------------------------

const MAX_BACKUPS: usize = 3;

pub struct LocalFileLogStorage {
    directory: PathBuf,
}

impl LocalFileLogStorage {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    /// Rotate `path` out of the way under `.bak`, shifting any existing
    /// `.bak` -> `.bak.2` -> `.bak.3`, discarding anything older than that.
    fn rotate_backups(&self, path: &Path) -> std::io::Result<()> {
        let bak3 = path.with_extension("bak.3");
        let bak2 = path.with_extension("bak.2");
        let bak1 = path.with_extension("bak");
        if bak3.exists() {
            fs::remove_file(&bak3)?;
        }
        if bak2.exists() {
            fs::rename(&bak2, &bak3)?;
        }
        if bak1.exists() {
            fs::rename(&bak1, &bak2)?;
        }
        if path.exists() {
            fs::rename(path, &bak1)?;
        }
        Ok(())
    }

    /// Read every valid record from `path`, and if the tail is corrupt,
    /// rewrite `path` to contain only the valid prefix after rotating the
    /// original aside as a backup.
    fn read_and_repair(&self, path: &Path) -> Result<Vec<LogRecord>, StorageError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(path)?;
        let mut cursor = std::io::Cursor::new(&bytes);
        let (records, clean_len) = read_all_tolerant_with_offset(&mut cursor)?;
        if clean_len < bytes.len() as u64 {
            self.rotate_backups(path)?;
            fs::write(path, &bytes[..clean_len as usize])?;
        }
        Ok(records)
    }
}

struct LocalFileAppender {
    file: File,
}

impl LogAppender for LocalFileAppender {
    fn append(&mut self, record: &LogRecord) -> Result<(), StorageError> {
        let bytes = wire::encode(record)?;
        self.file.write_all(&bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}

struct LocalFileReader {
    records: Vec<LogRecord>,
}

impl LogReader for LocalFileReader {
    fn read_all(&mut self) -> Result<Vec<LogRecord>, StorageError> {
        Ok(std::mem::take(&mut self.records))
    }
}

impl LogStorageBackend for LocalFileLogStorage {
    fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.path_for(name).exists())
    }

    fn open_append_or_create(&self, name: &str) -> Result<Box<dyn LogAppender>, StorageError> {
        fs::create_dir_all(&self.directory)?;
        let path = self.path_for(name);
        // Repair any corrupt tail left by a previous crash before appending.
        self.read_and_repair(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Box::new(LocalFileAppender { file }))
    }

    fn open_read(&self, name: &str) -> Result<Box<dyn LogReader>, StorageError> {
        let records = self.read_and_repair(&self.path_for(name))?;
        Ok(Box::new(LocalFileReader { records }))
    }

    fn clear(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path_for(name);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.clear(name)
    }
}

// --- Remote filesystem placeholder -------------------------------------------

/// The pluggable seam a real deployment replaces with its distributed
/// filesystem client. Rooted at a caller-supplied mount point; today it
/// delegates to the same append/read primitives as [`LocalFileLogStorage`]
/// so the ordering and corruption-handling invariants are identical and
/// testable without a real remote filesystem.
pub struct RemoteFsLogStorage {
    inner: LocalFileLogStorage,
}

impl RemoteFsLogStorage {
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        Self { inner: LocalFileLogStorage::new(mount) }
    }
}

impl LogStorageBackend for RemoteFsLogStorage {
    fn exists(&self, name: &str) -> Result<bool, StorageError> {
        self.inner.exists(name)
    }

    fn open_append_or_create(&self, name: &str) -> Result<Box<dyn LogAppender>, StorageError> {
        self.inner.open_append_or_create(name)
    }

    fn open_read(&self, name: &str) -> Result<Box<dyn LogReader>, StorageError> {
        self.inner.open_read(name)
    }

    fn clear(&self, name: &str) -> Result<(), StorageError> {
        self.inner.clear(name)
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.inner.delete(name)
    }
}

// --- shared tolerant-read helper ---------------------------------------------

fn read_all_tolerant<R: std::io::Read>(r: &mut R) -> Result<Vec<LogRecord>, StorageError> {
    let mut out = Vec::new();
    loop {
        match wire::read_record(r) {
            Ok(Some(rec)) => out.push(rec),
            Ok(None) => break,
            Err(_) => break,
        }
    }
    Ok(out)
}

fn read_all_tolerant_with_offset(
    cursor: &mut std::io::Cursor<&Vec<u8>>,
) -> Result<(Vec<LogRecord>, u64), StorageError> {
    let mut out = Vec::new();
    loop {
        let before = cursor.position();
        match wire::read_record(cursor) {
            Ok(Some(rec)) => out.push(rec),
            Ok(None) => return Ok((out, before)),
            Err(_) => return Ok((out, before)),
        }
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
