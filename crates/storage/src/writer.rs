// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The async log writer: a dedicated worker thread that owns a
//! [`LogAppender`] and drains records appended from the task thread.
//!
//! `append` never blocks the caller: records are handed to the worker over
//! an unbounded channel and the worker batches them, flushing when the
//! configured batch size is reached or the flush interval elapses,
//! whichever comes first. Once the worker hits an I/O error it stops
//! accepting further work and every subsequent `append`/`flush` call
//! surfaces that same error — the writer fails fast rather than silently
//! dropping records after the backing log is no longer trustworthy.
//!
//! The worker thread is synchronous, matching the storage backend it wraps;
//! callers that need an async handle (e.g. to await shutdown without
//! blocking their own executor) wrap [`AsyncLogWriter::shutdown`] in
//! `tokio::task::spawn_blocking` at the call site.

use crate::backend::{LogAppender, StorageError};
use crate::output_cache::OutputCache;
use fluxtask_core::LogRecord;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

enum Command {
    Append(LogRecord),
    Shutdown,
}

pub struct AsyncLogWriterConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    /// Verbosity threshold gating this writer's own spans: `0` disables
    /// per-flush/per-shutdown logging entirely, `1` logs state transitions
    /// (spawn, flush, shutdown), `2`+ additionally logs every append.
    /// I/O failures are always logged regardless of this setting.
    pub print_level: i32,
}

impl Default for AsyncLogWriterConfig {
    fn default() -> Self {
        Self { batch_size: 64, flush_interval: Duration::from_millis(50), print_level: 1 }
    }
}

pub struct AsyncLogWriter {
    tx: mpsc::Sender<Command>,
    handle: Option<JoinHandle<()>>,
    failure: Arc<Mutex<Option<String>>>,
    output_cache: Arc<Mutex<OutputCache>>,
}

impl AsyncLogWriter {
    pub fn spawn(
        mut appender: Box<dyn LogAppender>,
        config: AsyncLogWriterConfig,
    ) -> Result<Self, StorageError> {
        let (tx, rx) = mpsc::channel::<Command>();
        let failure = Arc::new(Mutex::new(None::<String>));
        let worker_failure = failure.clone();
        let print_level = config.print_level;

        if print_level >= 1 {
            info!(batch_size = config.batch_size, "log writer starting");
        }

        let handle = std::thread::Builder::new()
            .name("fluxtask-log-writer".into())
            .spawn(move || {
                let mut pending = 0usize;
                loop {
                    let cmd = match rx.recv_timeout(config.flush_interval) {
                        Ok(cmd) => cmd,
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            if pending > 0 {
                                if let Err(e) = appender.flush() {
                                    warn!(error = %e, "log writer flush failed");
                                    record_failure(&worker_failure, &e);
                                    break;
                                }
                                if print_level >= 1 {
                                    debug!(pending, "log writer flushed on timer");
                                }
                                pending = 0;
                            }
                            continue;
                        }
                        Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    };

                    match cmd {
                        Command::Append(record) => {
                            if let Err(e) = appender.append(&record) {
                                warn!(error = %e, "log writer append failed");
                                record_failure(&worker_failure, &e);
                                break;
                            }
                            if print_level >= 2 {
                                debug!(tag = record.tag(), "log record appended");
                            }
                            pending += 1;
                            if pending >= config.batch_size {
                                if let Err(e) = appender.flush() {
                                    warn!(error = %e, "log writer flush failed");
                                    record_failure(&worker_failure, &e);
                                    break;
                                }
                                if print_level >= 1 {
                                    debug!(pending, "log writer flushed at batch size");
                                }
                                pending = 0;
                            }
                        }
                        Command::Shutdown => {
                            if pending > 0 {
                                if let Err(e) = appender.flush() {
                                    warn!(error = %e, "log writer final flush failed");
                                    record_failure(&worker_failure, &e);
                                }
                            }
                            if print_level >= 1 {
                                info!("log writer shutting down");
                            }
                            break;
                        }
                    }
                }
            })?;

        Ok(Self {
            tx,
            handle: Some(handle),
            failure,
            output_cache: Arc::new(Mutex::new(OutputCache::new())),
        })
    }

    /// Non-blocking: hands the record to the worker thread. Rejected once
    /// the writer has already failed.
    pub fn append(&self, record: LogRecord) -> Result<(), StorageError> {
        self.check_failure()?;
        // Send can only fail if the worker thread has exited, which only
        // happens after it records a failure or the writer is shut down;
        // both are covered by `check_failure` / the caller not using a
        // writer it already shut down.
        let _ = self.tx.send(Command::Append(record));
        Ok(())
    }

    pub fn enable_output_cache(&self) {
        self.output_cache.lock().unwrap_or_else(|e| e.into_inner()).set_enabled(true);
    }

    pub fn clear_cached_output(&self, checkpoint_id: u64) {
        self.output_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear_checkpoint(checkpoint_id);
    }

    pub fn record_output_for_cache(&self, checkpoint_id: u64, payload: Vec<u8>) {
        self.output_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(checkpoint_id, payload);
    }

    fn check_failure(&self) -> Result<(), StorageError> {
        if let Some(msg) = self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(StorageError::Io(std::io::Error::other(msg)));
        }
        Ok(())
    }

    /// Signal the worker to flush and exit, then join it. Blocking; callers
    /// on an async executor should run this via `spawn_blocking`.
    pub fn shutdown(mut self) -> Result<(), StorageError> {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.check_failure()
    }
}

fn record_failure(slot: &Arc<Mutex<Option<String>>>, err: &StorageError) {
    *slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(err.to_string());
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
