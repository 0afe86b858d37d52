// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The data log manager intercepts a subtask's downstream output.
//!
//! Live, it logs every emitted record and forwards it to the real
//! downstream partition writer. During recovery it does the opposite:
//! emission calls are suppressed and the manager instead replays the
//! previously logged bytes, so the operator chain re-executes deterministically
//! without re-sending already-delivered output.

use crate::error::EngineResult;
use fluxtask_core::{LogRecord, StepAllocator, StepNumber};
use fluxtask_storage::{AsyncLogWriter, LogReader, LogStorageBackend};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct DataLogManager {
    allocator: Arc<StepAllocator>,
    writer: Arc<AsyncLogWriter>,
    replay: Option<Vec<Vec<u8>>>,
    replay_cursor: AtomicUsize,
}

impl DataLogManager {
    pub fn live(writer: Arc<AsyncLogWriter>, allocator: Arc<StepAllocator>) -> Self {
        Self { allocator, writer, replay: None, replay_cursor: AtomicUsize::new(0) }
    }

    pub fn recovering(
        writer: Arc<AsyncLogWriter>,
        allocator: Arc<StepAllocator>,
        backend: &dyn LogStorageBackend,
        log_name: &str,
    ) -> EngineResult<Self> {
        let mut reader = backend.open_read(log_name)?;
        let records = LogReader::read_all(&mut *reader)?;
        let replay = records
            .into_iter()
            .filter_map(|r| match r {
                LogRecord::OutputEmitted { payload, .. } => Some(payload),
                _ => None,
            })
            .collect();
        Ok(Self { allocator, writer, replay: Some(replay), replay_cursor: AtomicUsize::new(0) })
    }

    pub fn is_recovering(&self) -> bool {
        self.replay.is_some()
    }

    /// Emit one record of downstream output to `partition`. Live, this logs
    /// `payload` and returns it unchanged for the caller to forward.
    /// Recovering, this ignores `payload` entirely and returns the next
    /// logged payload instead — the operator chain still runs, but its
    /// output is replaced by what was actually sent last time.
    pub fn emit(&self, partition: u16, payload: Vec<u8>) -> EngineResult<(StepNumber, Vec<u8>)> {
        let step = self.allocator.allocate();
        match &self.replay {
            None => {
                self.writer.append(LogRecord::OutputEmitted { step, partition, payload: payload.clone() })?;
                Ok((step, payload))
            }
            Some(logged) => {
                let idx = self.replay_cursor.fetch_add(1, Ordering::SeqCst);
                let replayed = logged.get(idx).cloned().unwrap_or_default();
                Ok((step, replayed))
            }
        }
    }
}

#[cfg(test)]
#[path = "data_log_tests.rs"]
mod tests;
