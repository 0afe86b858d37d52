// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint bookkeeping: the boundary marker written to the log, and the
//! synchronous-savepoint gate that restricts the mailbox to high-priority
//! mail only until the in-flight savepoint resolves.

use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointOutcome {
    Completed,
    Aborted,
}

/// Set while a synchronous savepoint is in flight. The mailbox processor
/// consults this before running the default action or a default-priority
/// mail — while it holds an id, only high-priority mail and the nested
/// wait loop make progress.
#[derive(Clone, Default)]
pub struct SyncSavepointGate {
    inner: Arc<Mutex<Option<u64>>>,
}

impl SyncSavepointGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, checkpoint_id: u64) {
        *self.inner.lock() = Some(checkpoint_id);
    }

    /// Clear the gate if `checkpoint_id` is the one currently held. Clearing
    /// for a stale id (e.g. a late completion for an already-superseded
    /// savepoint) is a no-op.
    pub fn resolve(&self, checkpoint_id: u64) {
        let mut inner = self.inner.lock();
        if *inner == Some(checkpoint_id) {
            *inner = None;
        }
    }

    pub fn active_id(&self) -> Option<u64> {
        *self.inner.lock()
    }

    pub fn is_active(&self) -> bool {
        self.active_id().is_some()
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
