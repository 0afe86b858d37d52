// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The deterministic-replay (DP) log manager.
//!
//! Every mail enqueue is assigned a step number and logged before it reaches
//! the mailbox. On a fresh subtask this is the only thing the manager does.
//! On recovery, the manager instead *drives* the mailbox: it replays logged
//! [`fluxtask_core::LogRecord::MailEnqueued`] records in step order,
//! re-enqueuing each one, until the stored recovery target is reached —
//! only then does live scheduling resume and new enqueues start being
//! logged going forward.

use crate::error::EngineResult;
use crate::mailbox::TaskMailbox;
use fluxtask_core::{LogRecord, Mail, StepAllocator, StepCursor, StepNumber};
use fluxtask_storage::{AsyncLogWriter, LogReader, LogStorageBackend};
use std::sync::Arc;

pub struct DpLogManager {
    allocator: Arc<StepAllocator>,
    cursor: StepCursor,
    writer: Arc<AsyncLogWriter>,
}

impl DpLogManager {
    pub fn fresh(writer: Arc<AsyncLogWriter>, allocator: Arc<StepAllocator>) -> Self {
        Self { allocator, cursor: StepCursor::fresh(), writer }
    }

    pub fn for_recovery(writer: Arc<AsyncLogWriter>, allocator: Arc<StepAllocator>, target: StepNumber) -> Self {
        Self { allocator, cursor: StepCursor::for_recovery(target), writer }
    }

    pub fn recovery_complete(&self) -> bool {
        self.cursor.recovery_complete()
    }

    /// Log a mail and return the step number it was assigned.
    pub fn log_enqueue(&mut self, mail: &Mail) -> EngineResult<StepNumber> {
        let step = self.allocator.allocate();
        self.writer.append(LogRecord::MailEnqueued { step, mail: mail.clone() })?;
        Ok(step)
    }

    /// Replay every `MailEnqueued` record from `backend`'s log named `log_name`,
    /// re-enqueuing each onto `mailbox` in step order and advancing the
    /// recovery cursor. Returns once the stored recovery target is reached
    /// or the log is exhausted, whichever comes first.
    pub fn replay(
        &mut self,
        backend: &dyn LogStorageBackend,
        log_name: &str,
        mailbox: &TaskMailbox,
    ) -> EngineResult<()> {
        let mut reader = backend.open_read(log_name)?;
        let records = LogReader::read_all(&mut *reader)?;
        for record in records {
            if let LogRecord::MailEnqueued { mail, .. } = record {
                // Replayed mail bypasses the normal accept-state check: the
                // mailbox is always Open during recovery.
                let _ = mailbox.enqueue(mail);
            }
            let flipped = self.cursor.advance();
            if flipped {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "dp_log_tests.rs"]
mod tests;
