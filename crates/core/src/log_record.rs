// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The deterministic-replay log record format.

use crate::mail::Mail;
use crate::step::StepNumber;
use serde::{Deserialize, Serialize};

/// A single entry in the deterministic-replay log.
///
/// Every record carries the step number it was assigned when logged. On
/// disk each record is length-prefixed and tagged with a single byte
/// (`M`/`O`/`C`/`X`) ahead of the serialized payload — see
/// [`crate::log_record::LogRecord::tag`] and `fluxtask_storage::wire`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LogRecord {
    /// A mail was enqueued onto the mailbox at this step.
    MailEnqueued { step: StepNumber, mail: Mail },
    /// A record was emitted downstream at this step, to this partition.
    OutputEmitted { step: StepNumber, partition: u16, payload: Vec<u8> },
    /// A checkpoint boundary was reached at this step.
    CheckpointBoundary { step: StepNumber, checkpoint_id: u64 },
    /// The log (or the cached output for a checkpoint) was cleared at this step.
    Clear { step: StepNumber, checkpoint_id: Option<u64> },
}

impl LogRecord {
    pub fn tag(&self) -> u8 {
        match self {
            LogRecord::MailEnqueued { .. } => b'M',
            LogRecord::OutputEmitted { .. } => b'O',
            LogRecord::CheckpointBoundary { .. } => b'C',
            LogRecord::Clear { .. } => b'X',
        }
    }

    pub fn step(&self) -> StepNumber {
        match self {
            LogRecord::MailEnqueued { step, .. }
            | LogRecord::OutputEmitted { step, .. }
            | LogRecord::CheckpointBoundary { step, .. }
            | LogRecord::Clear { step, .. } => *step,
        }
    }
}

#[cfg(test)]
#[path = "log_record_tests.rs"]
mod tests;
