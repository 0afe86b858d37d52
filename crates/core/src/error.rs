// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types shared across the mailbox, log, and lifecycle subsystems.

use thiserror::Error;
use tracing::warn;

/// Everything that can go wrong while driving a subtask.
#[derive(Debug, Error)]
pub enum SubtaskError {
    #[error("mail {name:?} rejected: mailbox is {state}")]
    MailboxRejected { name: String, state: &'static str },

    #[error("unknown mail name {name:?} encountered during replay")]
    UnresolvedMail { name: String },

    #[error("log storage I/O failed: {0}")]
    LogIo(#[source] std::io::Error),

    #[error("log writer failed asynchronously: {0}")]
    AsyncWriterFailed(String),

    #[error("checkpoint {checkpoint_id} failed: {reason}")]
    CheckpointFailed { checkpoint_id: u64, reason: String },

    #[error("recovery failed and is not retryable: {0}")]
    RecoveryFailed(String),

    #[error("subtask was canceled")]
    Canceled,

    #[error("subtask failed: {0}")]
    TaskFailed(String),
}

impl SubtaskError {
    /// True for the distinguished "this is a cancellation, not a failure"
    /// exception kind — callers branch on this instead of failure-handling
    /// a deliberate cancel.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SubtaskError::Canceled)
    }
}

/// Combine a primary error with whatever secondary error occurred while
/// cleaning up after it. The primary always wins; the secondary is recorded
/// so it is never silently dropped, but it never masks the original cause.
///
/// Mirrors the "first-or-suppressed" propagation rule: cleanup failures
/// after an already-failing operation must not replace the original error.
pub fn first_or_suppressed(
    primary: Option<SubtaskError>,
    secondary: Option<SubtaskError>,
) -> Option<SubtaskError> {
    match (primary, secondary) {
        (Some(p), Some(s)) => {
            warn!(error = %s, "secondary error suppressed during cleanup");
            Some(p)
        }
        (Some(p), None) => Some(p),
        (None, Some(s)) => Some(s),
        (None, None) => None,
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
