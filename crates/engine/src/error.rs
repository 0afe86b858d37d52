// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-level error type, composing the data-model errors from
//! `fluxtask-core` with the I/O errors from `fluxtask-storage`.

use fluxtask_core::SubtaskError;
use fluxtask_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Subtask(#[from] SubtaskError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("mailbox closed")]
    MailboxClosed,
    #[error("unknown timer id {0}")]
    UnknownTimer(u64),
}

pub type EngineResult<T> = Result<T, EngineError>;
