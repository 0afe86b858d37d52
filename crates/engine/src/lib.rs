// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-subtask execution engine: a single-threaded cooperative mailbox
//! scheduler, a deterministic-replay log subsystem, and the subtask
//! lifecycle state machine built on top of both.
//!
//! `fluxtask-core` owns the data model (mail, step numbers, log records,
//! flags); this crate owns the running machinery — the mailbox, the
//! processor loop, the log managers that turn the mailbox and a subtask's
//! output into a replayable history, and the [`lifecycle::Subtask`] that
//! ties all of it to an operator chain.

pub mod checkpoint;
pub mod data_log;
pub mod dp_log;
pub mod error;
pub mod lifecycle;
pub mod mailbox;
pub mod pause;
pub mod processor;
pub mod resolver;
pub mod suspension;
pub mod timer_service;

pub use checkpoint::{CheckpointOutcome, SyncSavepointGate};
pub use data_log::DataLogManager;
pub use dp_log::DpLogManager;
pub use error::{EngineError, EngineResult};
pub use lifecycle::{
    open_log_storage, spawn_writer, Cancelable, CancelHook, CheckpointCoordinator, NoopCallbacks,
    Operator, OutputBroadcaster, Subtask, SubtaskCallbacks, SubtaskControl,
};
pub use mailbox::TaskMailbox;
pub use pause::PauseController;
pub use processor::{DefaultAction, DefaultActionOutcome, MailboxProcessor};
pub use resolver::{MailHandler, MailResolver};
pub use suspension::Suspension;
pub use timer_service::{RecurringTimerHandle, TimerService, TIMER_FIRED_MAIL};
