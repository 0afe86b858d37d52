// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task mailbox: a two-level (high / default) priority FIFO that the
//! mailbox processor drains from a single dedicated task thread.

use crate::error::{EngineError, EngineResult};
use fluxtask_core::{Mail, MailboxState, Priority};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

struct Inner {
    high: VecDeque<Mail>,
    default: VecDeque<Mail>,
    state: MailboxState,
}

/// Shared handle to a subtask's mailbox. Cheap to clone; every clone shares
/// the same underlying queue and wakeup signal.
#[derive(Clone)]
pub struct TaskMailbox {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
}

impl TaskMailbox {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                high: VecDeque::new(),
                default: VecDeque::new(),
                state: MailboxState::Open,
            })),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn state(&self) -> MailboxState {
        self.inner.lock().state
    }

    /// Enqueue a mail. Rejects with [`EngineError::MailboxClosed`]-shaped
    /// [`fluxtask_core::SubtaskError::MailboxRejected`] when the mailbox's
    /// current state no longer accepts mail of this priority.
    pub fn enqueue(&self, mail: Mail) -> EngineResult<()> {
        let mut inner = self.inner.lock();
        if !inner.state.accepts(mail.priority) {
            return Err(EngineError::Subtask(fluxtask_core::SubtaskError::MailboxRejected {
                name: mail.name.to_string(),
                state: state_name(inner.state),
            }));
        }
        match mail.priority {
            Priority::High => inner.high.push_back(mail),
            Priority::Default => inner.default.push_back(mail),
        }
        drop(inner);
        self.notify.notify_one();
        Ok(())
    }

    /// Pop the next mail in priority order (all high-priority mail drains
    /// before any default-priority mail is considered), FIFO within a
    /// priority level.
    pub fn try_take(&self) -> Option<Mail> {
        let mut inner = self.inner.lock();
        inner.high.pop_front().or_else(|| inner.default.pop_front())
    }

    /// Pop the next high-priority mail only, ignoring anything queued at
    /// default priority. Used by the synchronous-savepoint loop, which must
    /// not let default-priority mail run while a savepoint is in flight.
    pub fn try_take_high_priority(&self) -> Option<Mail> {
        self.inner.lock().high.pop_front()
    }

    /// True once neither queue holds any mail.
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock();
        inner.high.is_empty() && inner.default.is_empty()
    }

    /// Block (asynchronously) until a mail is available or the mailbox is
    /// closed with nothing left to drain.
    pub async fn take(&self) -> Option<Mail> {
        loop {
            if let Some(mail) = self.try_take() {
                return Some(mail);
            }
            if self.inner.lock().state == MailboxState::Closed {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Stop accepting default-priority mail; high-priority mail (control
    /// operations) is still accepted so in-flight work can finish cleanly.
    pub fn quiesce(&self) {
        let mut inner = self.inner.lock();
        if inner.state.can_transition_to(MailboxState::Quiesced) {
            inner.state = MailboxState::Quiesced;
        }
    }

    /// Stop accepting any mail and wake up anyone blocked in `take`.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.state = MailboxState::Closed;
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Drain and discard everything still queued. Used when tearing down a
    /// canceled subtask.
    pub fn drain(&self) -> Vec<Mail> {
        let mut inner = self.inner.lock();
        let mut drained: Vec<Mail> = inner.high.drain(..).collect();
        drained.extend(inner.default.drain(..));
        drained
    }
}

impl Default for TaskMailbox {
    fn default() -> Self {
        Self::new()
    }
}

fn state_name(state: MailboxState) -> &'static str {
    match state {
        MailboxState::Open => "open",
        MailboxState::Quiesced => "quiesced",
        MailboxState::Closed => "closed",
    }
}

#[cfg(test)]
#[path = "mailbox_tests.rs"]
mod tests;
