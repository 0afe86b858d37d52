// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Suspension token returned to operators that want to suspend the default
//! action and resume it later from a different thread (e.g. once an async
//! I/O operation completes).

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct State {
    resumed: bool,
}

/// Handed out by [`crate::processor::MailboxProcessor::suspend_default_action`].
/// At most one token may be live at a time — requesting a second suspension
/// while one is outstanding is a programming error the processor rejects.
#[derive(Clone)]
pub struct Suspension {
    state: Arc<Mutex<State>>,
    notify: Arc<Notify>,
}

impl Suspension {
    pub(crate) fn new() -> Self {
        Self { state: Arc::new(Mutex::new(State::default())), notify: Arc::new(Notify::new()) }
    }

    /// Resume the default action. Idempotent: resuming an already-resumed
    /// token has no further effect.
    pub fn resume(&self) {
        let mut state = self.state.lock();
        if state.resumed {
            return;
        }
        state.resumed = true;
        drop(state);
        self.notify.notify_waiters();
    }

    pub fn is_resumed(&self) -> bool {
        self.state.lock().resumed
    }

    pub(crate) async fn wait(&self) {
        loop {
            if self.is_resumed() {
                return;
            }
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
#[path = "suspension_tests.rs"]
mod tests;
