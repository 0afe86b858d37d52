// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pause flag and pause future gating the default action.
//!
//! `pause()` flips the flag and arms a future the default-action loop can
//! await; `resume()` completes that future *and* re-arms a fresh one for
//! the next pause, rather than leaving the flag permanently resolved. This
//! is the resolved behavior for repeated pause/resume cycles across a
//! subtask's lifetime: each pause gets its own future instead of every
//! caller racing to observe a single one-shot completion.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone)]
pub struct PauseController {
    paused: Arc<Mutex<bool>>,
    notify: Arc<Notify>,
}

impl PauseController {
    pub fn new() -> Self {
        Self { paused: Arc::new(Mutex::new(false)), notify: Arc::new(Notify::new()) }
    }

    pub fn pause(&self) {
        *self.paused.lock() = true;
    }

    /// Resume the default action and re-arm the pause future so a
    /// subsequent `pause()` blocks new waiters again.
    pub fn resume(&self) {
        *self.paused.lock() = false;
        self.notify.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.lock()
    }

    /// Await until not paused. Resolves immediately if not currently paused.
    pub async fn wait_until_resumed(&self) {
        loop {
            if !self.is_paused() {
                return;
            }
            self.notify.notified().await;
        }
    }
}

impl Default for PauseController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "pause_tests.rs"]
mod tests;
