// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wraps external timer callbacks so firing one posts a mail instead of
//! running arbitrary code off the task thread.
//!
//! Timer callbacks are only ever registered on the task thread, so
//! [`TimerService`] is not `Sync` with itself in mind — it is owned by the
//! mailbox processor and driven only from there.

use crate::error::EngineResult;
use crate::mailbox::TaskMailbox;
use fluxtask_core::{Mail, MailArg, Priority, TimerId, TimerRegistry};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Name of the mail a fired timer is wrapped in. The resolver binds this
/// name to a handler that looks the [`TimerId`] argument back up in the
/// [`TimerRegistry`] and invokes the live callback.
pub const TIMER_FIRED_MAIL: &str = "__timer_fired";

pub struct TimerService {
    registry: Mutex<TimerRegistry>,
    mailbox: TaskMailbox,
}

impl TimerService {
    pub fn new(mailbox: TaskMailbox) -> Self {
        Self { registry: Mutex::new(TimerRegistry::new()), mailbox }
    }

    /// Register a timer under `key`, returning the stable id it will carry
    /// across restarts as long as the same key is registered again during
    /// recovery.
    pub fn register(&self, key: impl Into<String>) -> TimerId {
        self.registry.lock().register(key)
    }

    pub fn key_for(&self, id: TimerId) -> Option<String> {
        self.registry.lock().key_for(id).map(str::to_string)
    }

    /// Post a "Timer callback" mail for `id` immediately. Called by the
    /// thread that owns the actual OS/wall-clock timer once it fires.
    pub fn fire(&self, id: TimerId) -> EngineResult<()> {
        let mail = Mail::new(TIMER_FIRED_MAIL, vec![MailArg::U64(id.get())])
            .with_priority(Priority::Default);
        self.mailbox.enqueue(mail)?;
        Ok(())
    }

    /// Spawn a recurring timer that fires `key` every `interval`, returning
    /// a handle whose drop cancels it. Used for the control-delay no-op
    /// mail that defeats default-action starvation.
    pub fn spawn_recurring(self: &Arc<Self>, key: impl Into<String>, interval: Duration) -> RecurringTimerHandle {
        let id = self.register(key);
        let service = self.clone();
        let cancel = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let cancel_flag = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if cancel_flag.load(std::sync::atomic::Ordering::Relaxed) {
                    break;
                }
                if service.fire(id).is_err() {
                    break;
                }
            }
        });
        RecurringTimerHandle { cancel, task }
    }
}

pub struct RecurringTimerHandle {
    cancel: Arc<std::sync::atomic::AtomicBool>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for RecurringTimerHandle {
    fn drop(&mut self) {
        self.cancel.store(true, std::sync::atomic::Ordering::Relaxed);
        self.task.abort();
    }
}

#[cfg(test)]
#[path = "timer_service_tests.rs"]
mod tests;
