// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The mailbox processor: the single-threaded cooperative scheduler that
//! interleaves a default action with the mails queued on a [`TaskMailbox`].
//!
//! Ordering guarantees:
//! - mail of a given priority runs FIFO;
//! - all high-priority mail at a scheduling decision point runs strictly
//!   before any default-priority mail is considered;
//! - at most one default-action execution happens between two mails of the
//!   same priority — the default action never starves the mailbox, and the
//!   mailbox never starves the default action for longer than one mail.

use crate::checkpoint::SyncSavepointGate;
use crate::error::{EngineError, EngineResult};
use crate::mailbox::TaskMailbox;
use crate::pause::PauseController;
use crate::resolver::MailResolver;
use crate::suspension::Suspension;
use fluxtask_core::MailboxState;
use parking_lot::Mutex;

/// What a single invocation of the default action reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultActionOutcome {
    /// There is more synchronous work; call the default action again on
    /// the next iteration once the mailbox has been given a chance to run.
    MoreWork,
    /// The default action has nothing left to do right now and is
    /// suspending itself until external input arrives (the returned
    /// [`Suspension`] will be resumed from another thread).
    Suspended,
    /// The default action is permanently done (e.g. upstream is exhausted).
    /// The processor drains remaining mail and then exits the loop.
    Finished,
}

/// Callback the default action is given each time it runs. Mirrors the
/// controller object an operator's invoke loop is handed in the original
/// design: it is the only sanctioned way to suspend the default action.
pub trait DefaultAction: Send {
    fn run(&mut self) -> EngineResult<DefaultActionOutcome>;
}

impl<F> DefaultAction for F
where
    F: FnMut() -> EngineResult<DefaultActionOutcome> + Send,
{
    fn run(&mut self) -> EngineResult<DefaultActionOutcome> {
        (self)()
    }
}

pub struct MailboxProcessor<A: DefaultAction> {
    mailbox: TaskMailbox,
    resolver: MailResolver,
    pause: PauseController,
    savepoint_gate: SyncSavepointGate,
    suspension: Mutex<Option<Suspension>>,
    default_action: A,
    default_action_finished: bool,
}

impl<A: DefaultAction> MailboxProcessor<A> {
    pub fn new(
        mailbox: TaskMailbox,
        resolver: MailResolver,
        pause: PauseController,
        savepoint_gate: SyncSavepointGate,
        default_action: A,
    ) -> Self {
        Self {
            mailbox,
            resolver,
            pause,
            savepoint_gate,
            suspension: Mutex::new(None),
            default_action,
            default_action_finished: false,
        }
    }

    pub fn mailbox(&self) -> &TaskMailbox {
        &self.mailbox
    }

    /// Request that the default action be suspended. At most one
    /// suspension may be outstanding; calling this again before the
    /// previous one resumes is a logic error in the caller.
    pub fn suspend_default_action(&self) -> EngineResult<Suspension> {
        let mut guard = self.suspension.lock();
        if guard.is_some() {
            return Err(EngineError::Subtask(fluxtask_core::SubtaskError::TaskFailed(
                "default action already suspended".into(),
            )));
        }
        let token = Suspension::new();
        *guard = Some(token.clone());
        Ok(token)
    }

    fn live_suspension(&self) -> Option<Suspension> {
        match self.suspension.lock().as_ref() {
            Some(token) if !token.is_resumed() => Some(token.clone()),
            _ => None,
        }
    }

    fn clear_resumed_suspension(&self) {
        let mut guard = self.suspension.lock();
        if matches!(guard.as_ref(), Some(token) if token.is_resumed()) {
            *guard = None;
        }
    }

    /// Run one scheduling decision: drain at most one mail, or — if none is
    /// available and nothing blocks it — run the default action once.
    /// Returns `true` if there is more work to do.
    ///
    /// While a synchronous savepoint is active, this gates default-priority
    /// mail and the default action the same way: only high-priority mail is
    /// taken, and calling `run_step` in a loop from the caller is exactly the
    /// "wait for the savepoint, run high-priority mail in the meantime" loop
    /// a live checkpoint needs — no separate nested loop required.
    pub async fn run_step(&mut self) -> EngineResult<bool> {
        self.clear_resumed_suspension();

        let savepoint_active = self.savepoint_gate.is_active();
        let next_mail =
            if savepoint_active { self.mailbox.try_take_high_priority() } else { self.mailbox.try_take() };

        if let Some(mail) = next_mail {
            self.resolver.resolve_and_run(&mail)?;
            return Ok(true);
        }

        if savepoint_active {
            // Default-priority mail and the default action are both gated
            // until the savepoint resolves; nothing to do but wait.
            return Ok(true);
        }

        if self.default_action_finished {
            // Already drained whatever mail was available above; a
            // permanently-finished default action has nothing left to wait
            // for, so the loop exits here rather than blocking on mail that
            // may never come.
            return Ok(false);
        }

        self.pause.wait_until_resumed().await;

        if let Some(token) = self.live_suspension() {
            // Wait for an external resume rather than busy-spinning the
            // scheduling loop while the default action is suspended.
            token.wait().await;
            return Ok(true);
        }

        match self.default_action.run()? {
            DefaultActionOutcome::MoreWork => Ok(true),
            DefaultActionOutcome::Suspended => Ok(true),
            DefaultActionOutcome::Finished => {
                self.default_action_finished = true;
                Ok(true)
            }
        }
    }

    /// Run until there is nothing left to do: the default action has
    /// finished and the mailbox is closed and empty.
    pub async fn run_loop(&mut self) -> EngineResult<()> {
        while self.run_step().await? {}
        Ok(())
    }

    /// Permanently mark the default action as having nothing left to do.
    /// Unlike [`MailboxProcessor::suspend_default_action`], this never
    /// resumes: `run_step` stops invoking the default action from here on,
    /// while mail of either priority keeps draining normally.
    pub fn suspend(&mut self) {
        self.default_action_finished = true;
    }

    /// Stop accepting default-priority mail so shutdown can proceed without
    /// new background work being scheduled.
    pub fn prepare_close(&self) {
        self.mailbox.quiesce();
    }

    /// Stop accepting any mail and wake blocked waiters.
    pub fn close(&self) {
        self.mailbox.close();
    }

    /// Discard everything still queued without running it.
    pub fn drain(&self) -> Vec<fluxtask_core::Mail> {
        self.mailbox.drain()
    }

    pub fn all_actions_completed(&self) -> bool {
        self.default_action_finished
            && self.mailbox.is_empty()
            && self.mailbox.state() == MailboxState::Closed
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
