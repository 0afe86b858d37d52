// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step numbering and the recovery cursor.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing identifier assigned to every scheduling decision
/// and every outbound record the subtask logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StepNumber(u64);

impl StepNumber {
    pub const ZERO: StepNumber = StepNumber(0);

    pub fn new(n: u64) -> Self {
        Self(n)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for StepNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocates strictly increasing [`StepNumber`]s for the task thread.
///
/// Single-threaded by contract: only the task thread calls [`StepAllocator::allocate`].
/// The atomic is only there to let the DP log manager read the current high-water
/// mark from another thread for diagnostics without taking a lock.
#[derive(Debug, Default)]
pub struct StepAllocator {
    next: AtomicU64,
}

impl StepAllocator {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(0) }
    }

    pub fn allocate(&self) -> StepNumber {
        StepNumber(self.next.fetch_add(1, Ordering::Relaxed))
    }

    pub fn peek(&self) -> StepNumber {
        StepNumber(self.next.load(Ordering::Relaxed))
    }
}

/// Tracks where recovery has reached relative to the durable replay target.
///
/// `stored` is the step number recorded as the recovery target when the
/// subtask last shut down cleanly (or `None` for a fresh subtask with no
/// prior log). `replayed` advances as records are consumed during recovery.
/// [`StepCursor::recovery_complete`] flips from `false` to `true` exactly
/// once, the instant `replayed` reaches `stored`.
#[derive(Debug, Clone, Copy)]
pub struct StepCursor {
    stored: Option<StepNumber>,
    replayed: StepNumber,
    completed: bool,
}

impl StepCursor {
    pub fn fresh() -> Self {
        Self { stored: None, replayed: StepNumber::ZERO, completed: true }
    }

    pub fn for_recovery(target: StepNumber) -> Self {
        Self { stored: Some(target), replayed: StepNumber::ZERO, completed: false }
    }

    pub fn stored(&self) -> Option<StepNumber> {
        self.stored
    }

    pub fn replayed(&self) -> StepNumber {
        self.replayed
    }

    /// Advance the replayed cursor by one logged step. Returns `true` the
    /// single time this call causes recovery to complete.
    pub fn advance(&mut self) -> bool {
        self.replayed = self.replayed.next();
        if !self.completed && Some(self.replayed) >= self.stored {
            self.completed = true;
            return true;
        }
        false
    }

    pub fn recovery_complete(&self) -> bool {
        self.completed
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
