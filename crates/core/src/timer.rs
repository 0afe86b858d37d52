// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable timer identifiers.
//!
//! Timer callbacks are registered only on the task thread, so a
//! [`TimerRegistry`] is never shared across threads. When a timer fires, the
//! owning side wraps the callback in a "Timer callback" mail keyed by the
//! [`TimerId`] that registration assigned; the resolver maps the id back to
//! the live callback, and during replay maps it back to the same callback
//! the original registration bound.

use std::collections::HashMap;

/// A stable integer identifier assigned to a timer at first registration.
/// Ids are never reused within a subtask's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub fn get(self) -> u64 {
        self.0
    }

    /// Reconstruct an id from its raw form, e.g. when decoding the integer
    /// argument carried by a "Timer callback" mail back into a lookup key.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Bijective mapping between [`TimerId`]s and a host-supplied callback key
/// (typically the timer's registration name or target node id).
#[derive(Debug, Default)]
pub struct TimerRegistry {
    next_id: u64,
    by_id: HashMap<TimerId, String>,
    by_key: HashMap<String, TimerId>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign (or look up) a stable id for `key`. Registering the same key
    /// twice returns the same id.
    pub fn register(&mut self, key: impl Into<String>) -> TimerId {
        let key = key.into();
        if let Some(id) = self.by_key.get(&key) {
            return *id;
        }
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.by_id.insert(id, key.clone());
        self.by_key.insert(key, id);
        id
    }

    pub fn key_for(&self, id: TimerId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn id_for(&self, key: &str) -> Option<TimerId> {
        self.by_key.get(key).copied()
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
