// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mail: the unit of work the mailbox processor schedules.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Scheduling priority within the task mailbox. High-priority mail is always
/// drained before any default-priority mail is considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Default,
    High,
}

/// A single serializable argument carried by a [`Mail`].
///
/// This is the concrete representation of "a finite sequence of
/// serializable values" — mails that cannot be expressed with these variants
/// cannot be logged and must not be enqueued on a subtask whose mailbox is
/// replay-logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum MailArg {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

/// A unit of work posted to a [`crate::mailbox_state::MailboxState`].
///
/// `name` identifies which handler the [`crate::resolver`] binds this mail
/// to; it is part of the durable log format and must stay stable across
/// versions that need to replay older logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mail {
    pub name: SmolStr,
    pub args: Vec<MailArg>,
    pub priority: Priority,
}

impl Mail {
    pub fn new(name: impl Into<SmolStr>, args: Vec<MailArg>) -> Self {
        Self { name: name.into(), args, priority: Priority::Default }
    }

    pub fn high_priority(name: impl Into<SmolStr>, args: Vec<MailArg>) -> Self {
        Self { name: name.into(), args, priority: Priority::High }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

#[cfg(test)]
#[path = "mail_tests.rs"]
mod tests;
