// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binds mail names to the handlers that run them.
//!
//! Every mail name the subtask can ever enqueue must be registered before
//! recovery starts — an unresolved name encountered while replaying the log
//! is a fatal, non-retryable condition: the log describes a program that no
//! longer exists.

use crate::error::{EngineError, EngineResult};
use fluxtask_core::{Mail, SubtaskError};
use std::collections::HashMap;

pub type MailHandler = Box<dyn Fn(&Mail) -> EngineResult<()> + Send + Sync>;

#[derive(Default)]
pub struct MailResolver {
    handlers: HashMap<String, MailHandler>,
}

impl MailResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: MailHandler) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Run the mail's handler, or fail fatally if nothing is registered for
    /// its name.
    pub fn resolve_and_run(&self, mail: &Mail) -> EngineResult<()> {
        match self.handlers.get(mail.name.as_str()) {
            Some(handler) => handler(mail),
            None => Err(EngineError::Subtask(SubtaskError::UnresolvedMail {
                name: mail.name.to_string(),
            })),
        }
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
