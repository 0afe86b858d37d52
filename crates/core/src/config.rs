// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The subtask's configuration value.
//!
//! This crate does not parse configuration files or environment variables —
//! the host process builds a [`SubtaskConfig`] value however it likes and
//! hands it to the engine. Every field here is something the modules in
//! this spec actually read; there is no passthrough bag of unused options.

use std::time::Duration;

/// Which log storage backend a subtask should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogStorageKind {
    Memory,
    LocalFile { directory: std::path::PathBuf },
    RemoteFs { mount: std::path::PathBuf },
}

/// Immutable configuration handed to a subtask at construction time.
#[derive(Debug, Clone)]
pub struct SubtaskConfig {
    /// Identifies this subtask's log on disk / in the backend.
    pub subtask_id: String,
    pub log_storage: LogStorageKind,
    /// Max records buffered by the async log writer before a blocking flush.
    pub log_writer_batch_size: usize,
    /// Max delay before the async log writer flushes a non-empty batch.
    pub log_writer_flush_interval: Duration,
    /// Interval at which a no-op control-delay mail is enqueued to defeat
    /// default-action starvation when nothing else yields control.
    pub control_delay: Option<Duration>,
    /// Whether the output cache is enabled for this subtask's data log.
    pub enable_output_cache: bool,
    /// Whether replay logging is on at all. When `false`, a subtask runs
    /// without deterministic replay: no DP or data log is written, and
    /// recovery is not possible.
    pub enable_logging: bool,
    /// Delete any pre-existing log under this subtask's id before opening a
    /// fresh one, instead of appending to or recovering from it.
    pub clear_old_log: bool,
    /// Verbosity threshold gating the log writer's own tracing spans
    /// (flush/append/shutdown). Spans at or below this level are emitted;
    /// interpretation of the scale itself is left to the host's tracing
    /// subscriber configuration.
    pub print_level: i32,
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct SubtaskConfigBuilder => SubtaskConfig {
        into { subtask_id: String = "test-subtask" }
        set { log_storage: LogStorageKind = LogStorageKind::Memory }
        set { log_writer_batch_size: usize = 64 }
        set { log_writer_flush_interval: Duration = Duration::from_millis(50) }
        option { control_delay: Duration = None }
        set { enable_output_cache: bool = true }
        set { enable_logging: bool = true }
        set { clear_old_log: bool = false }
        set { print_level: i32 = 1 }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
