// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn only_disposed_is_terminal() {
    assert!(LifecyclePhase::Disposed.is_terminal());
    assert!(!LifecyclePhase::Running.is_terminal());
    assert!(!LifecyclePhase::Closing.is_terminal());
}

#[test]
fn failure_after_cancel_does_not_set_failing() {
    let mut flags = SubtaskFlags::new();
    flags.mark_canceled();
    flags.mark_failed();
    assert!(flags.canceled);
    assert!(!flags.failing);
}

#[test]
fn failure_before_cancel_sets_failing() {
    let mut flags = SubtaskFlags::new();
    flags.mark_failed();
    assert!(flags.failing);
    assert!(!flags.canceled);
}
