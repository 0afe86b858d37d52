// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn canceled_is_distinguished() {
    assert!(SubtaskError::Canceled.is_cancellation());
    assert!(!SubtaskError::TaskFailed("boom".into()).is_cancellation());
}

#[test]
fn first_or_suppressed_prefers_primary() {
    let primary = SubtaskError::TaskFailed("primary".into());
    let secondary = SubtaskError::TaskFailed("secondary".into());
    let result = first_or_suppressed(Some(primary), Some(secondary));
    assert!(matches!(result, Some(SubtaskError::TaskFailed(msg)) if msg == "primary"));
}

#[test]
fn first_or_suppressed_falls_back_to_secondary() {
    let secondary = SubtaskError::TaskFailed("only-error".into());
    let result = first_or_suppressed(None, Some(secondary));
    assert!(matches!(result, Some(SubtaskError::TaskFailed(msg)) if msg == "only-error"));
}

#[test]
fn first_or_suppressed_none_when_both_absent() {
    assert!(first_or_suppressed(None, None).is_none());
}
