// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn default_priority_is_plain_new() {
    let m = Mail::new("timer-fired", vec![MailArg::U64(7)]);
    assert_eq!(m.priority, Priority::Default);
}

#[test]
fn high_priority_constructor_tags_priority() {
    let m = Mail::high_priority("cancel", vec![]);
    assert_eq!(m.priority, Priority::High);
}

#[test]
fn with_priority_overrides() {
    let m = Mail::new("x", vec![]).with_priority(Priority::High);
    assert_eq!(m.priority, Priority::High);
}

#[test]
fn default_orders_below_high() {
    assert!(Priority::Default < Priority::High);
}

#[test]
fn mail_arg_round_trips_through_json() {
    let arg = MailArg::Json(serde_json::json!({"k": 1}));
    let s = serde_json::to_string(&arg).unwrap();
    let back: MailArg = serde_json::from_str(&s).unwrap();
    assert_eq!(arg, back);
}
