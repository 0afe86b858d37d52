// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fluxtask_core::test_support::noop_mail;
use fluxtask_core::Priority;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn runs_the_registered_handler() {
    let hits = Arc::new(AtomicUsize::new(0));
    let hits2 = hits.clone();
    let mut resolver = MailResolver::new();
    resolver.register(
        "ping",
        Box::new(move |_mail| {
            hits2.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );

    resolver.resolve_and_run(&noop_mail("ping", Priority::Default)).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn unregistered_name_is_fatal() {
    let resolver = MailResolver::new();
    let err = resolver.resolve_and_run(&noop_mail("mystery", Priority::Default));
    assert!(err.is_err());
}

#[test]
fn is_registered_reflects_registration() {
    let mut resolver = MailResolver::new();
    assert!(!resolver.is_registered("ping"));
    resolver.register("ping", Box::new(|_| Ok(())));
    assert!(resolver.is_registered("ping"));
}
