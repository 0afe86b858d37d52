// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::resolver::MailResolver;
use fluxtask_core::test_support::{int_mail, noop_mail};
use fluxtask_core::{Mail, Priority};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counting_resolver(counter: Arc<AtomicUsize>) -> MailResolver {
    let mut resolver = MailResolver::new();
    resolver.register(
        "count",
        Box::new(move |_mail| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );
    resolver
}

fn finished_action() -> impl FnMut() -> EngineResult<DefaultActionOutcome> {
    move || Ok(DefaultActionOutcome::Finished)
}

#[tokio::test]
async fn drains_high_priority_mail_before_default_priority() {
    let mailbox = TaskMailbox::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut resolver = MailResolver::new();
    let recorded = order.clone();
    resolver.register(
        "mark",
        Box::new(move |mail| {
            recorded.lock().push(mail.name.to_string());
            Ok(())
        }),
    );

    mailbox.enqueue(noop_mail("mark", Priority::Default)).unwrap();
    mailbox.enqueue(noop_mail("mark", Priority::High)).unwrap();

    let mut processor = MailboxProcessor::new(
        mailbox.clone(),
        resolver,
        PauseController::new(),
        SyncSavepointGate::new(),
        finished_action(),
    );

    assert!(processor.run_step().await.unwrap());
    assert!(processor.run_step().await.unwrap());
    assert_eq!(order.lock().len(), 2);
    assert!(mailbox.is_empty());
}

#[tokio::test]
async fn default_action_runs_once_mailbox_is_empty_and_reports_finished() {
    let mailbox = TaskMailbox::new();
    mailbox.close();
    let mut processor = MailboxProcessor::new(
        mailbox.clone(),
        MailResolver::new(),
        PauseController::new(),
        SyncSavepointGate::new(),
        finished_action(),
    );

    assert!(processor.run_step().await.unwrap());
    assert!(processor.all_actions_completed());
    assert!(!processor.run_step().await.unwrap());
}

#[tokio::test]
async fn run_step_respects_active_savepoint_while_gated() {
    let mailbox = TaskMailbox::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let resolver = counting_resolver(counter.clone());
    mailbox.enqueue(int_mail("count", 1)).unwrap(); // default priority

    let gate = SyncSavepointGate::new();
    gate.begin(3);
    let mut processor = MailboxProcessor::new(
        mailbox.clone(),
        resolver,
        PauseController::new(),
        gate,
        finished_action(),
    );

    assert!(processor.run_step().await.unwrap());
    assert_eq!(counter.load(Ordering::SeqCst), 0, "default-priority mail must not run during a savepoint");
    assert!(!mailbox.is_empty());
}

#[tokio::test]
async fn suspend_default_action_blocks_until_resumed() {
    let mailbox = TaskMailbox::new();
    let finished = Arc::new(AtomicUsize::new(0));
    let finished_marker = finished.clone();
    let action = move || {
        finished_marker.fetch_add(1, Ordering::SeqCst);
        Ok(DefaultActionOutcome::Finished)
    };
    let mut processor = MailboxProcessor::new(
        mailbox,
        MailResolver::new(),
        PauseController::new(),
        SyncSavepointGate::new(),
        action,
    );

    let token = processor.suspend_default_action().unwrap();
    assert!(processor.suspend_default_action().is_err(), "only one suspension may be outstanding");

    let step = tokio::spawn(async move {
        // run_step blocks inside the live suspension's wait() until resumed.
        let mut processor = processor;
        processor.run_step().await.unwrap();
        processor
    });

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert_eq!(finished.load(Ordering::SeqCst), 0);
    token.resume();

    let mut processor = step.await.unwrap();
    assert_eq!(finished.load(Ordering::SeqCst), 0, "the suspended step only unblocks, it doesn't itself run the action");
    assert!(processor.run_step().await.unwrap());
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn suspend_stops_the_default_action_but_mail_still_drains() {
    let mailbox = TaskMailbox::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let resolver = counting_resolver(counter.clone());
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_marker = ran.clone();
    let action = move || {
        ran_marker.fetch_add(1, Ordering::SeqCst);
        Ok(DefaultActionOutcome::MoreWork)
    };

    mailbox.enqueue(int_mail("count", 1)).unwrap();

    let mut processor = MailboxProcessor::new(
        mailbox.clone(),
        resolver,
        PauseController::new(),
        SyncSavepointGate::new(),
        action,
    );

    processor.suspend();
    assert!(processor.run_step().await.unwrap(), "the queued mail still runs");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(ran.load(Ordering::SeqCst), 0, "suspend() must stop the default action from ever running");

    mailbox.close();
    assert!(!processor.run_step().await.unwrap());
    assert!(processor.all_actions_completed());
}

#[tokio::test]
async fn pause_blocks_the_default_action_until_resumed() {
    let mailbox = TaskMailbox::new();
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_marker = ran.clone();
    let action = move || {
        ran_marker.fetch_add(1, Ordering::SeqCst);
        Ok(DefaultActionOutcome::Finished)
    };
    let pause = PauseController::new();
    pause.pause();
    let mut processor = MailboxProcessor::new(
        mailbox,
        MailResolver::new(),
        pause.clone(),
        SyncSavepointGate::new(),
        action,
    );

    let step = tokio::spawn(async move {
        let mut processor = processor;
        processor.run_step().await.unwrap();
        processor
    });

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    pause.resume();
    let _processor = step.await.unwrap();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn prepare_close_then_close_then_drain() {
    let mailbox = TaskMailbox::new();
    mailbox.enqueue(int_mail("count", 1)).unwrap();
    let processor = MailboxProcessor::new(
        mailbox.clone(),
        MailResolver::new(),
        PauseController::new(),
        SyncSavepointGate::new(),
        finished_action(),
    );

    processor.prepare_close();
    assert_eq!(mailbox.state(), fluxtask_core::MailboxState::Quiesced);
    assert!(mailbox.enqueue(int_mail("count", 2)).is_err());

    processor.close();
    assert_eq!(mailbox.state(), fluxtask_core::MailboxState::Closed);

    let drained = processor.drain();
    assert_eq!(drained.len(), 1);
    assert!(mailbox.is_empty());
}
