// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn firing_a_timer_posts_a_mail_carrying_its_id() {
    let mailbox = TaskMailbox::new();
    let service = TimerService::new(mailbox.clone());
    let id = service.register("watermark-check");

    service.fire(id).unwrap();

    let mail = mailbox.try_take().unwrap();
    assert_eq!(mail.name, TIMER_FIRED_MAIL);
    assert_eq!(mail.args, vec![MailArg::U64(id.get())]);
}

#[test]
fn same_key_registered_twice_keeps_the_same_id() {
    let mailbox = TaskMailbox::new();
    let service = TimerService::new(mailbox);
    let a = service.register("node-1");
    let b = service.register("node-1");
    assert_eq!(a, b);
    assert_eq!(service.key_for(a).as_deref(), Some("node-1"));
}

#[tokio::test(start_paused = true)]
async fn recurring_timer_fires_repeatedly_until_dropped() {
    let mailbox = TaskMailbox::new();
    let service = Arc::new(TimerService::new(mailbox.clone()));
    let handle = service.spawn_recurring("control-delay", Duration::from_millis(10));

    tokio::time::advance(Duration::from_millis(35)).await;
    tokio::task::yield_now().await;

    let mut fired = 0;
    while mailbox.try_take().is_some() {
        fired += 1;
    }
    assert!(fired >= 2, "expected at least two control-delay mails, got {fired}");

    drop(handle);
}
