// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fluxtask_core::test_support::noop_mail;
use fluxtask_core::Priority;
use fluxtask_storage::{AsyncLogWriterConfig, MemoryLogStorage};
use std::time::Duration;

fn fast_config() -> AsyncLogWriterConfig {
    AsyncLogWriterConfig { batch_size: 1, flush_interval: Duration::from_millis(10), print_level: 1 }
}

#[test]
fn logging_assigns_strictly_increasing_steps() {
    let storage = MemoryLogStorage::new();
    let appender = storage.open_append_or_create("sub").unwrap();
    let writer = Arc::new(AsyncLogWriter::spawn(appender, fast_config()).unwrap());
    let mut dp = DpLogManager::fresh(writer, Arc::new(StepAllocator::new()));

    let a = dp.log_enqueue(&noop_mail("a", Priority::Default)).unwrap();
    let b = dp.log_enqueue(&noop_mail("b", Priority::Default)).unwrap();
    assert!(a < b);
}

#[test]
fn replay_reenqueues_mails_in_step_order_and_flips_recovery() {
    let storage = MemoryLogStorage::new();
    let appender = storage.open_append_or_create("sub").unwrap();
    let writer = Arc::new(AsyncLogWriter::spawn(appender, fast_config()).unwrap());
    let allocator = Arc::new(StepAllocator::new());
    let mut dp = DpLogManager::fresh(writer.clone(), allocator.clone());

    dp.log_enqueue(&noop_mail("first", Priority::Default)).unwrap();
    dp.log_enqueue(&noop_mail("second", Priority::Default)).unwrap();
    std::thread::sleep(Duration::from_millis(50));

    let mailbox = TaskMailbox::new();
    let mut recovering = DpLogManager::for_recovery(writer, allocator, StepNumber::new(2));
    assert!(!recovering.recovery_complete());
    recovering.replay(&storage, "sub", &mailbox).unwrap();
    assert!(recovering.recovery_complete());

    assert_eq!(mailbox.try_take().unwrap().name, "first");
    assert_eq!(mailbox.try_take().unwrap().name, "second");
}
