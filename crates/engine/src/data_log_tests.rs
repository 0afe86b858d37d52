// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fluxtask_storage::{AsyncLogWriterConfig, MemoryLogStorage};
use std::time::Duration;

fn fast_config() -> AsyncLogWriterConfig {
    AsyncLogWriterConfig { batch_size: 1, flush_interval: Duration::from_millis(10), print_level: 1 }
}

#[test]
fn live_emit_logs_and_passes_through_payload() {
    let storage = MemoryLogStorage::new();
    let appender = storage.open_append_or_create("data").unwrap();
    let writer = Arc::new(AsyncLogWriter::spawn(appender, fast_config()).unwrap());
    let manager = DataLogManager::live(writer, Arc::new(StepAllocator::new()));

    let (step, payload) = manager.emit(7, vec![1, 2, 3]).unwrap();
    assert_eq!(payload, vec![1, 2, 3]);
    assert_eq!(step, StepNumber::new(0));
    assert!(!manager.is_recovering());
}

#[test]
fn recovering_emit_replaces_live_output_with_logged_bytes() {
    let storage = MemoryLogStorage::new();
    let appender = storage.open_append_or_create("data").unwrap();
    let writer = Arc::new(AsyncLogWriter::spawn(appender, fast_config()).unwrap());
    let allocator = Arc::new(StepAllocator::new());
    {
        let manager = DataLogManager::live(writer.clone(), allocator.clone());
        manager.emit(7, b"first".to_vec()).unwrap();
        manager.emit(7, b"second".to_vec()).unwrap();
    }
    std::thread::sleep(Duration::from_millis(50));

    let manager = DataLogManager::recovering(writer, allocator, &storage, "data").unwrap();
    assert!(manager.is_recovering());

    let (_, out1) = manager.emit(7, b"garbage-from-reexecution".to_vec()).unwrap();
    let (_, out2) = manager.emit(7, b"more-garbage".to_vec()).unwrap();
    assert_eq!(out1, b"first".to_vec());
    assert_eq!(out2, b"second".to_vec());
}
