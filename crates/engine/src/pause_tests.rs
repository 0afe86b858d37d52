// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn wait_resolves_immediately_when_not_paused() {
    let ctl = PauseController::new();
    tokio::time::timeout(std::time::Duration::from_millis(50), ctl.wait_until_resumed())
        .await
        .unwrap();
}

#[tokio::test]
async fn resume_unblocks_a_waiting_default_action() {
    let ctl = PauseController::new();
    ctl.pause();
    assert!(ctl.is_paused());

    let waiter = ctl.clone();
    let handle = tokio::spawn(async move { waiter.wait_until_resumed().await });
    tokio::task::yield_now().await;
    ctl.resume();

    tokio::time::timeout(std::time::Duration::from_secs(1), handle).await.unwrap().unwrap();
    assert!(!ctl.is_paused());
}

#[tokio::test]
async fn pause_after_resume_blocks_again() {
    let ctl = PauseController::new();
    ctl.pause();
    ctl.resume();
    ctl.pause();
    assert!(ctl.is_paused());
}
