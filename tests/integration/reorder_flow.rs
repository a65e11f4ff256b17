//! Optimistic drag-reorder against the in-process task service.
//!
//! Covers the success path (local order applied immediately, then
//! persisted) and the failure path (persistence rejected, collection
//! reverts to the pre-drag order and an error surfaces).

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use taskdeck::net::{self, NetCommand, NetConfig, NetEvent};
use taskdeck_proto::filter::{FilterCriteria, StatusFilter};
use taskdeck_proto::task::{Task, TaskDraft, UserId};
use taskdeck_server::server::start_server_with_state;
use taskdeck_server::state::ServerState;

const WAIT: Duration = Duration::from_secs(10);

async fn start_service() -> (std::net::SocketAddr, Arc<ServerState>) {
    let state = Arc::new(ServerState::new());
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start task service");
    (addr, state)
}

async fn connect_client(
    addr: std::net::SocketAddr,
    user_id: u64,
) -> (mpsc::Sender<NetCommand>, mpsc::Receiver<NetEvent>) {
    let config = NetConfig::new(
        format!("http://{addr}"),
        format!("ws://{addr}/ws/tasks"),
        user_id.to_string(),
        UserId(user_id),
    );
    net::spawn_net(config).await.expect("client failed to connect")
}

async fn wait_for_snapshot(
    rx: &mut mpsc::Receiver<NetEvent>,
    pred: impl Fn(&[Task]) -> bool,
) -> Vec<Task> {
    tokio::time::timeout(WAIT, async {
        loop {
            match rx.recv().await.expect("event channel closed") {
                NetEvent::Snapshot(tasks) if pred(&tasks) => return tasks,
                _ => {}
            }
        }
    })
    .await
    .expect("timed out waiting for snapshot")
}

fn titles(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.title.as_str()).collect()
}

/// Seeds three tasks and waits until the client's view holds them all.
async fn seed_three(
    tx: &mpsc::Sender<NetCommand>,
    rx: &mut mpsc::Receiver<NetEvent>,
) -> Vec<Task> {
    for title in ["first", "second", "third"] {
        tx.send(NetCommand::CreateTask(TaskDraft::titled(title)))
            .await
            .unwrap();
    }
    wait_for_snapshot(rx, |t| t.len() == 3).await
}

#[tokio::test]
async fn drag_applies_immediately_and_persists() {
    let (addr, _state) = start_service().await;
    let (tx, mut rx) = connect_client(addr, 1).await;
    seed_three(&tx, &mut rx).await;

    // Drag the first task to the end.
    tx.send(NetCommand::Move { source: 0, dest: 2 })
        .await
        .unwrap();
    let optimistic =
        wait_for_snapshot(&mut rx, |t| t.first().is_some_and(|f| f.title == "second")).await;
    assert_eq!(titles(&optimistic), vec!["second", "third", "first"]);
    // Positions are contiguous from zero in the new order.
    let positions: Vec<u32> = optimistic.iter().map(|t| t.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);

    // A fresh fetch returns the same order, proving it persisted.
    tokio::time::sleep(Duration::from_millis(300)).await;
    tx.send(NetCommand::Refresh).await.unwrap();
    let fetched =
        wait_for_snapshot(&mut rx, |t| t.first().is_some_and(|f| f.title == "second")).await;
    assert_eq!(titles(&fetched), vec!["second", "third", "first"]);
}

#[tokio::test]
async fn failed_persistence_reverts_to_pre_drag_order() {
    let (addr, state) = start_service().await;
    let (tx, mut rx) = connect_client(addr, 1).await;
    seed_three(&tx, &mut rx).await;

    state.fail_next_reorder();
    tx.send(NetCommand::Move { source: 0, dest: 2 })
        .await
        .unwrap();

    // The optimistic order shows first, then the revert and an error.
    wait_for_snapshot(&mut rx, |t| t.first().is_some_and(|f| f.title == "second")).await;
    let mut saw_error = false;
    let reverted = tokio::time::timeout(WAIT, async {
        loop {
            match rx.recv().await.expect("event channel closed") {
                NetEvent::Snapshot(tasks)
                    if tasks.first().is_some_and(|f| f.title == "first") =>
                {
                    return tasks;
                }
                NetEvent::Error(msg) => {
                    assert!(msg.contains("reorder"), "got: {msg}");
                    saw_error = true;
                }
                _ => {}
            }
        }
    })
    .await
    .expect("timed out waiting for revert");
    assert_eq!(titles(&reverted), vec!["first", "second", "third"]);
    assert!(saw_error);

    // The server never applied the rejected order.
    let server_view = state.snapshot(&FilterCriteria::default()).await;
    assert_eq!(titles(&server_view), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn out_of_bounds_drag_is_an_error_and_changes_nothing() {
    let (addr, _state) = start_service().await;
    let (tx, mut rx) = connect_client(addr, 1).await;
    seed_three(&tx, &mut rx).await;

    tx.send(NetCommand::Move { source: 9, dest: 0 })
        .await
        .unwrap();
    let error = tokio::time::timeout(WAIT, async {
        loop {
            if let NetEvent::Error(msg) = rx.recv().await.expect("event channel closed") {
                return msg;
            }
        }
    })
    .await
    .expect("timed out waiting for error");
    assert!(error.contains("out of bounds"), "got: {error}");

    tx.send(NetCommand::Refresh).await.unwrap();
    let view = wait_for_snapshot(&mut rx, |t| t.len() == 3).await;
    assert_eq!(titles(&view), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn drag_indices_follow_the_displayed_snapshot_under_a_filter() {
    let (addr, state) = start_service().await;
    let (alice_tx, mut alice_rx) = connect_client(addr, 1).await;
    let (bob_tx, mut bob_rx) = connect_client(addr, 2).await;
    seed_three(&alice_tx, &mut alice_rx).await;
    let bob_view = wait_for_snapshot(&mut bob_rx, |t| t.len() == 3).await;

    // Alice narrows to incomplete tasks; all three still match.
    alice_tx
        .send(NetCommand::Filter(FilterCriteria {
            status: Some(StatusFilter::Incomplete),
            ..FilterCriteria::default()
        }))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Bob completes the first task. The event lands in Alice's
    // collection even though her filter now excludes it, so her
    // display still shows all three.
    bob_tx
        .send(NetCommand::ToggleComplete { id: bob_view[0].id })
        .await
        .unwrap();
    wait_for_snapshot(&mut alice_rx, |t| t.first().is_some_and(|f| f.completed)).await;

    // Index 2 is "third" in the displayed list; the drag must move
    // exactly that task.
    alice_tx
        .send(NetCommand::Move { source: 2, dest: 0 })
        .await
        .unwrap();
    let moved = wait_for_snapshot(&mut alice_rx, |t| {
        t.first().is_some_and(|f| f.title == "third")
    })
    .await;
    assert_eq!(titles(&moved), vec!["third", "first", "second"]);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let server_view = state.snapshot(&FilterCriteria::default()).await;
    assert_eq!(titles(&server_view), vec!["third", "first", "second"]);
}

#[tokio::test]
async fn refresh_racing_a_drag_cannot_roll_back_the_order() {
    let (addr, _state) = start_service().await;
    let (tx, mut rx) = connect_client(addr, 1).await;
    seed_three(&tx, &mut rx).await;

    // The refresh is still in flight when the drag applies; its
    // response must not resurrect the pre-drag order.
    tx.send(NetCommand::Refresh).await.unwrap();
    tx.send(NetCommand::Move { source: 0, dest: 2 })
        .await
        .unwrap();
    let optimistic =
        wait_for_snapshot(&mut rx, |t| t.first().is_some_and(|f| f.title == "second")).await;
    assert_eq!(titles(&optimistic), vec!["second", "third", "first"]);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let mut latest = optimistic;
    while let Ok(event) = rx.try_recv() {
        if let NetEvent::Snapshot(tasks) = event {
            latest = tasks;
        }
    }
    assert_eq!(titles(&latest), vec!["second", "third", "first"]);
}
