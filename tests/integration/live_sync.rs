//! End-to-end live synchronization between two clients.
//!
//! Spins up the in-process task service, connects two full client
//! stacks through `spawn_net`, and verifies that one user's mutations
//! reach the other as reconciled snapshots and notices while the
//! originator never sees a duplicate from its own echo.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use taskdeck::net::{self, NetCommand, NetConfig, NetEvent};
use taskdeck::tasks::Notice;
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

/// Connects a full client stack for the given user.
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

/// Waits for the first snapshot satisfying the predicate, discarding
/// other events along the way.
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

/// Waits for the next notice, discarding other events along the way.
async fn wait_for_notice(rx: &mut mpsc::Receiver<NetEvent>) -> Notice {
    tokio::time::timeout(WAIT, async {
        loop {
            if let NetEvent::Notice(notice) = rx.recv().await.expect("event channel closed") {
                return notice;
            }
        }
    })
    .await
    .expect("timed out waiting for notice")
}

#[tokio::test]
async fn remote_create_reaches_other_client_with_notice() {
    let (addr, _state) = start_service().await;
    let (alice_tx, mut alice_rx) = connect_client(addr, 1).await;
    let (_bob_tx, mut bob_rx) = connect_client(addr, 2).await;

    alice_tx
        .send(NetCommand::CreateTask(TaskDraft::titled("shared item")))
        .await
        .unwrap();

    // Alice sees her own task via the REST response.
    let alice_view = wait_for_snapshot(&mut alice_rx, |t| t.len() == 1).await;
    assert_eq!(alice_view[0].title, "shared item");

    // Bob sees it via the live event, with a notice.
    let bob_view = wait_for_snapshot(&mut bob_rx, |t| t.len() == 1).await;
    assert_eq!(bob_view[0].title, "shared item");
    let notice = wait_for_notice(&mut bob_rx).await;
    assert_eq!(
        notice,
        Notice::TaskAdded {
            title: "shared item".to_string()
        }
    );
}

#[tokio::test]
async fn own_echo_never_duplicates_the_task() {
    let (addr, _state) = start_service().await;
    let (alice_tx, mut alice_rx) = connect_client(addr, 1).await;

    alice_tx
        .send(NetCommand::CreateTask(TaskDraft::titled("only once")))
        .await
        .unwrap();
    wait_for_snapshot(&mut alice_rx, |t| t.len() == 1).await;

    // Give the echoed live event time to arrive, then confirm the
    // collection still holds a single copy.
    tokio::time::sleep(Duration::from_millis(300)).await;
    alice_tx.send(NetCommand::Refresh).await.unwrap();
    let view = wait_for_snapshot(&mut alice_rx, |t| !t.is_empty()).await;
    assert_eq!(view.len(), 1);
}

#[tokio::test]
async fn remote_delete_removes_task_everywhere() {
    let (addr, _state) = start_service().await;
    let (alice_tx, mut alice_rx) = connect_client(addr, 1).await;
    let (bob_tx, mut bob_rx) = connect_client(addr, 2).await;

    alice_tx
        .send(NetCommand::CreateTask(TaskDraft::titled("doomed")))
        .await
        .unwrap();
    let alice_view = wait_for_snapshot(&mut alice_rx, |t| t.len() == 1).await;
    wait_for_snapshot(&mut bob_rx, |t| t.len() == 1).await;

    // Bob deletes; Alice sees the removal plus a notice.
    bob_tx
        .send(NetCommand::DeleteTask(alice_view[0].id))
        .await
        .unwrap();
    wait_for_snapshot(&mut alice_rx, <[Task]>::is_empty).await;
    let notice = wait_for_notice(&mut alice_rx).await;
    assert_eq!(
        notice,
        Notice::TaskDeleted {
            id: alice_view[0].id
        }
    );
}

#[tokio::test]
async fn remote_update_overwrites_local_copy() {
    let (addr, _state) = start_service().await;
    let (alice_tx, mut alice_rx) = connect_client(addr, 1).await;
    let (bob_tx, mut bob_rx) = connect_client(addr, 2).await;

    alice_tx
        .send(NetCommand::CreateTask(TaskDraft::titled("draft")))
        .await
        .unwrap();
    let created = wait_for_snapshot(&mut bob_rx, |t| t.len() == 1).await;

    bob_tx
        .send(NetCommand::ToggleComplete { id: created[0].id })
        .await
        .unwrap();
    let alice_view = wait_for_snapshot(&mut alice_rx, |t| {
        t.first().is_some_and(|task| task.completed)
    })
    .await;
    assert!(alice_view[0].completed);
}

#[tokio::test]
async fn empty_title_is_rejected_before_the_network() {
    let (addr, state) = start_service().await;
    let (tx, mut rx) = connect_client(addr, 1).await;

    tx.send(NetCommand::CreateTask(TaskDraft::titled("")))
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
    assert!(error.contains("title"), "got: {error}");

    // Nothing reached the server.
    assert!(
        state
            .snapshot(&taskdeck_proto::filter::FilterCriteria::default())
            .await
            .is_empty()
    );
}
