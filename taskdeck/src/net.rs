//! Net coordinator: the single driver task that owns the task
//! collection and everything that mutates it.
//!
//! The UI talks to the coordinator over a command channel and observes
//! it over an event channel; it never touches the collection directly.
//! The driver serializes all mutation sources — user commands, inbound
//! live events, and completed REST calls — so the store's pure
//! transitions are applied one at a time and every observer sees a
//! consistent sequence of snapshots.
//!
//! REST calls are spawned as subtasks that report back through an
//! internal completion channel, keeping the driver responsive to live
//! events while a request is in flight.

use tokio::sync::mpsc;

use taskdeck_proto::event::LiveEvent;
use taskdeck_proto::filter::FilterCriteria;
use taskdeck_proto::task::{Task, TaskDraft, TaskId, TaskPatch, UserId};

use crate::api::{ApiClient, ApiError};
use crate::socket::{ChannelError, ConnState, LiveChannel};
use crate::tasks::{self, FetchGate, Notice, TaskList, reconcile};

/// Capacity of the command and event channels.
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Everything needed to stand up a session's network side.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// REST base URL, e.g. `http://127.0.0.1:8000`.
    pub base_url: String,
    /// Live-event endpoint, e.g. `ws://127.0.0.1:8000/ws/tasks`.
    pub socket_url: String,
    /// Session bearer token.
    pub token: String,
    /// The local user, for self-origin suppression.
    pub user_id: UserId,
    /// Command/event channel capacity.
    pub channel_capacity: usize,
}

impl NetConfig {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        socket_url: impl Into<String>,
        token: impl Into<String>,
        user_id: UserId,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            socket_url: socket_url.into(),
            token: token.into(),
            user_id,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Errors standing up the coordinator.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Requests from the UI to the coordinator.
#[derive(Debug, Clone)]
pub enum NetCommand {
    /// Create a task from the draft.
    CreateTask(TaskDraft),
    /// Apply a partial update to a task.
    UpdateTask { id: TaskId, patch: TaskPatch },
    /// Flip a task's completion flag.
    ToggleComplete { id: TaskId },
    /// Delete a task.
    DeleteTask(TaskId),
    /// Drag the displayed task at `source` to `dest`.
    Move { source: usize, dest: usize },
    /// Switch to a new filter and fetch the matching snapshot.
    Filter(FilterCriteria),
    /// Drop all criteria and fetch the full collection.
    ClearFilter,
    /// Re-fetch under the current criteria.
    Refresh,
    /// Close the live channel and stop the driver.
    Shutdown,
}

/// Observations the coordinator emits for the UI.
#[derive(Debug, Clone)]
pub enum NetEvent {
    /// The collection changed; this is the full new display order.
    Snapshot(Vec<Task>),
    /// A remote user's change was applied.
    Notice(Notice),
    /// Live-channel connectivity changed.
    ConnectionStatus(ConnState),
    /// A command failed; the collection kept (or reverted to) its
    /// prior state.
    Error(String),
}

/// Completions of spawned REST calls, merged back into the driver.
enum ApiOutcome {
    Fetched {
        seq: u64,
        result: Result<Vec<Task>, ApiError>,
    },
    Created(Result<Task, ApiError>),
    Updated(Result<Task, ApiError>),
    Deleted {
        id: TaskId,
        result: Result<(), ApiError>,
    },
    Reordered {
        previous: TaskList,
        result: Result<(), ApiError>,
    },
}

/// Connects the REST client and the live channel, performs the initial
/// fetch, and spawns the driver task.
///
/// Returns the command sender and event receiver the UI holds for the
/// session. Dropping the sender (or sending [`NetCommand::Shutdown`])
/// stops the driver and tears down the live channel.
///
/// # Errors
///
/// Returns [`NetError`] if the REST client cannot be built or the
/// live channel fails to connect.
pub async fn spawn_net(
    config: NetConfig,
) -> Result<(mpsc::Sender<NetCommand>, mpsc::Receiver<NetEvent>), NetError> {
    let api = ApiClient::new(&config.base_url, &config.token)?;
    let channel = LiveChannel::connect(&config.socket_url, &config.token).await?;

    let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity);
    let (evt_tx, evt_rx) = mpsc::channel(config.channel_capacity);
    let (outcome_tx, outcome_rx) = mpsc::channel(config.channel_capacity);

    let driver = Driver {
        core: Core {
            api,
            local_user: config.user_id,
            list: TaskList::new(),
            gate: FetchGate::new(),
            criteria: FilterCriteria::default(),
            evt_tx,
            outcome_tx,
        },
        channel,
        cmd_rx,
        outcome_rx,
    };
    tokio::spawn(driver.run());

    Ok((cmd_tx, evt_rx))
}

struct Driver {
    core: Core,
    channel: LiveChannel,
    cmd_rx: mpsc::Receiver<NetCommand>,
    outcome_rx: mpsc::Receiver<ApiOutcome>,
}

/// The driver's owned state, separated from the receivers so the
/// select loop can borrow each independently.
struct Core {
    api: ApiClient,
    local_user: UserId,
    list: TaskList,
    gate: FetchGate,
    criteria: FilterCriteria,
    evt_tx: mpsc::Sender<NetEvent>,
    outcome_tx: mpsc::Sender<ApiOutcome>,
}

impl Driver {
    async fn run(self) {
        let Self {
            mut core,
            mut channel,
            mut cmd_rx,
            mut outcome_rx,
        } = self;

        let mut state_rx = channel.state_changes();
        let initial_state = *state_rx.borrow_and_update();
        core.emit(NetEvent::ConnectionStatus(initial_state)).await;
        core.spawn_fetch();

        let mut live_open = true;
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(NetCommand::Shutdown) | None => break,
                        Some(cmd) => core.handle_command(cmd).await,
                    }
                }
                event = channel.next_event(), if live_open => {
                    match event {
                        Some(event) => core.handle_live_event(event).await,
                        None => live_open = false,
                    }
                }
                changed = state_rx.changed() => {
                    if changed.is_ok() {
                        let state = *state_rx.borrow_and_update();
                        core.emit(NetEvent::ConnectionStatus(state)).await;
                    }
                }
                outcome = outcome_rx.recv() => {
                    if let Some(outcome) = outcome {
                        core.handle_outcome(outcome).await;
                    }
                }
            }
        }

        channel.close().await;
        let _ = core
            .evt_tx
            .send(NetEvent::ConnectionStatus(ConnState::Disconnected))
            .await;
        tracing::info!("net driver exiting");
    }
}

impl Core {
    async fn emit(&self, event: NetEvent) {
        if self.evt_tx.send(event).await.is_err() {
            tracing::debug!("event receiver dropped");
        }
    }

    async fn emit_snapshot(&self) {
        self.emit(NetEvent::Snapshot(self.list.tasks().to_vec()))
            .await;
    }

    async fn handle_command(&mut self, cmd: NetCommand) {
        match cmd {
            NetCommand::CreateTask(draft) => {
                if let Err(e) = tasks::validate_title(&draft.title) {
                    self.emit(NetEvent::Error(e.to_string())).await;
                    return;
                }
                let api = self.api.clone();
                let tx = self.outcome_tx.clone();
                tokio::spawn(async move {
                    let result = api.create(&draft).await;
                    let _ = tx.send(ApiOutcome::Created(result)).await;
                });
            }
            NetCommand::UpdateTask { id, patch } => {
                if let Some(title) = &patch.title
                    && let Err(e) = tasks::validate_title(title)
                {
                    self.emit(NetEvent::Error(e.to_string())).await;
                    return;
                }
                self.spawn_update(id, patch);
            }
            NetCommand::ToggleComplete { id } => {
                let Some(task) = self.list.get(id) else {
                    self.emit(NetEvent::Error(format!("no task with id {id}")))
                        .await;
                    return;
                };
                self.spawn_update(id, TaskPatch::completion(!task.completed));
            }
            NetCommand::DeleteTask(id) => {
                let api = self.api.clone();
                let tx = self.outcome_tx.clone();
                tokio::spawn(async move {
                    let result = api.delete(id).await;
                    let _ = tx.send(ApiOutcome::Deleted { id, result }).await;
                });
            }
            NetCommand::Move { source, dest } => self.handle_move(source, dest).await,
            NetCommand::Filter(criteria) => {
                self.criteria = criteria;
                self.spawn_fetch();
            }
            NetCommand::ClearFilter => {
                self.criteria = FilterCriteria::default();
                self.spawn_fetch();
            }
            NetCommand::Refresh => self.spawn_fetch(),
            NetCommand::Shutdown => {}
        }
    }

    fn spawn_update(&self, id: TaskId, patch: TaskPatch) {
        let api = self.api.clone();
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = api.update(id, &patch).await;
            let _ = tx.send(ApiOutcome::Updated(result)).await;
        });
    }

    /// Issues a sequence-numbered snapshot fetch under the current
    /// criteria. A response is only applied if no newer fetch has been
    /// issued by the time it lands.
    fn spawn_fetch(&mut self) {
        let seq = self.gate.issue();
        let api = self.api.clone();
        let criteria = self.criteria.clone();
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = api.list(&criteria).await;
            let _ = tx.send(ApiOutcome::Fetched { seq, result }).await;
        });
    }

    /// Optimistic drag commit: apply the permutation locally, show it,
    /// then persist. The pre-drag collection travels with the request
    /// so a failure can revert.
    ///
    /// Drag indices address the published snapshot — exactly what the
    /// observer displays. After a filter fetch that is the matching
    /// subset, plus any tasks live events delivered since; the filter
    /// must not be re-applied here or the two index spaces drift.
    async fn handle_move(&mut self, source: usize, dest: usize) {
        let visible_ids = self.list.ids();

        let plan = match tasks::plan_move(&self.list, &visible_ids, source, dest) {
            Ok(plan) => plan,
            Err(e) => {
                self.emit(NetEvent::Error(e.to_string())).await;
                return;
            }
        };

        let previous = self.list.clone();
        match self.list.apply_reorder(&plan.ordered_ids) {
            Ok(next) => self.list = next,
            Err(e) => {
                self.emit(NetEvent::Error(e.to_string())).await;
                return;
            }
        }
        self.emit_snapshot().await;
        // A fetch issued before the drag must not land on top of the
        // new order; burn a sequence number so anything in flight is
        // discarded.
        self.gate.issue();

        let api = self.api.clone();
        let tx = self.outcome_tx.clone();
        let items = plan.items;
        tokio::spawn(async move {
            let result = api.reorder(items).await;
            let _ = tx.send(ApiOutcome::Reordered { previous, result }).await;
        });
    }

    async fn handle_live_event(&mut self, event: LiveEvent) {
        let (next, notice) = reconcile(&self.list, event, self.local_user);
        if next != self.list {
            self.list = next;
            self.emit_snapshot().await;
        }
        if let Some(notice) = notice {
            self.emit(NetEvent::Notice(notice)).await;
        }
    }

    async fn handle_outcome(&mut self, outcome: ApiOutcome) {
        match outcome {
            ApiOutcome::Fetched { seq, result } => {
                if !self.gate.admits(seq) {
                    tracing::debug!(seq, "discarding superseded snapshot");
                    return;
                }
                match result {
                    Ok(snapshot) => {
                        self.list = self.list.apply_snapshot(snapshot);
                        self.emit_snapshot().await;
                    }
                    Err(e) => self.emit(NetEvent::Error(e.to_string())).await,
                }
            }
            ApiOutcome::Created(result) => match result {
                Ok(task) => {
                    self.list = self.list.apply_create(task);
                    self.emit_snapshot().await;
                }
                Err(e) => self.emit(NetEvent::Error(e.to_string())).await,
            },
            ApiOutcome::Updated(result) => match result {
                Ok(task) => {
                    self.list = self.list.apply_update(task);
                    self.emit_snapshot().await;
                }
                Err(e) => self.emit(NetEvent::Error(e.to_string())).await,
            },
            ApiOutcome::Deleted { id, result } => match result {
                Ok(()) => {
                    self.list = self.list.apply_delete(id);
                    self.emit_snapshot().await;
                }
                Err(e) => self.emit(NetEvent::Error(e.to_string())).await,
            },
            ApiOutcome::Reordered { previous, result } => {
                if let Err(e) = result {
                    tracing::warn!(err = %e, "reorder persistence failed, reverting");
                    self.list = previous;
                    self.emit_snapshot().await;
                    self.emit(NetEvent::Error(format!("reorder failed: {e}")))
                        .await;
                }
            }
        }
    }
}
