//! In-memory task table and live-event broadcast.
//!
//! The table is the single source of truth: ids are assigned here,
//! positions are assigned on create and rewritten on reorder, and the
//! snapshot is always returned in position order. Every mutation is
//! broadcast as an encoded live event to all connected WebSocket
//! clients, tagged with the originating user.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{RwLock, broadcast};

use taskdeck_proto::event::{self, LiveEvent};
use taskdeck_proto::filter::FilterCriteria;
use taskdeck_proto::task::{
    MAX_TASK_TITLE_LENGTH, ReorderItem, Task, TaskDraft, TaskId, TaskPatch, UserId,
};

/// Capacity of the live-event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Errors from table mutations, mapped to HTTP statuses by the handlers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StateError {
    #[error("task title cannot be empty")]
    TitleEmpty,
    #[error("task title too long (max {MAX_TASK_TITLE_LENGTH} characters)")]
    TitleTooLong,
    #[error("unknown task id {0}")]
    UnknownTask(TaskId),
    #[error("reorder rejected")]
    ReorderRejected,
}

/// Shared server state: the task table plus the event fan-out.
pub struct ServerState {
    tasks: RwLock<TaskTable>,
    events: broadcast::Sender<String>,
    /// Test hook: when set, the next reorder request fails once.
    fail_next_reorder: AtomicBool,
}

struct TaskTable {
    tasks: Vec<Task>,
    next_id: u64,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tasks: RwLock::new(TaskTable {
                tasks: Vec::new(),
                next_id: 1,
            }),
            events,
            fail_next_reorder: AtomicBool::new(false),
        }
    }

    /// Subscribes to the encoded live-event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.events.subscribe()
    }

    /// Arms the fault hook: the next reorder request fails once.
    pub fn fail_next_reorder(&self) {
        self.fail_next_reorder.store(true, Ordering::SeqCst);
    }

    /// The current table, filtered and in position order.
    pub async fn snapshot(&self, criteria: &FilterCriteria) -> Vec<Task> {
        let table = self.tasks.read().await;
        table
            .tasks
            .iter()
            .filter(|t| criteria.matches(t))
            .cloned()
            .collect()
    }

    /// Creates a task: assigns the next id and the end position, then
    /// broadcasts `task_created`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] for an invalid title.
    pub async fn create(&self, origin: UserId, draft: TaskDraft) -> Result<Task, StateError> {
        validate_title(&draft.title)?;
        let mut table = self.tasks.write().await;
        let position = table.tasks.iter().map(|t| t.position + 1).max().unwrap_or(0);
        let task = Task {
            id: TaskId(table.next_id),
            title: draft.title,
            description: draft.description,
            category: draft.category,
            due_date: draft.due_date,
            priority: draft.priority,
            completed: false,
            position,
        };
        table.next_id += 1;
        table.tasks.push(task.clone());
        drop(table);

        tracing::info!(id = %task.id, user_id = %origin, "task created");
        self.broadcast(&LiveEvent::Created {
            user_id: origin,
            task: task.clone(),
        });
        Ok(task)
    }

    /// Applies a partial update and broadcasts `task_updated`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnknownTask`] if the id is absent, or a
    /// title error when the patch carries an invalid title.
    pub async fn update(
        &self,
        origin: UserId,
        id: TaskId,
        patch: TaskPatch,
    ) -> Result<Task, StateError> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }
        let mut table = self.tasks.write().await;
        let Some(task) = table.tasks.iter_mut().find(|t| t.id == id) else {
            return Err(StateError::UnknownTask(id));
        };
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = Some(description);
        }
        if let Some(category) = patch.category {
            task.category = Some(category);
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(priority) = patch.priority {
            task.priority = Some(priority);
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }
        let updated = task.clone();
        drop(table);

        tracing::info!(id = %id, user_id = %origin, "task updated");
        self.broadcast(&LiveEvent::Updated {
            user_id: origin,
            task: updated.clone(),
        });
        Ok(updated)
    }

    /// Deletes a task and broadcasts `task_deleted`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnknownTask`] if the id is absent.
    pub async fn delete(&self, origin: UserId, id: TaskId) -> Result<(), StateError> {
        let mut table = self.tasks.write().await;
        let before = table.tasks.len();
        table.tasks.retain(|t| t.id != id);
        if table.tasks.len() == before {
            return Err(StateError::UnknownTask(id));
        }
        drop(table);

        tracing::info!(id = %id, user_id = %origin, "task deleted");
        self.broadcast(&LiveEvent::Deleted {
            user_id: origin,
            task_id: id,
        });
        Ok(())
    }

    /// Rewrites positions from the `{id, position}` list and re-sorts
    /// the table. All ids must exist.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnknownTask`] for an unknown id, or
    /// [`StateError::ReorderRejected`] when the fault hook is armed.
    pub async fn reorder(&self, items: &[ReorderItem]) -> Result<(), StateError> {
        if self.fail_next_reorder.swap(false, Ordering::SeqCst) {
            tracing::warn!("rejecting reorder (fault hook armed)");
            return Err(StateError::ReorderRejected);
        }
        let mut table = self.tasks.write().await;
        for item in items {
            if !table.tasks.iter().any(|t| t.id == item.id) {
                return Err(StateError::UnknownTask(item.id));
            }
        }
        for item in items {
            if let Some(task) = table.tasks.iter_mut().find(|t| t.id == item.id) {
                task.position = item.position;
            }
        }
        table.tasks.sort_by_key(|t| t.position);
        tracing::info!(count = items.len(), "tasks reordered");
        Ok(())
    }

    fn broadcast(&self, live_event: &LiveEvent) {
        match event::encode(live_event) {
            // No receivers is fine; nobody is connected.
            Ok(frame) => drop(self.events.send(frame)),
            Err(e) => tracing::error!(err = %e, "failed to encode live event"),
        }
    }
}

fn validate_title(title: &str) -> Result<(), StateError> {
    if title.is_empty() {
        return Err(StateError::TitleEmpty);
    }
    if title.chars().count() > MAX_TASK_TITLE_LENGTH {
        return Err(StateError::TitleTooLong);
    }
    Ok(())
}
