//! Pure transition functions over the ordered task collection.
//!
//! Every operation returns a new [`TaskList`]; nothing mutates in
//! place. The caller (the net driver) is responsible for keeping the
//! returned list as the current state and notifying observers.

use taskdeck_proto::task::{ReorderItem, Task, TaskId};

use super::TaskError;

/// The in-memory ordered task collection.
///
/// Invariants: no two tasks share an id; iteration order is the
/// display order (`position` ascending, positions need not be
/// contiguous).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Builds a collection from a server snapshot, keeping the
    /// server-provided order.
    #[must_use]
    pub fn from_snapshot(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in display order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Looks up a task by id.
    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: TaskId) -> bool {
        self.get(id).is_some()
    }

    /// Ids in display order.
    #[must_use]
    pub fn ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|t| t.id).collect()
    }

    /// `{id, position}` pairs for the current order, suitable for a
    /// reorder persistence request.
    #[must_use]
    pub fn position_items(&self) -> Vec<ReorderItem> {
        self.tasks
            .iter()
            .map(|t| ReorderItem {
                id: t.id,
                position: t.position,
            })
            .collect()
    }

    /// Replaces the entire collection with a fetched snapshot.
    #[must_use]
    pub fn apply_snapshot(&self, tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    /// Inserts `task` if its id is not already present; duplicate
    /// creates are idempotent no-ops. The task lands at the slot its
    /// `position` dictates, or at the end when its position is not
    /// smaller than any existing one.
    #[must_use]
    pub fn apply_create(&self, task: Task) -> Self {
        if self.contains(task.id) {
            return self.clone();
        }
        let mut tasks = self.tasks.clone();
        let slot = tasks
            .iter()
            .position(|t| t.position > task.position)
            .unwrap_or(tasks.len());
        tasks.insert(slot, task);
        Self { tasks }
    }

    /// Replaces the task with a matching id in place, preserving its
    /// slot in the sequence. No-op if the id is absent (it may have
    /// been deleted locally first).
    #[must_use]
    pub fn apply_update(&self, task: Task) -> Self {
        let mut tasks = self.tasks.clone();
        if let Some(existing) = tasks.iter_mut().find(|t| t.id == task.id) {
            *existing = task;
        }
        Self { tasks }
    }

    /// Removes the task with a matching id. No-op if absent.
    #[must_use]
    pub fn apply_delete(&self, id: TaskId) -> Self {
        let tasks = self
            .tasks
            .iter()
            .filter(|t| t.id != id)
            .cloned()
            .collect();
        Self { tasks }
    }

    /// Re-sequences the collection so iteration order matches
    /// `ordered_ids` and reassigns each task's `position` to its new
    /// 0-based index.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidReorder`] if `ordered_ids` is not a
    /// permutation of the current ids (size mismatch, unknown id, or
    /// duplicate). The input collection is left untouched on error.
    pub fn apply_reorder(&self, ordered_ids: &[TaskId]) -> Result<Self, TaskError> {
        if ordered_ids.len() != self.tasks.len() {
            return Err(TaskError::InvalidReorder(format!(
                "expected {} ids, got {}",
                self.tasks.len(),
                ordered_ids.len()
            )));
        }
        let mut tasks = Vec::with_capacity(ordered_ids.len());
        for (index, id) in ordered_ids.iter().enumerate() {
            let Some(task) = self.get(*id) else {
                return Err(TaskError::InvalidReorder(format!("unknown task id {id}")));
            };
            if tasks.iter().any(|t: &Task| t.id == *id) {
                return Err(TaskError::InvalidReorder(format!("duplicate task id {id}")));
            }
            let mut task = task.clone();
            task.position = u32::try_from(index).unwrap_or(u32::MAX);
            tasks.push(task);
        }
        Ok(Self { tasks })
    }
}
