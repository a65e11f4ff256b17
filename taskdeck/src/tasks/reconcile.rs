//! Reconciliation policy for inbound live events.
//!
//! Decides, for each event delivered by the live channel, whether and
//! how it lands in the local collection. Self-originated events are
//! suppressed: the local optimistic mutation or the REST response
//! already reflects the change, and re-applying could duplicate or
//! reorder. Everything else maps onto the store's pure transitions.
//!
//! Concurrent-edit policy is last writer wins: an Updated event
//! overwrites the in-memory task even while a local edit form still
//! holds stale values.

use taskdeck_proto::event::LiveEvent;
use taskdeck_proto::task::{TaskId, UserId};

use super::store::TaskList;

/// UI-facing notification produced by applying a remote event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A remote user created a task.
    TaskAdded { title: String },
    /// A remote user updated a task.
    TaskUpdated { title: String },
    /// A remote user deleted a task.
    TaskDeleted { id: TaskId },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskAdded { title } => write!(f, "New task added: {title}"),
            Self::TaskUpdated { title } => write!(f, "Task updated: {title}"),
            Self::TaskDeleted { id } => write!(f, "Task deleted: {id}"),
        }
    }
}

/// Applies one live event to the collection under the reconciliation
/// policy, returning the new collection and an optional notice for
/// the UI-facing observer.
///
/// A suppressed (self-originated) event returns the collection
/// unchanged and no notice.
#[must_use]
pub fn reconcile(list: &TaskList, event: LiveEvent, local_user: UserId) -> (TaskList, Option<Notice>) {
    if event.origin() == local_user {
        tracing::debug!(user_id = %local_user, "suppressing self-originated event");
        return (list.clone(), None);
    }

    match event {
        LiveEvent::Created { task, .. } => {
            let notice = Notice::TaskAdded {
                title: task.title.clone(),
            };
            (list.apply_create(task), Some(notice))
        }
        LiveEvent::Updated { task, .. } => {
            let notice = Notice::TaskUpdated {
                title: task.title.clone(),
            };
            (list.apply_update(task), Some(notice))
        }
        LiveEvent::Deleted { task_id, .. } => {
            (list.apply_delete(task_id), Some(Notice::TaskDeleted { id: task_id }))
        }
    }
}
