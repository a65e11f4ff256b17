//! Live-event wire format for the task push channel.
//!
//! The server broadcasts one JSON text frame per task mutation:
//! `{"event": "task_created"|"task_updated"|"task_deleted",
//!   "user_id": <id>, "task": {...}?, "task_id": <id>?}`.
//! `task` is present for created/updated, `task_id` for deleted.

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId, UserId};

/// A server-pushed notification of a task mutation.
///
/// `user_id` identifies the originating user; the client suppresses
/// events echoing its own actions. Unknown `event` tags fail to decode
/// and are treated as soft parse errors at the channel boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LiveEvent {
    /// A task was created.
    #[serde(rename = "task_created")]
    Created { user_id: UserId, task: Task },
    /// A task was updated.
    #[serde(rename = "task_updated")]
    Updated { user_id: UserId, task: Task },
    /// A task was deleted.
    #[serde(rename = "task_deleted")]
    Deleted { user_id: UserId, task_id: TaskId },
}

impl LiveEvent {
    /// The user whose action produced this event.
    #[must_use]
    pub const fn origin(&self) -> UserId {
        match self {
            Self::Created { user_id, .. }
            | Self::Updated { user_id, .. }
            | Self::Deleted { user_id, .. } => *user_id,
        }
    }
}

/// Encodes a [`LiveEvent`] as a JSON text frame body.
///
/// # Errors
///
/// Returns an error string if serialization fails.
pub fn encode(event: &LiveEvent) -> Result<String, String> {
    serde_json::to_string(event).map_err(|e| format!("event encode error: {e}"))
}

/// Decodes a JSON text frame body into a [`LiveEvent`].
///
/// # Errors
///
/// Returns an error string for malformed JSON or unknown event tags.
pub fn decode(text: &str) -> Result<LiveEvent, String> {
    serde_json::from_str(text).map_err(|e| format!("event decode error: {e}"))
}
