//! Wire types shared by the TaskDeck client and the dev server.
//!
//! Everything here is plain JSON over the REST and WebSocket surfaces:
//! the task model, the live-event variants pushed by the server, and
//! the filter criteria the list endpoint understands.

pub mod event;
pub mod filter;
pub mod task;

pub use event::LiveEvent;
pub use filter::{FilterCriteria, StatusFilter};
pub use task::{
    MAX_TASK_TITLE_LENGTH, Priority, ReorderItem, ReorderRequest, Task, TaskDraft, TaskId,
    TaskPatch, UserId,
};
