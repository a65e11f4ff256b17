//! The local task collection and the rules that keep it consistent.
//!
//! `store` holds the pure transition functions over the ordered
//! collection; `reconcile` decides what to do with each inbound live
//! event; `reorder` turns a drag gesture into a position assignment;
//! `query` guards snapshot fetches against stale responses.

pub mod query;
pub mod reconcile;
pub mod reorder;
pub mod store;

pub use query::FetchGate;
pub use reconcile::{Notice, reconcile};
pub use reorder::{ReorderPlan, plan_move};
pub use store::TaskList;

use taskdeck_proto::task::MAX_TASK_TITLE_LENGTH;

use thiserror::Error;

/// Errors that can occur during task operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    /// Task title cannot be empty.
    #[error("task title cannot be empty")]
    TitleEmpty,
    /// Task title exceeds the maximum length.
    #[error("task title too long (max {MAX_TASK_TITLE_LENGTH} characters)")]
    TitleTooLong,
    /// Reorder id list is not a permutation of the collection.
    #[error("invalid reorder: {0}")]
    InvalidReorder(String),
    /// Drag indices fall outside the displayed collection.
    #[error("drag index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// Validates a title before any network call.
///
/// # Errors
///
/// Returns [`TaskError::TitleEmpty`] or [`TaskError::TitleTooLong`].
pub fn validate_title(title: &str) -> Result<(), TaskError> {
    if title.is_empty() {
        return Err(TaskError::TitleEmpty);
    }
    if title.chars().count() > MAX_TASK_TITLE_LENGTH {
        return Err(TaskError::TitleTooLong);
    }
    Ok(())
}
