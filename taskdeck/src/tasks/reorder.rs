//! Drag-gesture planning for the reorder coordinator.
//!
//! A drag reports a source and destination index within the currently
//! displayed (possibly filtered) collection. [`plan_move`] translates
//! that into a new ordering of the *full* collection: the displayed
//! ids are permuted among the slots they already occupy, and every
//! non-displayed task keeps its slot. The resulting plan carries the
//! full id order (for the optimistic `apply_reorder`) and the
//! `{id, position}` payload for the persistence request.
//!
//! The commit itself is two-phase and driven by the net coordinator:
//! apply optimistically, persist, revert on failure.

use taskdeck_proto::task::{ReorderItem, TaskId};

use super::TaskError;
use super::store::TaskList;

/// Output of planning a drag: the full collection's new id order and
/// the persistence payload covering every task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderPlan {
    /// New id order for the full collection.
    pub ordered_ids: Vec<TaskId>,
    /// `{id, position}` for every task in the new order.
    pub items: Vec<ReorderItem>,
}

/// Plans a drag of the displayed task at `source` to `dest`.
///
/// `visible_ids` is the displayed subset in display order; it must be
/// a subsequence of `full`'s current order.
///
/// # Errors
///
/// Returns [`TaskError::IndexOutOfBounds`] for bad drag indices and
/// [`TaskError::InvalidReorder`] if `visible_ids` contains an id the
/// full collection does not.
pub fn plan_move(
    full: &TaskList,
    visible_ids: &[TaskId],
    source: usize,
    dest: usize,
) -> Result<ReorderPlan, TaskError> {
    let len = visible_ids.len();
    if source >= len {
        return Err(TaskError::IndexOutOfBounds { index: source, len });
    }
    if dest >= len {
        return Err(TaskError::IndexOutOfBounds { index: dest, len });
    }
    for id in visible_ids {
        if !full.contains(*id) {
            return Err(TaskError::InvalidReorder(format!(
                "displayed id {id} not in collection"
            )));
        }
    }

    // Move within the displayed subset.
    let mut new_visible = visible_ids.to_vec();
    let moved = new_visible.remove(source);
    new_visible.insert(dest, moved);

    // Splice the permuted subset back into the slots those ids occupy
    // in the full collection; non-displayed tasks keep their slots.
    let mut replacement = new_visible.into_iter();
    let ordered_ids: Vec<TaskId> = full
        .ids()
        .into_iter()
        .map(|id| {
            if visible_ids.contains(&id) {
                // The iterator yields exactly one id per displayed slot.
                replacement.next().unwrap_or(id)
            } else {
                id
            }
        })
        .collect();

    let items = ordered_ids
        .iter()
        .enumerate()
        .map(|(index, id)| ReorderItem {
            id: *id,
            position: u32::try_from(index).unwrap_or(u32::MAX),
        })
        .collect();

    Ok(ReorderPlan { ordered_ids, items })
}
