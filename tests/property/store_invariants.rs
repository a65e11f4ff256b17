//! Property-based tests over the task collection's pure transitions.
//!
//! Uses proptest to verify:
//! 1. No sequence of create/update/delete operations ever produces
//!    duplicate ids.
//! 2. A valid reorder is a pure permutation: same id set, contiguous
//!    zero-based positions, requested order.
//! 3. Planning a drag always yields a permutation the store accepts.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;

use taskdeck::tasks::{TaskList, plan_move};
use taskdeck_proto::task::{Task, TaskId};

fn make_task(id: u64, position: u32) -> Task {
    Task {
        id: TaskId(id),
        title: format!("task {id}"),
        description: None,
        category: None,
        due_date: None,
        priority: None,
        completed: false,
        position,
    }
}

/// Builds a collection of `count` tasks with ids `0..count`.
fn seeded_list(count: usize) -> TaskList {
    TaskList::from_snapshot(
        (0..count)
            .map(|i| make_task(i as u64, u32::try_from(i).unwrap_or(0)))
            .collect(),
    )
}

/// One random transition: 0 = create, 1 = update, 2 = delete.
fn arb_ops() -> impl Strategy<Value = Vec<(u8, u64)>> {
    prop::collection::vec((0u8..3, 0u64..16), 0..64)
}

/// A task count and a permutation of its ids.
fn arb_permutation() -> impl Strategy<Value = (usize, Vec<TaskId>)> {
    (1usize..12).prop_flat_map(|count| {
        let ids: Vec<TaskId> = (0..count).map(|i| TaskId(i as u64)).collect();
        Just(ids)
            .prop_shuffle()
            .prop_map(move |perm| (count, perm))
    })
}

proptest! {
    #[test]
    fn mixed_operation_sequences_never_duplicate_ids(ops in arb_ops()) {
        let mut list = TaskList::new();
        for (op, id) in ops {
            list = match op {
                0 => list.apply_create(make_task(id, u32::try_from(id).unwrap_or(0))),
                1 => list.apply_update(make_task(id, u32::try_from(id).unwrap_or(0))),
                _ => list.apply_delete(TaskId(id)),
            };
            let ids = list.ids();
            let unique: std::collections::HashSet<TaskId> = ids.iter().copied().collect();
            prop_assert_eq!(ids.len(), unique.len(), "duplicate ids after op {}", op);
        }
    }

    #[test]
    fn reorder_is_a_pure_permutation((count, perm) in arb_permutation()) {
        let list = seeded_list(count);
        let next = list.apply_reorder(&perm).unwrap();

        // Same id set, in exactly the requested order.
        prop_assert_eq!(next.ids(), perm);
        prop_assert_eq!(next.len(), list.len());

        // Positions are rewritten to contiguous zero-based indices.
        let positions: Vec<u32> = next.tasks().iter().map(|t| t.position).collect();
        let expected: Vec<u32> = (0..count).map(|i| u32::try_from(i).unwrap_or(0)).collect();
        prop_assert_eq!(positions, expected);
    }

    #[test]
    fn reorder_with_wrong_id_set_is_rejected(
        (count, mut perm) in arb_permutation(),
        foreign in 100u64..200,
    ) {
        let list = seeded_list(count);
        perm[0] = TaskId(foreign);
        prop_assert!(list.apply_reorder(&perm).is_err());
    }

    #[test]
    fn planned_drags_are_always_accepted_by_the_store(
        count in 1usize..12,
        source in 0usize..12,
        dest in 0usize..12,
    ) {
        let source = source % count;
        let dest = dest % count;
        let list = seeded_list(count);

        let plan = plan_move(&list, &list.ids(), source, dest).unwrap();
        let next = list.apply_reorder(&plan.ordered_ids).unwrap();

        // The moved id sits at the destination index.
        prop_assert_eq!(next.ids()[dest], list.ids()[source]);
        // The persistence payload covers every task with its new index.
        prop_assert_eq!(plan.items.len(), count);
        for (index, item) in plan.items.iter().enumerate() {
            prop_assert_eq!(item.position, u32::try_from(index).unwrap_or(0));
            prop_assert_eq!(item.id, next.ids()[index]);
        }
    }

    #[test]
    fn snapshot_replace_is_total(count in 0usize..12, replacement in 0usize..12) {
        let list = seeded_list(count);
        let incoming: Vec<Task> = (100..100 + replacement as u64)
            .enumerate()
            .map(|(i, id)| make_task(id, u32::try_from(i).unwrap_or(0)))
            .collect();
        let next = list.apply_snapshot(incoming.clone());
        prop_assert_eq!(next.tasks(), incoming.as_slice());
    }
}
