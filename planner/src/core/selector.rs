//! Deterministic readiness selection for the bounded-parallel executor.

use crate::core::query::find_task;
use crate::core::types::TaskStatus;
use crate::plan::{Plan, Task};

/// True when every dependency of `task` is present in `plan` and `completed`.
pub fn dependencies_satisfied(plan: &Plan, task: &Task) -> bool {
    task.dependencies.iter().all(|dep| {
        find_task(&plan.tasks, dep).is_some_and(|found| found.status == TaskStatus::Completed)
    })
}

/// Pick up to `capacity` ready ids from `pending`.
///
/// Higher priority first; ties keep the order of `pending` (declaration order).
pub fn select_ready(plan: &Plan, pending: &[String], capacity: usize) -> Vec<String> {
    if capacity == 0 {
        return Vec::new();
    }
    let mut ready: Vec<(usize, &Task)> = pending
        .iter()
        .enumerate()
        .filter_map(|(idx, id)| find_task(&plan.tasks, id).map(|task| (idx, task)))
        .filter(|(_, task)| task.status == TaskStatus::Pending && dependencies_satisfied(plan, task))
        .collect();
    ready.sort_by(|(ia, a), (ib, b)| b.priority.cmp(&a.priority).then(ia.cmp(ib)));
    ready
        .into_iter()
        .take(capacity)
        .map(|(_, task)| task.id.clone())
        .collect()
}

/// Pending ids blocked by a failed dependency, as opposed to a cycle or a dangling id.
pub fn blocked_by_failure(plan: &Plan, pending: &[String]) -> Vec<String> {
    pending
        .iter()
        .filter(|id| {
            find_task(&plan.tasks, id).is_some_and(|task| {
                task.dependencies.iter().any(|dep| {
                    find_task(&plan.tasks, dep)
                        .is_some_and(|found| found.status == TaskStatus::Failed)
                })
            })
        })
        .cloned()
        .collect()
}
