//! Engine-owned state transitions for plans.
//!
//! Every function here takes a snapshot and returns a new one. Callers replace
//! their current plan binding with the returned value; nothing is mutated in
//! place where another reader could observe a half-applied transition.

use chrono::Utc;

use crate::core::query::{compute_progress, find_task, find_task_mut};
use crate::core::types::{PlanStatus, TaskStatus, TaskUpdate};
use crate::plan::{Plan, Task};

/// Apply one task transition and recompute progress.
///
/// Legal transitions are `pending -> in_progress` and
/// `in_progress -> {completed | failed}`. Completion additionally requires
/// every dependency to be completed. Anything else is a scheduling bug and is
/// reported as an error.
pub fn apply_task_update(plan: &Plan, task_id: &str, update: TaskUpdate) -> Result<Plan, String> {
    if matches!(update, TaskUpdate::Complete(_)) {
        let unmet = unmet_dependencies_in(&plan.tasks, task_id)?;
        if !unmet.is_empty() {
            return Err(format!(
                "task '{}' cannot complete before dependencies: {}",
                task_id,
                unmet.join(", ")
            ));
        }
    }

    let mut next = plan.clone();
    let now = Utc::now();
    let task = find_task_mut(&mut next.tasks, task_id)
        .ok_or_else(|| format!("task '{}' not found", task_id))?;

    let target = update.target();
    match (task.status, update) {
        (TaskStatus::Pending, TaskUpdate::Start) => {
            task.status = TaskStatus::InProgress;
            task.started_at = Some(now);
        }
        (TaskStatus::InProgress, TaskUpdate::Complete(result)) => {
            task.status = TaskStatus::Completed;
            task.result = Some(result);
            task.finished_at = Some(now);
        }
        (TaskStatus::InProgress, TaskUpdate::Fail(error)) => {
            task.status = TaskStatus::Failed;
            task.error = Some(error);
            task.finished_at = Some(now);
        }
        (from, _) => {
            return Err(format!(
                "illegal transition for task '{}': {} -> {}",
                task_id, from, target
            ));
        }
    }

    next.progress = compute_progress(&next.tasks);
    next.updated = now;
    Ok(next)
}

/// Return a copy of `plan` with a new plan-level status.
pub fn with_plan_status(plan: &Plan, status: PlanStatus) -> Plan {
    let mut next = plan.clone();
    next.status = status;
    next.progress = compute_progress(&next.tasks);
    next.updated = Utc::now();
    next
}

/// Dependency ids of `task_id` that are not `completed` (missing ids count as unmet).
pub fn unmet_dependencies(plan: &Plan, task_id: &str) -> Result<Vec<String>, String> {
    unmet_dependencies_in(&plan.tasks, task_id)
}

fn unmet_dependencies_in(tasks: &[Task], task_id: &str) -> Result<Vec<String>, String> {
    let task =
        find_task(tasks, task_id).ok_or_else(|| format!("task '{}' not found", task_id))?;
    Ok(task
        .dependencies
        .iter()
        .filter(|dep| {
            find_task(tasks, dep).is_none_or(|found| found.status != TaskStatus::Completed)
        })
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{finished, plan_of, task};

    fn status_of(plan: &Plan, id: &str) -> TaskStatus {
        find_task(&plan.tasks, id).expect("task").status
    }

    /// The original snapshot is untouched by an update.
    #[test]
    fn update_returns_new_snapshot() {
        let plan = plan_of(vec![task("a", "a")]);
        let next = apply_task_update(&plan, "a", TaskUpdate::Start).expect("start");
        assert_eq!(status_of(&plan, "a"), TaskStatus::Pending);
        assert_eq!(status_of(&next, "a"), TaskStatus::InProgress);
        assert!(find_task(&next.tasks, "a").expect("task").started_at.is_some());
    }

    /// Full happy path sets the result exactly once and recomputes progress.
    #[test]
    fn start_then_complete_sets_result_and_progress() {
        let plan = plan_of(vec![task("a", "a"), task("b", "b")]);
        let plan = apply_task_update(&plan, "a", TaskUpdate::Start).expect("start");
        let plan =
            apply_task_update(&plan, "a", TaskUpdate::Complete("ok".to_string())).expect("done");
        let a = find_task(&plan.tasks, "a").expect("task");
        assert_eq!(a.result.as_deref(), Some("ok"));
        assert!(a.error.is_none());
        assert_eq!(plan.progress, 50);
    }

    /// Terminal tasks never move again, so result/error cannot be overwritten.
    #[test]
    fn terminal_tasks_reject_further_updates() {
        let plan = plan_of(vec![finished(task("a", "a"), TaskStatus::Completed)]);
        for update in [
            TaskUpdate::Start,
            TaskUpdate::Complete("again".to_string()),
            TaskUpdate::Fail("late".to_string()),
        ] {
            let err = apply_task_update(&plan, "a", update).expect_err("illegal");
            assert!(err.contains("illegal transition"), "{err}");
        }
    }

    /// Pending tasks cannot skip `in_progress`.
    #[test]
    fn pending_cannot_jump_to_terminal() {
        let plan = plan_of(vec![task("a", "a")]);
        let err =
            apply_task_update(&plan, "a", TaskUpdate::Fail("x".to_string())).expect_err("illegal");
        assert!(err.contains("pending -> failed"), "{err}");
    }

    /// Completion is refused while a dependency is still open.
    #[test]
    fn completion_requires_completed_dependencies() {
        let plan = plan_of(vec![task("a", "a"), task("b", "b").depends_on("a")]);
        let plan = apply_task_update(&plan, "b", TaskUpdate::Start).expect("start");
        let err = apply_task_update(&plan, "b", TaskUpdate::Complete("ok".to_string()))
            .expect_err("deps");
        assert!(err.contains("'a'") || err.contains("a"), "{err}");

        let plan = apply_task_update(&plan, "b", TaskUpdate::Fail("blocked".to_string()))
            .expect("failing is allowed");
        assert_eq!(status_of(&plan, "b"), TaskStatus::Failed);
    }

    #[test]
    fn missing_task_is_reported() {
        let plan = plan_of(vec![task("a", "a")]);
        let err = apply_task_update(&plan, "missing", TaskUpdate::Start).expect_err("missing");
        assert!(err.contains("missing"));
    }

    #[test]
    fn unmet_dependencies_treats_unknown_ids_as_unmet() {
        let plan = plan_of(vec![
            finished(task("a", "a"), TaskStatus::Completed),
            task("b", "b").depends_on("a").depends_on("ghost"),
        ]);
        assert_eq!(
            unmet_dependencies(&plan, "b").expect("lookup"),
            vec!["ghost".to_string()]
        );
    }
}
