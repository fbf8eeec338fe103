//! Read-only queries over plan snapshots.

use crate::core::types::{StatusCounts, TaskStatus};
use crate::plan::{Plan, Task};

/// Every task in the plan, parents before their subtasks.
pub fn flatten(tasks: &[Task]) -> Vec<&Task> {
    let mut out = Vec::new();
    flatten_inner(tasks, &mut out);
    out
}

fn flatten_inner<'a>(tasks: &'a [Task], out: &mut Vec<&'a Task>) {
    for task in tasks {
        out.push(task);
        flatten_inner(&task.subtasks, out);
    }
}

pub fn find_task<'a>(tasks: &'a [Task], target_id: &str) -> Option<&'a Task> {
    for task in tasks {
        if task.id == target_id {
            return Some(task);
        }
        if let Some(found) = find_task(&task.subtasks, target_id) {
            return Some(found);
        }
    }
    None
}

pub fn find_task_mut<'a>(tasks: &'a mut [Task], target_id: &str) -> Option<&'a mut Task> {
    for task in tasks {
        if task.id == target_id {
            return Some(task);
        }
        if let Some(found) = find_task_mut(&mut task.subtasks, target_id) {
            return Some(found);
        }
    }
    None
}

pub fn counts(tasks: &[Task]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for task in flatten(tasks) {
        match task.status {
            TaskStatus::Pending => counts.pending += 1,
            TaskStatus::InProgress => counts.in_progress += 1,
            TaskStatus::Completed => counts.completed += 1,
            TaskStatus::Failed => counts.failed += 1,
        }
    }
    counts
}

/// `round(100 * completed / total)` over every tree level; 0 for an empty plan.
pub fn compute_progress(tasks: &[Task]) -> u8 {
    let counts = counts(tasks);
    let total = counts.total();
    if total == 0 {
        return 0;
    }
    ((counts.completed as f64 * 100.0) / total as f64).round() as u8
}

/// Fraction of tasks (all tree levels) that ended `failed`.
pub fn failure_ratio(plan: &Plan) -> f64 {
    let counts = counts(&plan.tasks);
    let total = counts.total();
    if total == 0 {
        return 0.0;
    }
    counts.failed as f64 / total as f64
}

/// Sum of estimates over leaf tasks that have not reached a terminal status.
pub fn estimated_remaining_ms(plan: &Plan) -> u64 {
    flatten(&plan.tasks)
        .into_iter()
        .filter(|task| task.is_leaf() && !task.status.is_terminal())
        .map(|task| task.estimated_duration_ms)
        .sum()
}
