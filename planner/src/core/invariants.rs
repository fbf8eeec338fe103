//! Semantic plan invariants not expressible via JSON Schema.

use std::collections::HashSet;

use crate::core::query::{compute_progress, find_task};
use crate::core::types::TaskStatus;
use crate::plan::{Plan, Task};

/// Check semantic invariants:
/// - No duplicate ids across the whole tree
/// - `result` only on completed tasks, `error` only on failed tasks
/// - Terminal tasks carry their payload
/// - Completed tasks have completed dependencies
/// - `progress` matches the flattened completion ratio
pub fn validate_invariants(plan: &Plan) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for task in &plan.tasks {
        validate_task(plan, task, &mut seen, &mut errors, &task.id);
    }

    let expected = compute_progress(&plan.tasks);
    if plan.progress != expected {
        errors.push(format!(
            "progress {} does not match completed ratio {}",
            plan.progress, expected
        ));
    }
    errors
}

fn validate_task(
    plan: &Plan,
    task: &Task,
    seen: &mut HashSet<String>,
    errors: &mut Vec<String>,
    path: &str,
) {
    if !seen.insert(task.id.clone()) {
        errors.push(format!("duplicate id '{}' at {}", task.id, path));
    }

    if task.result.is_some() && task.status != TaskStatus::Completed {
        errors.push(format!("{}: result set on {} task", path, task.status));
    }
    if task.error.is_some() && task.status != TaskStatus::Failed {
        errors.push(format!("{}: error set on {} task", path, task.status));
    }
    if task.status == TaskStatus::Completed && task.result.is_none() {
        errors.push(format!("{}: completed task has no result", path));
    }
    if task.status == TaskStatus::Failed && task.error.is_none() {
        errors.push(format!("{}: failed task has no error", path));
    }

    if task.status == TaskStatus::Completed {
        for dep in &task.dependencies {
            let satisfied = find_task(&plan.tasks, dep)
                .is_some_and(|found| found.status == TaskStatus::Completed);
            if !satisfied {
                errors.push(format!(
                    "{}: completed before dependency '{}' completed",
                    path, dep
                ));
            }
        }
    }

    for child in &task.subtasks {
        let child_path = format!("{}/{}", path, child.id);
        validate_task(plan, child, seen, errors, &child_path);
    }
}
