//! Dependency-annotation grammar.
//!
//! The collaborator echoes one line per task:
//!
//! ```text
//! Task 1 (3f2a...): [none]
//! Task 2 (9b1c...): [3f2a...]
//! Task 3 (77de...): [3f2a..., 9b1c...]
//! ```
//!
//! Lines are matched by task id, so numbering mistakes are harmless. Ids that
//! are not part of the current task set are dropped. A task that references
//! itself keeps that edge; the parallel executor reports it as a deadlock.

use std::collections::HashSet;

use regex::Regex;
use tracing::debug;

use crate::plan::Task;

/// Assign dependency sets from an annotation response to `tasks`.
///
/// Tasks without a matching line keep whatever dependencies they already had.
pub fn apply_dependency_annotations(tasks: &[Task], text: &str) -> Vec<Task> {
    let known: HashSet<&str> = tasks.iter().map(|task| task.id.as_str()).collect();

    tasks
        .iter()
        .map(|task| {
            let mut next = task.clone();
            if let Some(deps) = annotated_dependencies(&task.id, text) {
                next.dependencies = deps
                    .into_iter()
                    .filter(|dep| {
                        let keep = known.contains(dep.as_str());
                        if !keep {
                            debug!(task = %task.id, dep = %dep, "dropping unknown dependency id");
                        }
                        keep
                    })
                    .collect();
            }
            next
        })
        .collect()
}

/// Raw dependency ids listed for `task_id`, or `None` when no line matches.
fn annotated_dependencies(task_id: &str, text: &str) -> Option<Vec<String>> {
    let pattern = format!(
        r#"(?im)^[^\S\n]*[*-]?[^\S\n]*task[^\S\n]+\d+[^\S\n]*\([^\S\n]*["'`]?{}["'`]?[^\S\n]*\)[^\S\n]*:[^\S\n]*\[([^\]]*)\]"#,
        regex::escape(task_id)
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(text)?;
    let list = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

    Some(
        list.split(',')
            .map(|item| item.trim().trim_matches(['"', '\'', '`']).trim())
            .filter(|item| !item.is_empty() && !item.eq_ignore_ascii_case("none"))
            .map(str::to_string)
            .collect(),
    )
}

/// Render the task list the dependency-elicitation prompt shows the collaborator.
pub fn render_task_index(tasks: &[Task]) -> String {
    tasks
        .iter()
        .enumerate()
        .map(|(idx, task)| format!("Task {} ({}): {}", idx + 1, task.id, task.description))
        .collect::<Vec<_>>()
        .join("\n")
}
