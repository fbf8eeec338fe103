//! Deterministic text renderings of plans for prompts and reports.

use std::fmt::Write as _;

use crate::core::query::flatten;
use crate::core::types::TaskStatus;
use crate::plan::Task;

/// Controls what a tree rendering includes.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Show task ids and dependency ids.
    pub include_ids: bool,
    /// Show result/error lines under terminal tasks.
    pub include_outcomes: bool,
    /// Truncate result/error text beyond this many characters.
    pub preview_chars: usize,
}

/// Render tasks as an indented bullet tree, one task per line.
pub fn render_tree(tasks: &[Task], options: RenderOptions) -> String {
    let mut out = String::new();
    render_level(tasks, 0, options, &mut out);
    out
}

fn render_level(tasks: &[Task], depth: usize, options: RenderOptions, out: &mut String) {
    let indent = "  ".repeat(depth);
    for task in tasks {
        let _ = write!(out, "{indent}- [{}] {}", task.status, task.description);
        if options.include_ids {
            let _ = write!(out, " (id: {}", task.id);
            if !task.dependencies.is_empty() {
                let deps: Vec<&str> = task.dependencies.iter().map(String::as_str).collect();
                let _ = write!(out, "; depends on: {}", deps.join(", "));
            }
            out.push(')');
        }
        out.push('\n');

        if options.include_outcomes {
            if let Some(result) = &task.result {
                let _ = writeln!(
                    out,
                    "{indent}  result: {}",
                    truncate_preview(result, options.preview_chars)
                );
            }
            if let Some(error) = &task.error {
                let _ = writeln!(
                    out,
                    "{indent}  error: {}",
                    truncate_preview(error, options.preview_chars)
                );
            }
        }

        render_level(&task.subtasks, depth + 1, options, out);
    }
}

/// Bullet list of tasks with `status`, each followed by its truncated outcome.
pub fn render_outcomes(tasks: &[Task], status: TaskStatus, preview_chars: usize) -> String {
    let mut out = String::new();
    for task in flatten(tasks)
        .into_iter()
        .filter(|task| task.status == status)
    {
        let outcome = match status {
            TaskStatus::Completed => task.result.as_deref(),
            TaskStatus::Failed => task.error.as_deref(),
            _ => None,
        };
        match outcome {
            Some(text) => {
                let _ = writeln!(
                    out,
                    "- {}: {}",
                    task.description,
                    truncate_preview(text, preview_chars)
                );
            }
            None => {
                let _ = writeln!(out, "- {}", task.description);
            }
        }
    }
    out
}

/// Collapse whitespace and cut to `max_chars` characters, appending `...` when cut.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}
