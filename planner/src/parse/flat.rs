//! Flat numbered-list grammar.
//!
//! ```text
//! 1. Draft outline
//! Step 2) Write draft
//!    continued on the next line
//! 3: Edit draft
//! ```
//!
//! Each item runs from its marker up to the next marker. Without any markers
//! the parser falls back to non-trivial lines, and finally to the whole text,
//! so non-blank input always yields at least one task.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::plan::Task;

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:[*#>][ \t]*)*(?:step[ \t]*)?\d+[ \t]*[.):\-][ \t]*")
        .expect("flat marker regex")
});

/// Lines at or below this length are treated as noise in the fallback path.
const TRIVIAL_LINE_CHARS: usize = 3;

/// Parse collaborator text into independent tasks (no dependency edges).
pub fn parse_flat(text: &str) -> Vec<Task> {
    let mut items = numbered_items(text);
    if items.is_empty() {
        items = fallback_lines(text);
        debug!(count = items.len(), "no numbered items, using line fallback");
    }
    if items.is_empty() {
        let whole = collapse_whitespace(text);
        if !whole.is_empty() {
            items.push(whole);
        }
    }
    items.into_iter().map(Task::new).collect()
}

/// Make each task depend on the one before it.
pub fn chain_sequential(mut tasks: Vec<Task>) -> Vec<Task> {
    for idx in 1..tasks.len() {
        let prev = tasks[idx - 1].id.clone();
        tasks[idx].dependencies.insert(prev);
    }
    tasks
}

fn numbered_items(text: &str) -> Vec<String> {
    let markers: Vec<(usize, usize)> = MARKER_RE
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut items = Vec::new();
    for (idx, (_, body_start)) in markers.iter().enumerate() {
        let body_end = markers
            .get(idx + 1)
            .map(|(start, _)| *start)
            .unwrap_or(text.len());
        let body = collapse_whitespace(text[*body_start..body_end].trim_start_matches('*'));
        if !body.is_empty() {
            items.push(body);
        }
    }
    items
}

fn fallback_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim().trim_start_matches(['-', '*', '•']).trim())
        .filter(|line| line.chars().count() > TRIVIAL_LINE_CHARS && !line.ends_with(':'))
        .map(str::to_string)
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
