//! Hierarchical phase/task/subtask grammar.
//!
//! ```text
//! PHASE 1: Research
//! - Description: Collect background material
//! TASK 1.1: Find sources
//! - Estimated effort: Low
//! TASK 1.2: Take notes
//! - Can run in parallel: yes
//! SUBTASK 1.2.1: Summarize each source
//! - Tools needed: browser, editor
//! PHASE 2: Write
//! - Dependencies: none
//! ```
//!
//! Phases always chain on the previous phase. Tasks within a phase and
//! subtasks within a task chain on their previous sibling unless marked
//! parallel, in which case they get a priority bump instead of an edge.
//! `- Dependencies:` references resolve against sibling labels or names.
//! A header needs a separator after its label, and the label depth must match
//! the keyword, so prose such as "Task 2 of onboarding" stays description text.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::parse::flat::{chain_sequential, parse_flat};
use crate::plan::Task;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\s#*>-]*(phase|subtask|task)\s+(\d+(?:\.\d+)*)\s*\**\s*[:.)\-](?:\s|\*|$)\s*\**\s*(.*?)[\s*]*$")
        .expect("hierarchical header regex")
});

static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:[-*•]\s*)?\**\s*(description|dependencies|depends on|can run in parallel|parallel|tools needed|tools|estimated effort|effort)\s*\**\s*:\s*\**\s*(.*?)\s*$",
    )
    .expect("hierarchical field regex")
});

const MINUTE_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Phase,
    Task,
    Subtask,
}

impl Level {
    /// Estimate used when a block has no recognizable effort hint.
    fn default_duration_ms(self) -> u64 {
        match self {
            Level::Phase => 3 * MINUTE_MS,
            Level::Task => 2 * MINUTE_MS,
            Level::Subtask => MINUTE_MS,
        }
    }

    /// Number of label components a header at this level carries (`2`, `2.1`, `2.1.3`).
    fn label_depth(self) -> usize {
        match self {
            Level::Phase => 1,
            Level::Task => 2,
            Level::Subtask => 3,
        }
    }

    fn child(self) -> Level {
        match self {
            Level::Phase => Level::Task,
            Level::Task | Level::Subtask => Level::Subtask,
        }
    }
}

/// Map effort text to an estimate: low 1 min, medium 5 min, high 15 min.
///
/// Only whole words count, so "below average" is not "low".
pub fn effort_to_duration_ms(effort: &str) -> Option<u64> {
    let effort = effort.to_ascii_lowercase();
    let has = |word: &str| {
        effort
            .split(|c: char| !c.is_ascii_alphabetic())
            .any(|token| token == word)
    };
    if has("high") {
        Some(15 * MINUTE_MS)
    } else if has("medium") || has("moderate") {
        Some(5 * MINUTE_MS)
    } else if has("low") {
        Some(MINUTE_MS)
    } else {
        None
    }
}

/// A parsed header plus its fields, before ids and edges are assigned.
#[derive(Debug, Default)]
struct Block {
    label: String,
    name: String,
    description: Option<String>,
    dependencies: Vec<String>,
    parallel: bool,
    tools: Vec<String>,
    effort_ms: Option<u64>,
    children: Vec<Block>,
}

impl Block {
    fn new(label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    fn apply_field(&mut self, key: &str, value: &str) {
        match key.to_ascii_lowercase().as_str() {
            "description" => self.description = non_empty(value),
            "dependencies" | "depends on" => {
                self.dependencies = split_list(value);
            }
            "can run in parallel" | "parallel" => {
                let value = value.trim().to_ascii_lowercase();
                self.parallel = value.starts_with("yes") || value.starts_with("true");
            }
            "tools needed" | "tools" => self.tools = split_list(value),
            _ => self.effort_ms = effort_to_duration_ms(value),
        }
    }

    fn task_description(&self) -> String {
        match &self.description {
            Some(description) if !self.name.is_empty() && description != &self.name => {
                format!("{}: {}", self.name, description)
            }
            Some(description) => description.clone(),
            None if self.name.is_empty() => format!("Step {}", self.label),
            None => self.name.clone(),
        }
    }
}

/// Parse phase/task/subtask text into a task tree.
///
/// Text without any recognizable header degrades to the flat grammar with
/// sequential chaining.
pub fn parse_hierarchical(text: &str) -> Vec<Task> {
    let phases = parse_blocks(text);
    if phases.is_empty() {
        debug!("no hierarchical headers, falling back to flat grammar");
        return chain_sequential(parse_flat(text));
    }
    build_level(phases, Level::Phase)
}

fn parse_blocks(text: &str) -> Vec<Block> {
    let mut phases: Vec<Block> = Vec::new();
    let mut level: Option<Level> = None;
    let mut in_description = false;

    for line in text.lines() {
        if let Some((header_level, label, name)) = parse_header(line) {
            in_description = false;
            match header_level {
                Level::Phase => phases.push(Block::new(label, name)),
                Level::Task => {
                    let phase = ensure_phase(&mut phases, &label);
                    phase.children.push(Block::new(label, name));
                }
                Level::Subtask => {
                    let phase = ensure_phase(&mut phases, &label);
                    let task = ensure_task(phase, &label);
                    task.children.push(Block::new(label, name));
                }
            }
            level = Some(header_level);
            continue;
        }

        let current = match level {
            Some(level) => current_block(&mut phases, level),
            None => None,
        };
        let Some(current) = current else {
            continue;
        };

        if let Some(caps) = FIELD_RE.captures(line) {
            let key = caps[1].to_string();
            current.apply_field(&key, &caps[2]);
            in_description = key.eq_ignore_ascii_case("description") && current.description.is_some();
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            in_description = false;
        } else if in_description {
            if let Some(description) = current.description.as_mut() {
                description.push(' ');
                description.push_str(trimmed);
            }
        }
    }

    phases
}

/// A `PHASE n:`, `TASK n.m:` or `SUBTASK n.m.k:` header. Lines whose label
/// depth does not match the keyword are not headers.
fn parse_header(line: &str) -> Option<(Level, String, String)> {
    let caps = HEADER_RE.captures(line)?;
    let level = match caps[1].to_ascii_lowercase().as_str() {
        "phase" => Level::Phase,
        "task" => Level::Task,
        _ => Level::Subtask,
    };
    let label = caps[2].to_string();
    if label.split('.').count() != level.label_depth() {
        return None;
    }
    Some((level, label, caps[3].trim().to_string()))
}

fn ensure_phase<'a>(phases: &'a mut Vec<Block>, label: &str) -> &'a mut Block {
    if phases.is_empty() {
        let phase_label = label.split('.').next().unwrap_or("1").to_string();
        let name = format!("Phase {}", phase_label);
        phases.push(Block::new(phase_label, name));
    }
    let last = phases.len() - 1;
    &mut phases[last]
}

fn ensure_task<'a>(phase: &'a mut Block, label: &str) -> &'a mut Block {
    if phase.children.is_empty() {
        let task_label = label.rsplit_once('.').map_or(label, |(head, _)| head).to_string();
        let name = format!("Task {}", task_label);
        phase.children.push(Block::new(task_label, name));
    }
    let last = phase.children.len() - 1;
    &mut phase.children[last]
}

fn current_block(phases: &mut [Block], level: Level) -> Option<&mut Block> {
    let phase = phases.last_mut()?;
    match level {
        Level::Phase => Some(phase),
        Level::Task => phase.children.last_mut(),
        Level::Subtask => phase.children.last_mut()?.children.last_mut(),
    }
}

fn build_level(blocks: Vec<Block>, level: Level) -> Vec<Task> {
    let mut tasks: Vec<Task> = Vec::with_capacity(blocks.len());
    let mut labels: Vec<(String, String)> = Vec::with_capacity(blocks.len());

    for (idx, block) in blocks.into_iter().enumerate() {
        let mut task = Task::new(block.task_description());
        task.estimated_duration_ms = block
            .effort_ms
            .unwrap_or_else(|| level.default_duration_ms());
        task.resource_requirements = block.tools.clone();

        if idx > 0 {
            let chain = level == Level::Phase || !block.parallel;
            if chain {
                task.dependencies.insert(tasks[idx - 1].id.clone());
            } else {
                task.priority += 1;
            }
        }

        for reference in &block.dependencies {
            match resolve_reference(reference, &labels, &tasks) {
                Some(id) => {
                    task.dependencies.insert(id);
                }
                None => debug!(reference = %reference, "dropping unresolved dependency reference"),
            }
        }

        task.subtasks = build_level(block.children, level.child());
        labels.push((block.label, block.name.to_ascii_lowercase()));
        tasks.push(task);
    }

    tasks
}

/// Resolve a reference such as `1.2`, `Task 1.2` or a sibling's name against
/// earlier siblings. Only earlier siblings are visible, so self and forward
/// references drop out.
fn resolve_reference(
    reference: &str,
    labels: &[(String, String)],
    tasks: &[Task],
) -> Option<String> {
    let lowered = reference.trim().to_ascii_lowercase();
    let stripped = lowered
        .trim_start_matches("subtask")
        .trim_start_matches("task")
        .trim_start_matches("phase")
        .trim()
        .trim_end_matches('.');

    labels
        .iter()
        .position(|(label, name)| label == stripped || (!name.is_empty() && name == &lowered))
        .map(|idx| tasks[idx].id.clone())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(|item| item.trim().trim_matches(['*', '`']).trim())
        .filter(|item| {
            !item.is_empty()
                && !matches!(
                    item.to_ascii_lowercase().as_str(),
                    "none" | "n/a" | "na" | "-"
                )
        })
        .map(str::to_string)
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
