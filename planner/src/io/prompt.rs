//! Prompt builder for text-generation collaborator input.
//!
//! Templates carry `<!-- section:KEY required|droppable -->` markers. After
//! rendering, sections are split on those markers and fitted to a byte budget
//! by dropping droppable sections in a per-prompt order, then truncating the
//! last section if the prompt is still too large.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use regex::Regex;
use tracing::debug;

use crate::core::render::{RenderOptions, render_outcomes, render_tree};
use crate::core::types::{Strategy, TaskStatus};
use crate::parse::render_task_index;
use crate::plan::{Plan, Task};

const DECOMPOSE_TEMPLATE: &str = include_str!("../prompts/decompose.md");
const DEPENDENCIES_TEMPLATE: &str = include_str!("../prompts/dependencies.md");
const HIERARCHICAL_TEMPLATE: &str = include_str!("../prompts/hierarchical.md");
const REPLAN_TEMPLATE: &str = include_str!("../prompts/replan.md");
const SUMMARY_TEMPLATE: &str = include_str!("../prompts/summary.md");

/// The phase/task/subtask shape the hierarchical parser reads back.
pub const HIERARCHICAL_FORMAT: &str = "\
PHASE 1: [phase name]
- Description: [what this phase achieves]
- Dependencies: [none, or earlier phase numbers such as 1]
- Estimated effort: [Low|Medium|High]

TASK 1.1: [task name]
- Description: [what to do]
- Dependencies: [none, or earlier task numbers such as 1.1]
- Can run in parallel: [yes|no]
- Tools needed: [comma separated list, or none]
- Estimated effort: [Low|Medium|High]

SUBTASK 1.1.1: [subtask name]
- Description: [what to do]
- Can run in parallel: [yes|no]
- Estimated effort: [Low|Medium|High]";

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->").expect("section marker regex")
});

const TRUNCATION_NOTICE: &str = "\n[truncated]";

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        for (name, source) in [
            ("decompose", DECOMPOSE_TEMPLATE),
            ("dependencies", DEPENDENCIES_TEMPLATE),
            ("hierarchical", HIERARCHICAL_TEMPLATE),
            ("replan", REPLAN_TEMPLATE),
            ("summary", SUMMARY_TEMPLATE),
        ] {
            env.add_template(name, source)
                .with_context(|| format!("load {} template", name))?;
        }
        Ok(Self { env })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        template
            .render(ctx)
            .with_context(|| format!("render {} template", name))
    }
}

/// A parsed section from rendered template output.
#[derive(Debug, Clone)]
struct ParsedSection {
    /// Section identifier (e.g., "contract", "plan").
    key: String,
    /// Whether this section is required (cannot be dropped).
    required: bool,
    /// Section content with the marker removed.
    content: String,
}

fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    let matches: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    let mut sections = Vec::new();

    for (i, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(key), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |m| m.start());

        let content = rendered[whole.end()..end].trim().to_string();
        let required = kind.as_str() == "required";
        if !content.is_empty() || required {
            sections.push(ParsedSection {
                key: key.as_str().to_string(),
                required,
                content,
            });
        }
    }

    sections
}

/// Drop droppable sections in `drop_order` until under budget, then truncate
/// the last section.
fn apply_budget_to_sections(sections: &mut Vec<ParsedSection>, budget: usize, drop_order: &[&str]) {
    let total_len =
        |secs: &[ParsedSection]| -> usize { secs.iter().map(|s| s.content.len()).sum() };

    if total_len(sections) <= budget {
        return;
    }

    for key in drop_order {
        if total_len(sections) <= budget {
            break;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == *key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[idx].content.len(),
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }

    if total_len(sections) <= budget {
        return;
    }
    let other_len: usize = sections
        .iter()
        .rev()
        .skip(1)
        .map(|s| s.content.len())
        .sum();
    let allowed = budget.saturating_sub(other_len);
    if let Some(last) = sections.last_mut() {
        let before_len = last.content.len();
        if allowed > TRUNCATION_NOTICE.len() {
            truncate_at_char_boundary(&mut last.content, allowed - TRUNCATION_NOTICE.len());
            last.content.push_str(TRUNCATION_NOTICE);
        } else {
            truncate_at_char_boundary(&mut last.content, allowed);
        }
        debug!(
            section = last.key,
            before_len,
            after_len = last.content.len(),
            "truncated section for budget"
        );
    }
}

fn truncate_at_char_boundary(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

fn render_sections(sections: &[ParsedSection]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn or_none(text: String) -> String {
    if text.trim().is_empty() {
        "(none)".to_string()
    } else {
        text.trim_end().to_string()
    }
}

/// Builds collaborator prompts within a byte budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    fn finish(&self, rendered: &str, drop_order: &[&str]) -> String {
        let mut sections = parse_sections(rendered);
        apply_budget_to_sections(&mut sections, self.budget_bytes, drop_order);
        render_sections(&sections)
    }

    /// Flat numbered-list decomposition for the sequential and parallel strategies.
    pub fn build_decomposition(&self, objective: &str, strategy: Strategy) -> Result<String> {
        let rendered = PromptEngine::new()?.render(
            "decompose",
            context! {
                objective => objective.trim(),
                strategy => strategy.as_str(),
            },
        )?;
        Ok(self.finish(&rendered, &[]))
    }

    /// Dependency elicitation over an already decomposed flat list.
    pub fn build_dependencies(&self, objective: &str, tasks: &[Task]) -> Result<String> {
        let rendered = PromptEngine::new()?.render(
            "dependencies",
            context! {
                objective => objective.trim(),
                tasks => render_task_index(tasks),
            },
        )?;
        Ok(self.finish(&rendered, &["objective"]))
    }

    /// Phase/task/subtask decomposition.
    pub fn build_hierarchical(&self, objective: &str) -> Result<String> {
        let rendered = PromptEngine::new()?.render(
            "hierarchical",
            context! {
                objective => objective.trim(),
                format => HIERARCHICAL_FORMAT,
            },
        )?;
        Ok(self.finish(&rendered, &[]))
    }

    /// Revision request for a failed plan.
    pub fn build_replan(&self, plan: &Plan, preview_chars: usize) -> Result<String> {
        let tree = render_tree(
            &plan.tasks,
            RenderOptions {
                include_ids: true,
                include_outcomes: false,
                preview_chars,
            },
        );
        let rendered = PromptEngine::new()?.render(
            "replan",
            context! {
                objective => plan.original_task.trim(),
                format => HIERARCHICAL_FORMAT,
                failed => or_none(render_outcomes(&plan.tasks, TaskStatus::Failed, preview_chars)),
                completed => or_none(render_outcomes(&plan.tasks, TaskStatus::Completed, preview_chars)),
                plan => or_none(tree),
            },
        )?;
        Ok(self.finish(&rendered, &["completed", "plan", "failed"]))
    }

    /// Final report request over the executed plan transcript.
    pub fn build_summary(&self, plan: &Plan, preview_chars: usize) -> Result<String> {
        let transcript = render_tree(
            &plan.tasks,
            RenderOptions {
                include_ids: false,
                include_outcomes: true,
                preview_chars,
            },
        );
        let rendered = PromptEngine::new()?.render(
            "summary",
            context! {
                objective => plan.original_task.trim(),
                status => plan.status.as_str(),
                progress => plan.progress,
                transcript => or_none(transcript),
            },
        )?;
        Ok(self.finish(&rendered, &[]))
    }
}
