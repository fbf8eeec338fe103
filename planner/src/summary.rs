//! Completion reports for executed plans.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use tracing::{instrument, warn};

use crate::core::render::{RenderOptions, render_outcomes, render_tree};
use crate::core::types::{PlanStatus, TaskStatus};
use crate::io::collaborator::TextGenerator;
use crate::io::prompt::PromptBuilder;
use crate::plan::Plan;

/// Asks the text-generation collaborator to summarize an executed plan.
pub struct Summarizer<'a, G: ?Sized> {
    generator: &'a G,
    prompts: &'a PromptBuilder,
    preview_chars: usize,
}

impl<'a, G: TextGenerator + ?Sized> Summarizer<'a, G> {
    pub fn new(generator: &'a G, prompts: &'a PromptBuilder, preview_chars: usize) -> Self {
        Self {
            generator,
            prompts,
            preview_chars,
        }
    }

    /// Summary text for `plan`. Falls back to [`local_report`] when the
    /// collaborator fails, so a report is always produced.
    #[instrument(skip_all, fields(plan_id = %plan.id, status = %plan.status))]
    pub async fn summarize(&self, plan: &Plan) -> String {
        match self.request(plan).await {
            Ok(summary) => summary,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "summary request failed, using local report");
                local_report(plan, self.preview_chars)
            }
        }
    }

    async fn request(&self, plan: &Plan) -> Result<String> {
        let prompt = self.prompts.build_summary(plan, self.preview_chars)?;
        let text = self
            .generator
            .generate(&prompt)
            .await
            .context("request summary")?;
        Ok(text.trim().to_string())
    }
}

/// Deterministic report rendered without a collaborator.
pub fn local_report(plan: &Plan, preview_chars: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Objective: {}", plan.original_task);
    let _ = writeln!(out, "Status: {} ({}% complete)", plan.status, plan.progress);
    out.push('\n');
    out.push_str(&render_tree(
        &plan.tasks,
        RenderOptions {
            include_ids: false,
            include_outcomes: true,
            preview_chars,
        },
    ));

    if plan.status != PlanStatus::Completed {
        let failed = render_outcomes(&plan.tasks, TaskStatus::Failed, preview_chars);
        if !failed.is_empty() {
            out.push_str("\nFailed tasks:\n");
            out.push_str(&failed);
        }
    }
    out.trim_end().to_string()
}
