//! Failure-driven plan revision for the adaptive strategy.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::query::failure_ratio;
use crate::core::types::PlanStatus;
use crate::io::collaborator::TextGenerator;
use crate::io::prompt::PromptBuilder;
use crate::parse::parse_hierarchical;
use crate::plan::{Plan, PlanMetadata};

/// Why the adaptive loop stopped or continued after a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplanDecision {
    /// The plan completed; nothing to do.
    Completed,
    /// Failures stayed at or below the threshold.
    BelowThreshold { ratio: f64 },
    /// `replan_count` reached `max_replans`.
    Exhausted { ratio: f64 },
    /// Ask for a revised plan.
    Replan { ratio: f64 },
}

/// Decide whether an executed plan should be revised.
///
/// Replanning happens when the plan failed, more than
/// `replanning_threshold` of all tasks (every tree level) failed, and fewer
/// than `max_replans` revisions have been made.
pub fn replan_decision(plan: &Plan) -> ReplanDecision {
    if plan.status == PlanStatus::Completed {
        return ReplanDecision::Completed;
    }
    let ratio = failure_ratio(plan);
    let meta = &plan.metadata;
    if ratio <= meta.replanning_threshold {
        ReplanDecision::BelowThreshold { ratio }
    } else if meta.replan_count >= meta.max_replans {
        ReplanDecision::Exhausted { ratio }
    } else {
        ReplanDecision::Replan { ratio }
    }
}

/// Requests a hierarchical revision of a failed plan.
pub struct Replanner<'a, G: ?Sized> {
    generator: &'a G,
    prompts: &'a PromptBuilder,
    preview_chars: usize,
}

impl<'a, G: TextGenerator + ?Sized> Replanner<'a, G> {
    pub fn new(generator: &'a G, prompts: &'a PromptBuilder, preview_chars: usize) -> Self {
        Self {
            generator,
            prompts,
            preview_chars,
        }
    }

    /// Build a brand-new plan from the collaborator's revision of `failed`.
    ///
    /// The new plan links back via `original_plan_id`, keeps the strategy,
    /// threshold and cap, and increments `replan_count`.
    #[instrument(skip_all, fields(plan_id = %failed.id, replan_count = failed.metadata.replan_count))]
    pub async fn replan(&self, failed: &Plan) -> Result<Plan> {
        let prompt = self.prompts.build_replan(failed, self.preview_chars)?;
        let text = self
            .generator
            .generate(&prompt)
            .await
            .context("request revised plan")?;
        let tasks = parse_hierarchical(&text);

        let metadata = PlanMetadata {
            original_plan_id: Some(failed.id.clone()),
            replan_count: failed.metadata.replan_count + 1,
            ..failed.metadata.clone()
        };
        let plan = Plan::new(failed.original_task.clone(), tasks, metadata);
        info!(new_plan_id = %plan.id, tasks = plan.tasks.len(), "revised plan created");
        Ok(plan)
    }
}
