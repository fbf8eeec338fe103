//! Engine facade: plan an objective, execute the plan, summarize the outcome.

use anyhow::Result;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::core::query::estimated_remaining_ms;
use crate::core::types::Strategy;
use crate::exec::{Dispatch, execute_adaptive, execute_hierarchical, execute_parallel, execute_sequential};
use crate::io::collaborator::{TaskExecutor, TextGenerator};
use crate::io::config::EngineConfig;
use crate::io::events::{ProgressEvent, ProgressSender};
use crate::io::prompt::PromptBuilder;
use crate::plan::Plan;
use crate::replan::Replanner;
use crate::strategy::Decomposer;
use crate::summary::Summarizer;

/// Final plan plus its report.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub plan: Plan,
    pub summary: String,
}

/// Owns the collaborators, configuration and progress channel for one or
/// more objectives.
pub struct Engine<G, X> {
    generator: G,
    executor: X,
    config: EngineConfig,
    prompts: PromptBuilder,
    events: ProgressSender,
}

impl<G: TextGenerator, X: TaskExecutor> Engine<G, X> {
    pub fn new(generator: G, executor: X, config: EngineConfig) -> Self {
        let prompts = PromptBuilder::new(config.prompt_budget_bytes);
        Self {
            generator,
            executor,
            config,
            prompts,
            events: ProgressSender::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Decompose `objective` with the configured strategy.
    pub async fn plan(&self, objective: &str) -> Result<Plan> {
        self.plan_with(objective, self.config.strategy).await
    }

    pub async fn plan_with(&self, objective: &str, strategy: Strategy) -> Result<Plan> {
        let plan = Decomposer::new(&self.generator, &self.prompts, &self.config)
            .decompose(objective, strategy)
            .await?;
        info!(
            plan_id = %plan.id,
            estimated_remaining_ms = estimated_remaining_ms(&plan),
            "decomposition finished"
        );
        self.events.emit(ProgressEvent::PlanCreated {
            plan_id: plan.id.clone(),
            task_count: plan.tasks.len(),
        });
        Ok(plan)
    }

    /// Run `plan` with the executor its strategy names. Never fails: the
    /// returned plan is `completed` or `failed`.
    #[instrument(skip_all, fields(plan_id = %plan.id, strategy = %plan.metadata.strategy))]
    pub async fn execute_plan(&self, plan: Plan) -> Plan {
        let dispatch = Dispatch::new(&self.executor, &self.events);
        let executed = match plan.metadata.strategy {
            Strategy::Sequential => execute_sequential(plan, &dispatch).await,
            Strategy::Parallel => {
                execute_parallel(plan, &dispatch, self.config.max_parallel_tasks).await
            }
            Strategy::Hierarchical => execute_hierarchical(plan, &dispatch).await,
            Strategy::Adaptive => {
                let replanner =
                    Replanner::new(&self.generator, &self.prompts, self.config.preview_chars);
                execute_adaptive(plan, &dispatch, &replanner).await
            }
        };
        info!(status = %executed.status, progress = executed.progress, "plan executed");
        executed
    }

    pub async fn summarize(&self, plan: &Plan) -> String {
        Summarizer::new(&self.generator, &self.prompts, self.config.preview_chars)
            .summarize(plan)
            .await
    }

    /// Plan, execute and summarize one objective.
    ///
    /// Only a failed decomposition call is an error; execution failures are
    /// reported through the returned plan's status.
    pub async fn run(&self, objective: &str) -> Result<RunOutcome> {
        let plan = self.plan(objective).await?;
        let plan = self.execute_plan(plan).await;
        let summary = self.summarize(&plan).await;
        Ok(RunOutcome { plan, summary })
    }
}
