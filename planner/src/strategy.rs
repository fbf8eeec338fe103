//! Strategy selection and objective decomposition.
//!
//! | strategy       | prompt         | grammar                          |
//! |----------------|----------------|----------------------------------|
//! | `sequential`   | flat list      | flat, each task chained on the previous |
//! | `parallel`     | flat list      | flat, then a dependency-annotation turn |
//! | `hierarchical` | phase tree     | hierarchical                     |
//! | `adaptive`     | phase tree     | hierarchical                     |

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::types::Strategy;
use crate::io::collaborator::TextGenerator;
use crate::io::config::EngineConfig;
use crate::io::prompt::PromptBuilder;
use crate::parse::{apply_dependency_annotations, chain_sequential, parse_flat, parse_hierarchical};
use crate::plan::{Plan, PlanMetadata, Task};

/// Resolve the effective strategy: an explicit override wins over configuration.
pub fn select_strategy(config: &EngineConfig, requested: Option<Strategy>) -> Strategy {
    requested.unwrap_or(config.strategy)
}

/// Turns an objective into a freshly created plan.
pub struct Decomposer<'a, G: ?Sized> {
    generator: &'a G,
    prompts: &'a PromptBuilder,
    config: &'a EngineConfig,
}

impl<'a, G: TextGenerator + ?Sized> Decomposer<'a, G> {
    pub fn new(generator: &'a G, prompts: &'a PromptBuilder, config: &'a EngineConfig) -> Self {
        Self {
            generator,
            prompts,
            config,
        }
    }

    /// Decompose `objective` under `strategy` into a plan with status `created`.
    ///
    /// Errors from the decomposition call propagate. A failed dependency turn
    /// under `parallel` is logged and the tasks keep no edges.
    #[instrument(skip_all, fields(strategy = %strategy))]
    pub async fn decompose(&self, objective: &str, strategy: Strategy) -> Result<Plan> {
        let tasks = match strategy {
            Strategy::Sequential => chain_sequential(self.flat_tasks(objective, strategy).await?),
            Strategy::Parallel => {
                let tasks = self.flat_tasks(objective, strategy).await?;
                self.annotate_dependencies(objective, tasks).await
            }
            Strategy::Hierarchical | Strategy::Adaptive => {
                let prompt = self.prompts.build_hierarchical(objective)?;
                let text = self
                    .generator
                    .generate(&prompt)
                    .await
                    .context("request hierarchical decomposition")?;
                parse_hierarchical(&text)
            }
        };

        let metadata = PlanMetadata {
            replanning_threshold: self.config.replanning_threshold,
            max_replans: self.config.max_replans,
            ..PlanMetadata::new(strategy)
        };
        let plan = Plan::new(objective.trim(), tasks, metadata);
        info!(plan_id = %plan.id, tasks = plan.tasks.len(), "plan created");
        Ok(plan)
    }

    async fn flat_tasks(&self, objective: &str, strategy: Strategy) -> Result<Vec<Task>> {
        let prompt = self.prompts.build_decomposition(objective, strategy)?;
        let text = self
            .generator
            .generate(&prompt)
            .await
            .context("request task decomposition")?;
        Ok(parse_flat(&text))
    }

    async fn annotate_dependencies(&self, objective: &str, tasks: Vec<Task>) -> Vec<Task> {
        if tasks.len() < 2 {
            return tasks;
        }
        let response = match self.prompts.build_dependencies(objective, &tasks) {
            Ok(prompt) => self.generator.generate(&prompt).await,
            Err(err) => Err(err),
        };
        match response {
            Ok(text) => apply_dependency_annotations(&tasks, &text),
            Err(err) => {
                warn!(err = %format!("{err:#}"), "dependency elicitation failed, running without edges");
                tasks
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PlanStatus;
    use crate::test_support::ScriptedGenerator;

    async fn decompose(generator: &ScriptedGenerator, strategy: Strategy) -> Plan {
        let config = EngineConfig::default();
        let prompts = PromptBuilder::new(config.prompt_budget_bytes);
        Decomposer::new(generator, &prompts, &config)
            .decompose("Write and publish a blog post", strategy)
            .await
            .expect("decompose")
    }

    #[test]
    fn override_wins_over_config() {
        let config = EngineConfig::default();
        assert_eq!(select_strategy(&config, None), Strategy::Adaptive);
        assert_eq!(
            select_strategy(&config, Some(Strategy::Parallel)),
            Strategy::Parallel
        );
    }

    #[tokio::test]
    async fn sequential_chains_flat_tasks() {
        let generator =
            ScriptedGenerator::new(["1. Draft outline\n2. Write draft\n3. Edit draft"]);
        let plan = decompose(&generator, Strategy::Sequential).await;
        assert_eq!(plan.status, PlanStatus::Created);
        assert_eq!(plan.metadata.strategy, Strategy::Sequential);
        assert_eq!(plan.tasks.len(), 3);
        assert!(plan.tasks[1].dependencies.contains(&plan.tasks[0].id));
        assert!(plan.tasks[2].dependencies.contains(&plan.tasks[1].id));
        assert!(generator.prompts()[0].contains("for sequential execution"));
    }

    #[tokio::test]
    async fn parallel_uses_the_dependency_turn() {
        let generator = ScriptedGenerator::new(["1. A\n2. B\n3. C"]);
        let config = EngineConfig::default();
        let prompts = PromptBuilder::new(config.prompt_budget_bytes);
        let decomposer = Decomposer::new(&generator, &prompts, &config);

        // The annotation needs the generated ids, so answer the second turn by
        // reading them back out of the dependency prompt.
        let tasks = decomposer
            .flat_tasks("objective", Strategy::Parallel)
            .await
            .expect("flat");
        let annotation = format!(
            "Task 1 ({a}): [none]\nTask 2 ({b}): [none]\nTask 3 ({c}): [{a}, {b}]",
            a = tasks[0].id,
            b = tasks[1].id,
            c = tasks[2].id
        );
        let annotated = {
            let second = ScriptedGenerator::new([annotation]);
            Decomposer::new(&second, &prompts, &config)
                .annotate_dependencies("objective", tasks.clone())
                .await
        };
        assert!(annotated[0].dependencies.is_empty());
        assert!(annotated[1].dependencies.is_empty());
        assert_eq!(annotated[2].dependencies.len(), 2);
    }

    #[tokio::test]
    async fn parallel_survives_a_failed_dependency_turn() {
        let generator = ScriptedGenerator::with_results([
            Ok("1. A\n2. B".to_string()),
            Err("rate limited".to_string()),
        ]);
        let plan = decompose(&generator, Strategy::Parallel).await;
        assert_eq!(plan.tasks.len(), 2);
        assert!(plan.tasks.iter().all(|t| t.dependencies.is_empty()));
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn adaptive_uses_the_hierarchical_grammar_and_config() {
        let generator = ScriptedGenerator::new(["PHASE 1: Draft\nPHASE 2: Publish"]);
        let plan = decompose(&generator, Strategy::Adaptive).await;
        assert_eq!(plan.tasks.len(), 2);
        assert!(plan.tasks[1].dependencies.contains(&plan.tasks[0].id));
        assert_eq!(plan.metadata.max_replans, 3);
        assert!(generator.prompts()[0].contains("PHASE 1: [phase name]"));
    }

    #[tokio::test]
    async fn decomposition_errors_propagate() {
        let generator = ScriptedGenerator::with_results([Err("offline".to_string())]);
        let config = EngineConfig::default();
        let prompts = PromptBuilder::new(config.prompt_budget_bytes);
        let err = Decomposer::new(&generator, &prompts, &config)
            .decompose("x", Strategy::Hierarchical)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("offline"));
    }
}
