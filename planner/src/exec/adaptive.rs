//! Hierarchical execution with failure-driven replanning.

use tracing::{info, instrument, warn};

use crate::core::state_update::with_plan_status;
use crate::core::types::PlanStatus;
use crate::exec::{Dispatch, execute_hierarchical};
use crate::io::collaborator::{TaskExecutor, TextGenerator};
use crate::io::events::ProgressEvent;
use crate::plan::Plan;
use crate::replan::{ReplanDecision, Replanner, replan_decision};

/// Run the plan hierarchically; while it fails above its threshold and the
/// replan cap allows, mark it `replanning`, ask for a revision and run that.
///
/// A revision request that errors or yields no tasks ends the loop with the
/// last failed plan.
#[instrument(skip_all, fields(plan_id = %plan.id, max_replans = plan.metadata.max_replans))]
pub async fn execute_adaptive<X, G>(
    plan: Plan,
    dispatch: &Dispatch<'_, X>,
    replanner: &Replanner<'_, G>,
) -> Plan
where
    X: TaskExecutor + ?Sized,
    G: TextGenerator + ?Sized,
{
    let mut current = plan;
    loop {
        let executed = execute_hierarchical(current, dispatch).await;
        let ratio = match replan_decision(&executed) {
            ReplanDecision::Completed => return executed,
            ReplanDecision::BelowThreshold { ratio } => {
                info!(ratio, threshold = executed.metadata.replanning_threshold, "failure ratio below threshold, not replanning");
                return executed;
            }
            ReplanDecision::Exhausted { ratio } => {
                warn!(ratio, replan_count = executed.metadata.replan_count, "replanning budget exhausted");
                return executed;
            }
            ReplanDecision::Replan { ratio } => ratio,
        };

        let replanning = with_plan_status(&executed, PlanStatus::Replanning);
        dispatch.events.emit(ProgressEvent::Replanning {
            plan_id: replanning.id.clone(),
            replan_count: replanning.metadata.replan_count + 1,
            failure_ratio: ratio,
        });

        match replanner.replan(&replanning).await {
            Ok(next) if !next.tasks.is_empty() => current = next,
            Ok(_) => {
                warn!(plan_id = %replanning.id, "revised plan is empty, keeping failed plan");
                return with_plan_status(&replanning, PlanStatus::Failed);
            }
            Err(err) => {
                warn!(plan_id = %replanning.id, err = %format!("{err:#}"), "replanning failed, keeping failed plan");
                return with_plan_status(&replanning, PlanStatus::Failed);
            }
        }
    }
}
