//! One task after another in declaration order.

use anyhow::{Result, anyhow};
use tracing::{debug, instrument};

use crate::core::state_update::{unmet_dependencies, with_plan_status};
use crate::core::types::{PlanStatus, TaskStatus};
use crate::exec::{Dispatch, conclude, final_status};
use crate::io::collaborator::TaskExecutor;
use crate::plan::Plan;

/// Run top-level tasks in order.
///
/// A task whose dependencies are not completed fails without a collaborator
/// call and the walk continues. A collaborator failure stops the walk; the
/// remaining tasks stay `pending`.
#[instrument(skip_all, fields(plan_id = %plan.id, tasks = plan.tasks.len()))]
pub async fn execute_sequential<X: TaskExecutor + ?Sized>(plan: Plan, dispatch: &Dispatch<'_, X>) -> Plan {
    let mut current = with_plan_status(&plan, PlanStatus::InProgress);
    let outcome = run(&mut current, dispatch).await;
    conclude(&current, outcome)
}

async fn run<X: TaskExecutor + ?Sized>(current: &mut Plan, dispatch: &Dispatch<'_, X>) -> Result<PlanStatus> {
    let order: Vec<(String, TaskStatus)> = current
        .tasks
        .iter()
        .map(|task| (task.id.clone(), task.status))
        .collect();

    for (id, status) in order {
        if status != TaskStatus::Pending {
            continue;
        }
        let unmet = unmet_dependencies(current, &id).map_err(|e| anyhow!(e))?;
        if !unmet.is_empty() {
            *current = dispatch.fail_unmet(current, &id, &unmet)?;
            continue;
        }

        let (next, completed) = dispatch.run_leaf(current, &id).await?;
        *current = next;
        if !completed {
            debug!(task_id = %id, "task failed, abandoning remaining sequence");
            break;
        }
    }

    Ok(final_status(&current.tasks))
}
