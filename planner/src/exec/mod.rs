//! Strategy executors.
//!
//! Every executor takes a plan snapshot and returns the executed plan with a
//! status of exactly `completed` or `failed`. Collaborator failures are
//! recorded on the task that caused them. Internal transition errors are
//! logged and turn the plan `failed`; nothing propagates out as an `Err`.

use anyhow::{Result, anyhow};
use tracing::{debug, error, warn};

use crate::core::query::find_task;
use crate::core::state_update::{apply_task_update, with_plan_status};
use crate::core::types::{PlanStatus, TaskStatus, TaskUpdate};
use crate::io::collaborator::TaskExecutor;
use crate::io::events::{ProgressEvent, ProgressSender};
use crate::plan::{Plan, Task};

pub mod adaptive;
pub mod hierarchical;
pub mod parallel;
pub mod sequential;

pub use adaptive::execute_adaptive;
pub use hierarchical::execute_hierarchical;
pub use parallel::execute_parallel;
pub use sequential::execute_sequential;

/// Error text recorded on a task whose dependencies were not completed when reached.
pub const DEPENDENCIES_NOT_SATISFIED: &str = "dependencies not satisfied";

/// The execution collaborator plus the progress channel, shared by all executors.
pub struct Dispatch<'a, X: ?Sized> {
    pub executor: &'a X,
    pub events: &'a ProgressSender,
}

impl<'a, X: TaskExecutor + ?Sized> Dispatch<'a, X> {
    pub fn new(executor: &'a X, events: &'a ProgressSender) -> Self {
        Self { executor, events }
    }

    /// `pending -> in_progress`, announcing the task.
    pub fn start(&self, plan: &Plan, task_id: &str) -> Result<Plan> {
        let next = apply_task_update(plan, task_id, TaskUpdate::Start).map_err(|e| anyhow!(e))?;
        if let Some(task) = find_task(&next.tasks, task_id) {
            self.events.emit(ProgressEvent::TaskStarted {
                task_id: task.id.clone(),
                description: task.description.clone(),
            });
        }
        Ok(next)
    }

    /// Record a collaborator outcome as `completed` or `failed`.
    pub fn finish(&self, plan: &Plan, task_id: &str, outcome: Result<String>) -> Result<Plan> {
        let update = match outcome {
            Ok(result) => TaskUpdate::Complete(result),
            Err(err) => {
                warn!(task_id, err = %format!("{err:#}"), "task failed");
                TaskUpdate::Fail(format!("{err:#}"))
            }
        };
        let status = update.target();
        let next = apply_task_update(plan, task_id, update).map_err(|e| anyhow!(e))?;
        self.events.emit(ProgressEvent::TaskFinished {
            task_id: task_id.to_string(),
            status,
            progress: next.progress,
        });
        Ok(next)
    }

    /// Fail a task whose dependencies are unmet without calling the collaborator.
    pub fn fail_unmet(&self, plan: &Plan, task_id: &str, unmet: &[String]) -> Result<Plan> {
        warn!(task_id, unmet = ?unmet, "dependencies not satisfied");
        let started = apply_task_update(plan, task_id, TaskUpdate::Start).map_err(|e| anyhow!(e))?;
        self.finish(
            &started,
            task_id,
            Err(anyhow!("{}: {}", DEPENDENCIES_NOT_SATISFIED, unmet.join(", "))),
        )
    }

    /// Start a task, hand its description to the collaborator and record the
    /// outcome. Returns the new snapshot and whether the task completed.
    pub async fn run_leaf(&self, plan: &Plan, task_id: &str) -> Result<(Plan, bool)> {
        let started = self.start(plan, task_id)?;
        let description = find_task(&started.tasks, task_id)
            .map(|task| task.description.clone())
            .ok_or_else(|| anyhow!("task '{}' not found", task_id))?;
        let outcome = self.executor.execute(&description).await;
        let completed = outcome.is_ok();
        let next = self.finish(&started, task_id, outcome)?;
        Ok((next, completed))
    }
}

/// Final status from the top-level tasks: completed iff all of them completed.
pub(crate) fn final_status(tasks: &[Task]) -> PlanStatus {
    if tasks.iter().all(|task| task.status == TaskStatus::Completed) {
        PlanStatus::Completed
    } else {
        PlanStatus::Failed
    }
}

/// Close out a plan after an executor loop returned.
pub(crate) fn conclude(plan: &Plan, outcome: Result<PlanStatus>) -> Plan {
    match outcome {
        Ok(status) => {
            debug!(plan_id = %plan.id, status = %status, progress = plan.progress, "plan finished");
            with_plan_status(plan, status)
        }
        Err(err) => {
            error!(plan_id = %plan.id, err = %format!("{err:#}"), "internal scheduling error");
            with_plan_status(plan, PlanStatus::Failed)
        }
    }
}

/// Top-level ids still `pending`, in declaration order.
pub(crate) fn pending_ids(plan: &Plan) -> Vec<String> {
    plan.tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Pending)
        .map(|task| task.id.clone())
        .collect()
}
