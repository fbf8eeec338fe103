//! Bounded-parallel execution with event-driven readiness.
//!
//! In-flight collaborator calls live in a `FuturesUnordered` polled on the
//! caller's task. Every completion folds its outcome into the current plan
//! snapshot and immediately re-runs ready selection, so there is no polling
//! interval and no shared state beyond the single plan binding.

use std::future::Future;

use anyhow::{Result, anyhow};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tracing::{debug, instrument, warn};

use crate::core::query::find_task;
use crate::core::selector::{blocked_by_failure, select_ready};
use crate::core::state_update::with_plan_status;
use crate::core::types::PlanStatus;
use crate::exec::{Dispatch, conclude, final_status, pending_ids};
use crate::io::collaborator::TaskExecutor;
use crate::plan::Plan;

/// Run top-level tasks concurrently, never more than `max_parallel_tasks` at once.
///
/// When nothing is in flight and no pending task can start, the plan fails
/// immediately and the stuck tasks stay `pending`.
#[instrument(skip_all, fields(plan_id = %plan.id, tasks = plan.tasks.len(), max_parallel_tasks = max_parallel_tasks))]
pub async fn execute_parallel<X: TaskExecutor + ?Sized>(
    plan: Plan,
    dispatch: &Dispatch<'_, X>,
    max_parallel_tasks: usize,
) -> Plan {
    let mut current = with_plan_status(&plan, PlanStatus::InProgress);
    let outcome = run(&mut current, dispatch, max_parallel_tasks.max(1)).await;
    conclude(&current, outcome)
}

async fn run<X: TaskExecutor + ?Sized>(
    current: &mut Plan,
    dispatch: &Dispatch<'_, X>,
    max_parallel_tasks: usize,
) -> Result<PlanStatus> {
    let mut pending = pending_ids(current);
    let mut in_flight = FuturesUnordered::new();

    loop {
        let capacity = max_parallel_tasks.saturating_sub(in_flight.len());
        for id in select_ready(current, &pending, capacity) {
            pending.retain(|p| p != &id);
            *current = dispatch.start(current, &id)?;
            let description = find_task(&current.tasks, &id)
                .map(|task| task.description.clone())
                .ok_or_else(|| anyhow!("task '{}' not found", id))?;
            debug!(task_id = %id, in_flight = in_flight.len() + 1, "dispatching");
            in_flight.push(call(dispatch.executor, id, description));
        }

        let Some((id, outcome)) = in_flight.next().await else {
            if pending.is_empty() {
                break;
            }
            let blocked = blocked_by_failure(current, &pending);
            if blocked.len() == pending.len() {
                warn!(stuck = ?pending, "remaining tasks blocked by failed dependencies");
            } else {
                warn!(stuck = ?pending, "deadlock: no pending task can ever start");
            }
            return Ok(PlanStatus::Failed);
        };
        *current = dispatch.finish(current, &id, outcome)?;
    }

    Ok(final_status(&current.tasks))
}

fn call<'a, X: TaskExecutor + ?Sized>(
    executor: &'a X,
    id: String,
    description: String,
) -> impl Future<Output = (String, Result<String>)> + 'a {
    async move {
        let outcome = executor.execute(&description).await;
        (id, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Strategy, TaskStatus};
    use crate::io::events::ProgressSender;
    use crate::test_support::{ExecEvent, ScriptedExecutor, plan_with, task};

    fn status(plan: &Plan, id: &str) -> TaskStatus {
        find_task(&plan.tasks, id).expect("task").status
    }

    async fn run_with(executor: &ScriptedExecutor, plan: Plan, cap: usize) -> Plan {
        let events = ProgressSender::new();
        execute_parallel(plan, &Dispatch::new(executor, &events), cap).await
    }

    #[tokio::test]
    async fn never_exceeds_the_concurrency_cap() {
        let executor = ScriptedExecutor::new().with_default_delay(20);
        let tasks = (0..7)
            .map(|i| task(&format!("t{i}"), &format!("task {i}")))
            .collect();
        let plan = run_with(&executor, plan_with(tasks, Strategy::Parallel), 3).await;
        assert_eq!(plan.status, PlanStatus::Completed);
        assert_eq!(executor.call_count(), 7);
        assert_eq!(executor.max_concurrency(), 3);
    }

    #[tokio::test]
    async fn join_task_waits_for_all_dependencies() {
        let executor = ScriptedExecutor::new()
            .with_delay("A", 30)
            .with_delay("B", 5);
        let plan = plan_with(
            vec![
                task("c", "C").depends_on("a").depends_on("b"),
                task("a", "A"),
                task("b", "B"),
            ],
            Strategy::Parallel,
        );
        let plan = run_with(&executor, plan, 3).await;
        assert_eq!(plan.status, PlanStatus::Completed);

        let log = executor.log();
        let c_started = log
            .iter()
            .position(|e| e == &ExecEvent::Started("C".to_string()))
            .expect("C started");
        for dep in ["A", "B"] {
            let finished = log
                .iter()
                .position(|e| e == &ExecEvent::Finished(dep.to_string()))
                .expect("dep finished");
            assert!(finished < c_started, "{dep} must finish before C starts");
        }
    }

    #[tokio::test]
    async fn higher_priority_starts_first() {
        let executor = ScriptedExecutor::new();
        let mut urgent = task("u", "urgent");
        urgent.priority = 5;
        let plan = plan_with(vec![task("a", "first"), urgent], Strategy::Parallel);
        run_with(&executor, plan, 1).await;
        assert_eq!(executor.started(), vec!["urgent", "first"]);
    }

    #[tokio::test]
    async fn missing_dependency_is_a_deadlock() {
        let executor = ScriptedExecutor::new();
        let plan = plan_with(
            vec![task("a", "A"), task("b", "B").depends_on("ghost")],
            Strategy::Parallel,
        );
        let plan = run_with(&executor, plan, 2).await;
        assert_eq!(plan.status, PlanStatus::Failed);
        assert_eq!(status(&plan, "a"), TaskStatus::Completed);
        assert_eq!(status(&plan, "b"), TaskStatus::Pending);
    }

    #[tokio::test]
    async fn cycles_and_self_references_deadlock() {
        let executor = ScriptedExecutor::new();
        let plan = plan_with(
            vec![
                task("a", "A").depends_on("b"),
                task("b", "B").depends_on("a"),
                task("s", "S").depends_on("s"),
            ],
            Strategy::Parallel,
        );
        let plan = run_with(&executor, plan, 2).await;
        assert_eq!(plan.status, PlanStatus::Failed);
        assert_eq!(executor.call_count(), 0);
        assert!(plan.tasks.iter().all(|t| t.status == TaskStatus::Pending));
    }

    #[tokio::test]
    async fn sibling_failure_does_not_cancel_others() {
        let executor = ScriptedExecutor::new().failing("A");
        let plan = plan_with(
            vec![
                task("a", "A"),
                task("b", "B"),
                task("c", "C").depends_on("a"),
            ],
            Strategy::Parallel,
        );
        let plan = run_with(&executor, plan, 2).await;
        assert_eq!(plan.status, PlanStatus::Failed);
        assert_eq!(status(&plan, "a"), TaskStatus::Failed);
        assert_eq!(status(&plan, "b"), TaskStatus::Completed);
        assert_eq!(status(&plan, "c"), TaskStatus::Pending);
    }
}
