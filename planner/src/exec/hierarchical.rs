//! Depth-first execution of phase/task/subtask trees.

use anyhow::{Result, anyhow};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, info, instrument};

use crate::core::query::{counts, find_task};
use crate::core::state_update::{unmet_dependencies, with_plan_status};
use crate::core::types::{PlanStatus, TaskStatus};
use crate::exec::{Dispatch, conclude, final_status};
use crate::io::collaborator::TaskExecutor;
use crate::io::events::ProgressEvent;
use crate::plan::{Plan, Task};

/// Run top-level phases in order.
///
/// A phase with subtasks runs them in order with the same rules and
/// completes only if every subtask completes. A phase without subtasks is
/// dispatched directly. The first failed phase halts the walk. Every
/// transition is applied to the root plan, so progress always covers the
/// whole tree.
#[instrument(skip_all, fields(plan_id = %plan.id, tasks = plan.tasks.len()))]
pub async fn execute_hierarchical<X: TaskExecutor + ?Sized>(
    plan: Plan,
    dispatch: &Dispatch<'_, X>,
) -> Plan {
    let mut current = with_plan_status(&plan, PlanStatus::InProgress);
    let outcome = run_level(&mut current, dispatch, None).await;
    conclude(&current, outcome.map(|_| final_status(&current.tasks)))
}

/// Walk the children of `parent` (the top level when `None`). Resolves to
/// whether every child completed.
fn run_level<'a, X: TaskExecutor + ?Sized>(
    current: &'a mut Plan,
    dispatch: &'a Dispatch<'a, X>,
    parent: Option<&'a str>,
) -> BoxFuture<'a, Result<bool>> {
    async move {
        let order: Vec<(String, TaskStatus)> = children(current, parent)?
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

            let task = find_task(&current.tasks, &id)
                .cloned()
                .ok_or_else(|| anyhow!("task '{}' not found", id))?;

            let completed = if task.is_leaf() {
                let (next, completed) = dispatch.run_leaf(current, &id).await?;
                *current = next;
                completed
            } else {
                run_phase(current, dispatch, &task).await?
            };

            if !completed {
                info!(task_id = %id, parent = parent.unwrap_or("<root>"), "task failed, halting remaining siblings");
                break;
            }
        }

        let siblings = children(current, parent)?;
        Ok(siblings.iter().all(|task| task.status == TaskStatus::Completed))
    }
    .boxed()
}

async fn run_phase<X: TaskExecutor + ?Sized>(
    current: &mut Plan,
    dispatch: &Dispatch<'_, X>,
    phase: &Task,
) -> Result<bool> {
    dispatch.events.emit(ProgressEvent::PhaseStarted {
        task_id: phase.id.clone(),
        description: phase.description.clone(),
        subtask_count: phase.subtasks.len(),
    });
    *current = dispatch.start(current, &phase.id)?;
    debug!(task_id = %phase.id, subtasks = phase.subtasks.len(), "entering phase");

    let completed = run_level(current, dispatch, Some(phase.id.as_str())).await?;
    let subtasks = children(current, Some(phase.id.as_str()))?;
    let outcome = if completed {
        Ok(format!("completed {} subtasks", subtasks.len()))
    } else {
        Err(anyhow!(phase_failure(subtasks)))
    };

    *current = dispatch.finish(current, &phase.id, outcome)?;
    Ok(completed)
}

fn children<'p>(plan: &'p Plan, parent: Option<&str>) -> Result<&'p [Task]> {
    match parent {
        None => Ok(&plan.tasks),
        Some(id) => find_task(&plan.tasks, id)
            .map(|task| task.subtasks.as_slice())
            .ok_or_else(|| anyhow!("task '{}' not found", id)),
    }
}

fn phase_failure(subtasks: &[Task]) -> String {
    let failed: Vec<&str> = subtasks
        .iter()
        .filter(|task| task.status == TaskStatus::Failed)
        .map(|task| task.description.as_str())
        .collect();
    let counts = counts(subtasks);
    if failed.is_empty() {
        format!("{} of {} subtasks did not complete", counts.pending, counts.total())
    } else {
        format!("subtasks failed: {}", failed.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::invariants::validate_invariants;
    use crate::core::types::Strategy;
    use crate::io::events::ProgressSender;
    use crate::test_support::{ScriptedExecutor, phase, plan_with, task};

    fn status(plan: &Plan, id: &str) -> TaskStatus {
        find_task(&plan.tasks, id).expect("task").status
    }

    async fn run_with(executor: &ScriptedExecutor, plan: Plan) -> Plan {
        let events = ProgressSender::new();
        let dispatch = Dispatch::new(executor, &events);
        execute_hierarchical(plan, &dispatch).await
    }

    fn two_phase_plan() -> Plan {
        plan_with(
            vec![
                phase(
                    "p1",
                    vec![
                        task("s1", "outline"),
                        phase("t1", vec![task("s2", "draft"), task("s3", "polish").depends_on("s2")]),
                    ],
                ),
                task("p2", "publish").depends_on("p1"),
            ],
            Strategy::Hierarchical,
        )
    }

    #[tokio::test]
    async fn walks_the_tree_depth_first() {
        let executor = ScriptedExecutor::new();
        let plan = run_with(&executor, two_phase_plan()).await;
        assert_eq!(plan.status, PlanStatus::Completed);
        assert_eq!(plan.progress, 100);
        assert_eq!(
            executor.started(),
            vec!["outline", "draft", "polish", "publish"]
        );
        assert!(validate_invariants(&plan).is_empty(), "{:?}", validate_invariants(&plan));
        let p1 = find_task(&plan.tasks, "p1").expect("phase");
        assert_eq!(p1.result.as_deref(), Some("completed 2 subtasks"));
    }

    #[tokio::test]
    async fn failed_subtask_fails_its_phase_and_halts() {
        let executor = ScriptedExecutor::new().failing("draft");
        let plan = run_with(&executor, two_phase_plan()).await;
        assert_eq!(plan.status, PlanStatus::Failed);
        assert_eq!(status(&plan, "s2"), TaskStatus::Failed);
        assert_eq!(status(&plan, "s3"), TaskStatus::Pending);
        assert_eq!(status(&plan, "t1"), TaskStatus::Failed);
        assert_eq!(status(&plan, "p1"), TaskStatus::Failed);
        assert_eq!(status(&plan, "p2"), TaskStatus::Pending);
        assert!(!executor.started().contains(&"publish".to_string()));

        let p1 = find_task(&plan.tasks, "p1").expect("phase");
        assert!(p1.error.as_deref().is_some_and(|e| e.contains("t1 phase")));
        assert!(validate_invariants(&plan).is_empty(), "{:?}", validate_invariants(&plan));
    }

    #[tokio::test]
    async fn phase_start_events_are_emitted() {
        let executor = ScriptedExecutor::new();
        let events = ProgressSender::new();
        let mut rx = events.subscribe();
        let dispatch = Dispatch::new(&executor, &events);
        execute_hierarchical(two_phase_plan(), &dispatch).await;

        let mut phases = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ProgressEvent::PhaseStarted { task_id, .. } = event {
                phases.push(task_id);
            }
        }
        assert_eq!(phases, vec!["p1".to_string(), "t1".to_string()]);
    }

    #[tokio::test]
    async fn progress_events_cover_the_whole_tree() {
        let executor = ScriptedExecutor::new();
        let events = ProgressSender::new();
        let mut rx = events.subscribe();
        let dispatch = Dispatch::new(&executor, &events);
        let plan = plan_with(
            vec![
                phase("p1", vec![task("s1", "first")]),
                phase("p2", vec![task("s2", "second")]).depends_on("p1"),
            ],
            Strategy::Hierarchical,
        );
        let plan = execute_hierarchical(plan, &dispatch).await;
        assert_eq!(plan.status, PlanStatus::Completed);
        assert_eq!(plan.metadata.original_plan_id, None);

        let mut finished = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ProgressEvent::TaskFinished {
                task_id, progress, ..
            } = event
            {
                finished.push((task_id, progress));
            }
        }
        assert_eq!(
            finished,
            vec![
                ("s1".to_string(), 25),
                ("p1".to_string(), 50),
                ("s2".to_string(), 75),
                ("p2".to_string(), 100),
            ]
        );
    }
}
