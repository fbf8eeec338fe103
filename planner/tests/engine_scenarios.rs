//! End-to-end engine scenarios driven by scripted collaborators.

use planner::core::types::{PlanStatus, Strategy, TaskStatus};
use planner::engine::Engine;
use planner::io::config::EngineConfig;
use planner::io::events::ProgressEvent;
use planner::test_support::{ExecEvent, ScriptedExecutor, ScriptedGenerator, plan_with, task};

fn config(strategy: Strategy) -> EngineConfig {
    EngineConfig {
        strategy,
        ..EngineConfig::default()
    }
}

fn position(log: &[ExecEvent], event: &ExecEvent) -> usize {
    log.iter()
        .position(|entry| entry == event)
        .unwrap_or_else(|| panic!("missing {event:?} in {log:?}"))
}

#[tokio::test]
async fn blog_post_sequential_run_stops_at_first_failure() {
    let generator = ScriptedGenerator::new([
        "1. Draft outline\n2. Write draft\n3. Edit draft",
        "The draft could not be written.",
    ]);
    let executor = ScriptedExecutor::new().failing("Write draft");
    let engine = Engine::new(generator, executor, config(Strategy::Sequential));

    let outcome = engine
        .run("Write and publish a blog post")
        .await
        .expect("run");

    let plan = &outcome.plan;
    assert_eq!(plan.status, PlanStatus::Failed);
    assert_eq!(plan.tasks.len(), 3);
    assert!(plan.tasks[1].dependencies.contains(&plan.tasks[0].id));
    assert!(plan.tasks[2].dependencies.contains(&plan.tasks[1].id));
    assert_eq!(plan.tasks[0].status, TaskStatus::Completed);
    assert_eq!(plan.tasks[1].status, TaskStatus::Failed);
    assert_eq!(plan.tasks[2].status, TaskStatus::Pending);
    assert_eq!(plan.progress, 33);
    assert_eq!(engine.executor().started(), vec!["Draft outline", "Write draft"]);
    assert_eq!(outcome.summary, "The draft could not be written.");
}

#[tokio::test]
async fn parallel_run_never_exceeds_the_cap() {
    let generator = ScriptedGenerator::new(Vec::<String>::new());
    let executor = ScriptedExecutor::new().with_default_delay(20);
    let engine = Engine::new(
        generator,
        executor,
        EngineConfig {
            max_parallel_tasks: 2,
            ..config(Strategy::Parallel)
        },
    );
    let plan = plan_with(
        (1..=6)
            .map(|n| task(&format!("t{n}"), &format!("task {n}")))
            .collect(),
        Strategy::Parallel,
    );

    let plan = engine.execute_plan(plan).await;
    assert_eq!(plan.status, PlanStatus::Completed);
    assert_eq!(plan.progress, 100);
    assert_eq!(engine.executor().call_count(), 6);
    assert!(engine.executor().max_concurrency() <= 2);
    assert_eq!(engine.executor().max_concurrency(), 2);
}

#[tokio::test]
async fn join_task_starts_only_after_both_inputs_complete() {
    let generator = ScriptedGenerator::new(Vec::<String>::new());
    let executor = ScriptedExecutor::new()
        .with_delay("A", 40)
        .with_delay("B", 10);
    let engine = Engine::new(generator, executor, config(Strategy::Parallel));
    let plan = plan_with(
        vec![
            task("a", "A"),
            task("b", "B"),
            task("c", "C").depends_on("a").depends_on("b"),
        ],
        Strategy::Parallel,
    );

    let plan = engine.execute_plan(plan).await;
    assert_eq!(plan.status, PlanStatus::Completed);

    let log = engine.executor().log();
    let c_started = position(&log, &ExecEvent::Started("C".to_string()));
    assert!(position(&log, &ExecEvent::Finished("A".to_string())) < c_started);
    assert!(position(&log, &ExecEvent::Finished("B".to_string())) < c_started);
}

#[tokio::test]
async fn unsatisfiable_dependencies_fail_the_parallel_plan() {
    let cases = vec![
        ("missing id", vec![task("a", "A").depends_on("ghost")]),
        (
            "cycle",
            vec![task("a", "A").depends_on("b"), task("b", "B").depends_on("a")],
        ),
        ("self reference", vec![task("a", "A").depends_on("a")]),
    ];

    for (name, tasks) in cases {
        let engine = Engine::new(
            ScriptedGenerator::new(Vec::<String>::new()),
            ScriptedExecutor::new(),
            config(Strategy::Parallel),
        );
        let plan = engine
            .execute_plan(plan_with(tasks, Strategy::Parallel))
            .await;
        assert_eq!(plan.status, PlanStatus::Failed, "{name}");
        assert_eq!(engine.executor().call_count(), 0, "{name}");
    }
}

#[tokio::test]
async fn hierarchical_run_parses_phases_and_executes_leaves() {
    let generator = ScriptedGenerator::new([
        "PHASE 1: X\n- Description: d\nTASK 1.1: Y\n- Description: e\n- Estimated effort: High\nPHASE 2: Z",
        "Both phases finished.",
    ]);
    let engine = Engine::new(generator, ScriptedExecutor::new(), config(Strategy::Hierarchical));

    let outcome = engine.run("objective").await.expect("run");
    let plan = &outcome.plan;
    assert_eq!(plan.status, PlanStatus::Completed);
    assert_eq!(plan.progress, 100);
    assert_eq!(plan.tasks.len(), 2);
    assert_eq!(plan.tasks[0].description, "X: d");
    assert_eq!(plan.tasks[0].subtasks.len(), 1);
    assert_eq!(plan.tasks[0].subtasks[0].estimated_duration_ms, 900_000);
    assert!(plan.tasks[1].dependencies.contains(&plan.tasks[0].id));
    assert_eq!(engine.executor().started(), vec!["Y: e", "Z"]);
}

#[tokio::test]
async fn adaptive_run_replans_a_bounded_number_of_times() {
    let generator = ScriptedGenerator::new([
        "PHASE 1: Build",
        "PHASE 1: Build again",
        "PHASE 1: Build once more",
        "Nothing worked.",
    ]);
    let engine = Engine::new(
        generator,
        ScriptedExecutor::new().failing_all(),
        EngineConfig {
            max_replans: 2,
            ..config(Strategy::Adaptive)
        },
    );
    let mut events = engine.subscribe();

    let outcome = engine.run("objective").await.expect("run");
    assert_eq!(outcome.plan.status, PlanStatus::Failed);
    assert_eq!(outcome.plan.metadata.replan_count, 2);
    assert_eq!(engine.executor().call_count(), 3);
    assert_eq!(engine.generator().call_count(), 4);
    assert_eq!(outcome.summary, "Nothing worked.");

    let mut replans = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, ProgressEvent::Replanning { .. }) {
            replans += 1;
        }
    }
    assert_eq!(replans, 2);
}

#[tokio::test]
async fn progress_events_follow_the_run() {
    let generator = ScriptedGenerator::new(["1. only step", "done"]);
    let engine = Engine::new(generator, ScriptedExecutor::new(), config(Strategy::Sequential));
    let mut events = engine.subscribe();

    engine.run("objective").await.expect("run");

    let mut messages = Vec::new();
    while let Ok(event) = events.try_recv() {
        messages.push(event.message());
    }
    assert_eq!(messages.first().map(String::as_str), Some("Created plan with 1 top-level tasks"));
    assert!(messages.contains(&"Executing task: only step".to_string()));
    assert!(messages.last().is_some_and(|m| m.ends_with("completed (100% complete)")));
}
