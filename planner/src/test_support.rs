//! Test-only builders for tasks and plans, plus scripted collaborators.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::core::query::compute_progress;
use crate::core::types::{Strategy, TaskStatus};
use crate::io::collaborator::{TaskExecutor, TextGenerator};
use crate::plan::{Plan, PlanMetadata, Task};

/// Create a pending task with a fixed id.
pub fn task(id: &str, description: &str) -> Task {
    Task::with_id(id, description)
}

/// Create a pending parent task whose description is `"{id} phase"`.
pub fn phase(id: &str, subtasks: Vec<Task>) -> Task {
    Task::with_id(id, format!("{} phase", id)).with_subtasks(subtasks)
}

/// Force a task into a terminal status with a deterministic payload.
///
/// Completed tasks get `result = "done: {description}"`, failed tasks get
/// `error = "failed: {description}"`.
pub fn finished(mut task: Task, status: TaskStatus) -> Task {
    task.status = status;
    match status {
        TaskStatus::Completed => task.result = Some(format!("done: {}", task.description)),
        TaskStatus::Failed => task.error = Some(format!("failed: {}", task.description)),
        TaskStatus::Pending | TaskStatus::InProgress => {}
    }
    task
}

/// A sequential plan over `tasks` with progress already computed.
pub fn plan_of(tasks: Vec<Task>) -> Plan {
    plan_with(tasks, Strategy::Sequential)
}

pub fn plan_with(tasks: Vec<Task>, strategy: Strategy) -> Plan {
    let mut plan = Plan::new("objective", tasks, PlanMetadata::new(strategy));
    plan.progress = compute_progress(&plan.tasks);
    plan
}

/// Text generator that replays canned responses in order and records prompts.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Every call succeeds with the next response.
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(responses.into_iter().map(|r| Ok(r.into())))
    }

    /// `Err(message)` entries make the corresponding call fail.
    pub fn with_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<String, String>>,
    {
        Self {
            responses: Mutex::new(results.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .map_err(|_| anyhow!("prompt log poisoned"))?
            .push(prompt.to_string());
        let next = self
            .responses
            .lock()
            .map_err(|_| anyhow!("response queue poisoned"))?
            .pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted generator exhausted")),
        }
    }
}

/// One entry in the [`ScriptedExecutor`] call log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecEvent {
    Started(String),
    Finished(String),
}

/// Task executor with per-description failures and delays.
///
/// Successful calls return `"done: {description}"`. The executor records an
/// ordered start/finish log and the peak number of concurrent calls.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    failures: HashSet<String>,
    fail_all: bool,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    log: Mutex<Vec<ExecEvent>>,
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call whose description equals `description`.
    pub fn failing(mut self, description: &str) -> Self {
        self.failures.insert(description.to_string());
        self
    }

    pub fn failing_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    pub fn with_delay(mut self, description: &str, millis: u64) -> Self {
        self.delays
            .insert(description.to_string(), Duration::from_millis(millis));
        self
    }

    pub fn with_default_delay(mut self, millis: u64) -> Self {
        self.default_delay = Duration::from_millis(millis);
        self
    }

    pub fn log(&self) -> Vec<ExecEvent> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Descriptions in the order their calls started.
    pub fn started(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|event| match event {
                ExecEvent::Started(desc) => Some(desc),
                ExecEvent::Finished(_) => None,
            })
            .collect()
    }

    pub fn max_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self, event: ExecEvent) {
        if let Ok(mut log) = self.log.lock() {
            log.push(event);
        }
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn execute(&self, description: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.record(ExecEvent::Started(description.to_string()));

        let delay = self
            .delays
            .get(description)
            .copied()
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.current.fetch_sub(1, Ordering::SeqCst);
        self.record(ExecEvent::Finished(description.to_string()));

        if self.fail_all || self.failures.contains(description) {
            return Err(anyhow!("scripted failure: {}", description));
        }
        Ok(format!("done: {}", description))
    }
}
