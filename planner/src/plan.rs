use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::types::{PlanStatus, Strategy, TaskStatus};

/// Estimate used for tasks whose source text carries no effort hint.
pub const DEFAULT_TASK_DURATION_MS: u64 = 60_000;
pub const DEFAULT_REPLANNING_THRESHOLD: f64 = 0.3;
pub const DEFAULT_MAX_REPLANS: u32 = 3;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_duration")]
    pub estimated_duration_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

fn default_duration() -> u64 {
    DEFAULT_TASK_DURATION_MS
}

impl Task {
    /// Create a pending task with a freshly generated id.
    pub fn new(description: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), description)
    }

    pub fn with_id(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            dependencies: BTreeSet::new(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            priority: 0,
            estimated_duration_ms: DEFAULT_TASK_DURATION_MS,
            resource_requirements: Vec::new(),
            subtasks: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.insert(id.into());
        self
    }

    pub fn with_subtasks(mut self, subtasks: Vec<Task>) -> Self {
        self.subtasks = subtasks;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.subtasks.is_empty()
    }
}

/// Strategy and adaptive bookkeeping carried with a plan.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlanMetadata {
    pub strategy: Strategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_plan_id: Option<String>,
    #[serde(default)]
    pub replan_count: u32,
    #[serde(default = "default_threshold")]
    pub replanning_threshold: f64,
    #[serde(default = "default_max_replans")]
    pub max_replans: u32,
}

fn default_threshold() -> f64 {
    DEFAULT_REPLANNING_THRESHOLD
}

fn default_max_replans() -> u32 {
    DEFAULT_MAX_REPLANS
}

impl PlanMetadata {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            original_plan_id: None,
            replan_count: 0,
            replanning_threshold: DEFAULT_REPLANNING_THRESHOLD,
            max_replans: DEFAULT_MAX_REPLANS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub id: String,
    pub original_task: String,
    pub tasks: Vec<Task>,
    pub status: PlanStatus,
    #[serde(default)]
    pub progress: u8,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub metadata: PlanMetadata,
}

impl Plan {
    pub fn new(original_task: impl Into<String>, tasks: Vec<Task>, metadata: PlanMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            original_task: original_task.into(),
            tasks,
            status: PlanStatus::Created,
            progress: 0,
            created: now,
            updated: now,
            metadata,
        }
    }
}
