//! Shared deterministic types for planner core logic.
//!
//! These types define stable contracts between the parser, the executors and
//! the renderers. They carry no I/O and serialize to stable lowercase names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a single task: `pending -> in_progress -> {completed | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a plan: `created -> in_progress -> {completed | failed | replanning}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Created,
    InProgress,
    Completed,
    Failed,
    Replanning,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Created => "created",
            PlanStatus::InProgress => "in_progress",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
            PlanStatus::Replanning => "replanning",
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Planning and execution discipline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Flat list, one task after another.
    Sequential,
    /// Flat list with elicited dependencies, bounded concurrency.
    Parallel,
    /// Phase/task/subtask tree, executed depth-first.
    Hierarchical,
    /// Hierarchical with failure-driven replanning.
    #[default]
    Adaptive,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Sequential => "sequential",
            Strategy::Parallel => "parallel",
            Strategy::Hierarchical => "hierarchical",
            Strategy::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Strategy::Sequential),
            "parallel" => Ok(Strategy::Parallel),
            "hierarchical" => Ok(Strategy::Hierarchical),
            "adaptive" => Ok(Strategy::Adaptive),
            other => Err(format!(
                "unknown strategy '{other}' (expected sequential, parallel, hierarchical or adaptive)"
            )),
        }
    }
}

/// A requested status transition for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskUpdate {
    /// `pending -> in_progress`.
    Start,
    /// `in_progress -> completed` with the collaborator's result text.
    Complete(String),
    /// `in_progress -> failed` with an error message.
    Fail(String),
}

impl TaskUpdate {
    pub fn target(&self) -> TaskStatus {
        match self {
            TaskUpdate::Start => TaskStatus::InProgress,
            TaskUpdate::Complete(_) => TaskStatus::Completed,
            TaskUpdate::Fail(_) => TaskStatus::Failed,
        }
    }
}

/// Status counts over a flattened plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.completed + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!("Parallel".parse::<Strategy>(), Ok(Strategy::Parallel));
        assert_eq!(" adaptive ".parse::<Strategy>(), Ok(Strategy::Adaptive));
        let err = "greedy".parse::<Strategy>().unwrap_err();
        assert!(err.contains("greedy"));
    }

    #[test]
    fn statuses_serialize_as_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).expect("serialize");
        assert_eq!(json, "\"in_progress\"");
        let json = serde_json::to_string(&PlanStatus::Replanning).expect("serialize");
        assert_eq!(json, "\"replanning\"");
    }
}
