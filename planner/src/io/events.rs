//! Progress notifications for subscribers (CLI output, UIs).
//!
//! # Separation of Concerns
//!
//! - **Tracing (`logging`)**: dev diagnostics via `RUST_LOG`, output to stderr.
//! - **Progress events (this module)**: product channel describing what the
//!   engine is doing. Fire-and-forget; a send with no subscriber is not an
//!   error and never changes control flow.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::core::types::TaskStatus;

const CHANNEL_CAPACITY: usize = 256;

/// Engine progress notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    PlanCreated {
        plan_id: String,
        task_count: usize,
    },
    PhaseStarted {
        task_id: String,
        description: String,
        subtask_count: usize,
    },
    TaskStarted {
        task_id: String,
        description: String,
    },
    TaskFinished {
        task_id: String,
        status: TaskStatus,
        progress: u8,
    },
    Replanning {
        plan_id: String,
        replan_count: u32,
        failure_ratio: f64,
    },
}

impl ProgressEvent {
    /// Human-readable one-line rendering.
    pub fn message(&self) -> String {
        match self {
            ProgressEvent::PlanCreated { task_count, .. } => {
                format!("Created plan with {} top-level tasks", task_count)
            }
            ProgressEvent::PhaseStarted {
                description,
                subtask_count,
                ..
            } => format!(
                "Starting phase: {} ({} subtasks)",
                description, subtask_count
            ),
            ProgressEvent::TaskStarted { description, .. } => {
                format!("Executing task: {}", description)
            }
            ProgressEvent::TaskFinished {
                task_id,
                status,
                progress,
            } => format!("Task {} {} ({}% complete)", task_id, status, progress),
            ProgressEvent::Replanning {
                replan_count,
                failure_ratio,
                ..
            } => format!(
                "Replanning (attempt {}) after {:.0}% of tasks failed",
                replan_count,
                failure_ratio * 100.0
            ),
        }
    }
}

/// Cloneable handle that broadcasts [`ProgressEvent`]s.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: Arc<broadcast::Sender<ProgressEvent>>,
}

impl Default for ProgressSender {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSender {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ProgressEvent) {
        info!(event = %event.message(), "progress");
        // Err only means there are no receivers.
        let _ = self.tx.send(event);
    }
}
