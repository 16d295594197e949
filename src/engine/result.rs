// ABOUTME: Run report aggregating final task states into a summary
// ABOUTME: Distinguishes clean success, completion with absorbed task errors, and halts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::completion::{Completion, TaskFailure};
use super::runner::FailurePolicy;
use super::snapshot::{GroupSnapshot, RunSnapshot, TaskSnapshot};
use super::state::TaskStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// Continue-on-error run that exhausted the list with failed tasks.
    CompletedWithErrors,
    Halted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RunSummary {
    pub total_tasks: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub name: String,
    pub policy: FailurePolicy,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    pub tasks: Vec<TaskSnapshot>,
    pub groups: Vec<GroupSnapshot>,
    pub summary: RunSummary,
    pub error: Option<TaskFailure>,
}

impl RunReport {
    pub fn new(
        run_id: String,
        name: String,
        policy: FailurePolicy,
        start_time: DateTime<Utc>,
        snapshot: &RunSnapshot,
        completion: &Completion,
    ) -> Self {
        let end_time = Utc::now();
        let summary = RunSummary::from_tasks(&snapshot.tasks);

        let status = match completion {
            Completion::Halted(_) => RunStatus::Halted,
            Completion::Finished if summary.failed > 0 => RunStatus::CompletedWithErrors,
            Completion::Finished => RunStatus::Success,
        };

        Self {
            run_id,
            name,
            policy,
            status,
            start_time,
            end_time,
            duration: (end_time - start_time).to_std().unwrap_or(Duration::ZERO),
            tasks: snapshot.tasks.clone(),
            groups: snapshot.groups.clone(),
            summary,
            error: completion.error().cloned(),
        }
    }

    pub fn task(&self, key: &str) -> Option<&TaskSnapshot> {
        self.tasks.iter().find(|t| t.key == key)
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn failed_tasks(&self) -> Vec<&TaskSnapshot> {
        self.tasks
            .iter()
            .filter(|t| t.state.status == TaskStatus::Error)
            .collect()
    }
}

impl RunSummary {
    pub fn from_tasks(tasks: &[TaskSnapshot]) -> Self {
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.state.status == status).count();

        Self {
            total_tasks: tasks.len(),
            succeeded: count(TaskStatus::Success),
            skipped: count(TaskStatus::Skipped),
            failed: count(TaskStatus::Error),
            pending: count(TaskStatus::Pending),
        }
    }

    /// Tasks that reached a terminal state.
    pub fn finished(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::CompletedWithErrors => write!(f, "completed_with_errors"),
            RunStatus::Halted => write!(f, "halted"),
        }
    }
}
