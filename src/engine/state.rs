// ABOUTME: Per-task execution state and the legal status transitions
// ABOUTME: TaskState is owned by the runner and only changes along pending -> running -> terminal

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Skipped,
    Success,
    Error,
}

impl TaskStatus {
    /// Terminal statuses never change again within a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Skipped | TaskStatus::Success | TaskStatus::Error
        )
    }

    /// Success or skipped: the task's target is in the desired state.
    pub fn is_settled(&self) -> bool {
        matches!(self, TaskStatus::Skipped | TaskStatus::Success)
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Skipped)
                | (TaskStatus::Running, TaskStatus::Success)
                | (TaskStatus::Running, TaskStatus::Error)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Skipped => write!(f, "skipped"),
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskState {
    pub status: TaskStatus,
    pub message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Task states keyed by task key, in registration order.
pub type TaskStateMap = IndexMap<String, TaskState>;

impl TaskState {
    pub fn new() -> Self {
        Self {
            status: TaskStatus::Pending,
            message: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_running(&mut self) -> Result<()> {
        self.transition(TaskStatus::Running, None)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_skipped(&mut self, reason: String) -> Result<()> {
        self.transition(TaskStatus::Skipped, Some(reason))?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_success(&mut self) -> Result<()> {
        self.transition(TaskStatus::Success, None)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_error(&mut self, message: String) -> Result<()> {
        self.transition(TaskStatus::Error, Some(message))?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, next: TaskStatus, message: Option<String>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.message = message;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall time between start and finish. Skipped tasks never start.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).to_std().unwrap_or(Duration::ZERO)),
            _ => None,
        }
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_lifecycle() {
        let mut state = TaskState::new();
        assert_eq!(state.status, TaskStatus::Pending);
        assert!(!state.is_finished());

        state.mark_running().unwrap();
        assert_eq!(state.status, TaskStatus::Running);
        assert!(state.started_at.is_some());
        assert!(!state.is_finished());

        state.mark_success().unwrap();
        assert_eq!(state.status, TaskStatus::Success);
        assert!(state.is_finished());
        assert!(state.duration().is_some());
    }

    #[test]
    fn test_skip_records_reason() {
        let mut state = TaskState::new();
        state.mark_skipped("Already exists".to_string()).unwrap();

        assert_eq!(state.status, TaskStatus::Skipped);
        assert_eq!(state.message.as_deref(), Some("Already exists"));
        assert!(state.started_at.is_none());
        assert!(state.duration().is_none());
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut state = TaskState::new();
        assert!(matches!(
            state.mark_success(),
            Err(EngineError::IllegalTransition {
                from: TaskStatus::Pending,
                to: TaskStatus::Success
            })
        ));

        state.mark_running().unwrap();
        assert!(state.mark_skipped("late".to_string()).is_err());
        assert!(state.mark_running().is_err());

        state.mark_error("boom".to_string()).unwrap();
        assert!(state.mark_success().is_err());
        assert_eq!(state.status, TaskStatus::Error);
        assert_eq!(state.message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TaskStatus::Skipped).unwrap();
        assert_eq!(json, "\"skipped\"");
        assert_eq!(TaskStatus::Error.to_string(), "error");
    }
}
