// ABOUTME: Error types for the task orchestration engine
// ABOUTME: Covers registration misuse, illegal state transitions, and task action failures

use thiserror::Error;

use super::state::TaskStatus;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Duplicate task key: {task_key}")]
    DuplicateTaskKey { task_key: String },

    #[error("Duplicate group key: {group_key}")]
    DuplicateGroupKey { group_key: String },

    #[error("Task '{task_key}' references undeclared group '{group_key}'")]
    UnknownGroup { task_key: String, group_key: String },

    #[error("Illegal task state transition: {from} -> {to}")]
    IllegalTransition { from: TaskStatus, to: TaskStatus },

    #[error("Task not found: {task_key}")]
    TaskNotFound { task_key: String },

    #[error("Join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

/// Failure returned by a task action. The message is recorded verbatim in the
/// task's state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TaskActionError {
    pub message: String,
}

impl TaskActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for TaskActionError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for TaskActionError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for TaskActionError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<anyhow::Error> for TaskActionError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
