// ABOUTME: Read-only views of a run published after every task transition
// ABOUTME: Snapshots carry per-task state plus derived group status for renderers

use serde::{Deserialize, Serialize};

use super::completion::TaskFailure;
use super::group::{current_group, group_status, GroupStatus};
use super::state::{TaskState, TaskStatus};
use super::task::Group;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSnapshot {
    pub key: String,
    pub title: String,
    pub group: String,
    pub state: TaskState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupSnapshot {
    pub key: String,
    pub title: String,
    pub status: GroupStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSnapshot {
    pub tasks: Vec<TaskSnapshot>,
    pub groups: Vec<GroupSnapshot>,
    pub current_group: Option<String>,
    pub current_index: usize,
    pub is_complete: bool,
    /// The failure that halted the run, if any.
    pub terminal_error: Option<TaskFailure>,
}

impl RunSnapshot {
    /// Build a snapshot, deriving every group's status from the task states.
    pub fn new(
        tasks: Vec<TaskSnapshot>,
        groups: &[Group],
        current_index: usize,
        is_complete: bool,
    ) -> Self {
        let group_snapshots = groups
            .iter()
            .map(|group| GroupSnapshot {
                key: group.key.clone(),
                title: group.title.clone(),
                status: group_status(&group.key, &tasks),
            })
            .collect();
        let current_group = current_group(groups, &tasks).map(|group| group.key.clone());

        Self {
            tasks,
            groups: group_snapshots,
            current_group,
            current_index,
            is_complete,
            terminal_error: None,
        }
    }

    pub fn with_terminal_error(mut self, failure: Option<TaskFailure>) -> Self {
        self.terminal_error = failure;
        self
    }

    pub fn task(&self, key: &str) -> Option<&TaskSnapshot> {
        self.tasks.iter().find(|t| t.key == key)
    }

    pub fn group(&self, key: &str) -> Option<&GroupSnapshot> {
        self.groups.iter().find(|g| g.key == key)
    }

    pub fn statuses(&self) -> Vec<TaskStatus> {
        self.tasks.iter().map(|t| t.state.status).collect()
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.state.status == status).count()
    }

    pub fn running_count(&self) -> usize {
        self.count(TaskStatus::Running)
    }

    pub fn running_task(&self) -> Option<&TaskSnapshot> {
        self.tasks
            .iter()
            .find(|t| t.state.status == TaskStatus::Running)
    }
}
