// ABOUTME: Group status derivation for progress display
// ABOUTME: Pure functions from task states to per-group status and the current phase

use serde::{Deserialize, Serialize};

use super::snapshot::TaskSnapshot;
use super::state::TaskStatus;
use super::task::Group;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    Pending,
    Active,
    Complete,
    Error,
}

impl std::fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupStatus::Pending => write!(f, "pending"),
            GroupStatus::Active => write!(f, "active"),
            GroupStatus::Complete => write!(f, "complete"),
            GroupStatus::Error => write!(f, "error"),
        }
    }
}

/// Derive a group's status from the statuses of its member tasks.
///
/// Error wins over everything, then running, then "all settled" (success or
/// skipped). Partial progress counts as active. A group with no members is
/// pending.
pub fn derive_status<I>(member_statuses: I) -> GroupStatus
where
    I: IntoIterator<Item = TaskStatus>,
{
    let mut total = 0usize;
    let mut settled = 0usize;
    let mut running = false;

    for status in member_statuses {
        total += 1;
        match status {
            TaskStatus::Error => return GroupStatus::Error,
            TaskStatus::Running => running = true,
            TaskStatus::Success | TaskStatus::Skipped => settled += 1,
            TaskStatus::Pending => {}
        }
    }

    if total == 0 {
        GroupStatus::Pending
    } else if running {
        GroupStatus::Active
    } else if settled == total {
        GroupStatus::Complete
    } else if settled > 0 {
        GroupStatus::Active
    } else {
        GroupStatus::Pending
    }
}

pub fn group_status(group_key: &str, tasks: &[TaskSnapshot]) -> GroupStatus {
    derive_status(
        tasks
            .iter()
            .filter(|t| t.group == group_key)
            .map(|t| t.state.status),
    )
}

/// First declared group that is not complete, in group-list order.
pub fn current_group<'a>(groups: &'a [Group], tasks: &[TaskSnapshot]) -> Option<&'a Group> {
    groups
        .iter()
        .find(|group| group_status(&group.key, tasks) != GroupStatus::Complete)
}
