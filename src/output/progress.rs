// ABOUTME: Live progress rendering from run snapshots
// ABOUTME: Prints a group header on phase changes and one line per task status change

use std::collections::HashMap;
use std::io::{self, Write};
use tokio::sync::watch;
use tracing::debug;

use super::formatter::status_icon;
use crate::engine::{RunSnapshot, TaskSnapshot, TaskStatus};

/// Renders the difference between consecutive snapshots. The watch channel
/// may coalesce updates, so rendering is based on what changed rather than on
/// every individual transition.
pub struct ProgressReporter<W> {
    out: W,
    seen: HashMap<String, TaskStatus>,
    last_group: Option<String>,
}

impl ProgressReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ProgressReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            seen: HashMap::new(),
            last_group: None,
        }
    }

    /// Lines describing what changed since the previous snapshot.
    pub fn render(&mut self, snapshot: &RunSnapshot) -> Vec<String> {
        let mut lines = Vec::new();

        for task in &snapshot.tasks {
            let status = task.state.status;
            let previous = self.seen.insert(task.key.clone(), status);
            if previous == Some(status) || (previous.is_none() && status == TaskStatus::Pending) {
                continue;
            }

            if self.last_group.as_deref() != Some(task.group.as_str()) {
                let title = snapshot
                    .group(&task.group)
                    .map(|g| g.title.as_str())
                    .unwrap_or(task.group.as_str());
                lines.push(format!("▸ {}", title));
                self.last_group = Some(task.group.clone());
            }

            lines.push(format!("  {}", task_line(task)));
        }

        lines
    }

    pub fn report(&mut self, snapshot: &RunSnapshot) -> io::Result<()> {
        for line in self.render(snapshot) {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()
    }

    /// Follow a running engine until its final snapshot has been rendered.
    pub async fn follow(mut self, mut progress: watch::Receiver<RunSnapshot>) -> io::Result<W> {
        loop {
            let snapshot = progress.borrow_and_update().clone();
            self.report(&snapshot)?;
            if snapshot.is_complete {
                break;
            }
            if progress.changed().await.is_err() {
                // Sender dropped: render whatever the last value was
                let snapshot = progress.borrow().clone();
                self.report(&snapshot)?;
                debug!("Progress channel closed");
                break;
            }
        }
        Ok(self.out)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn task_line(task: &TaskSnapshot) -> String {
    let icon = status_icon(task.state.status);
    match (task.state.status, task.state.message.as_deref()) {
        (TaskStatus::Running, _) => format!("{} {}...", icon, task.title),
        (TaskStatus::Skipped, Some(reason)) => format!("{} {} ({})", icon, task.title, reason),
        (TaskStatus::Error, Some(message)) => format!("{} {}: {}", icon, task.title, message),
        _ => format!("{} {}", icon, task.title),
    }
}
