// ABOUTME: One-shot completion signalling for a run
// ABOUTME: The signal is consumed when fired, so a run can only complete once

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// Run-level fatal error: the task that halted a halt-on-error run.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("task '{task_key}' failed: {message}")]
pub struct TaskFailure {
    pub task_key: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Every task reached a terminal state. Under continue-on-error some of
    /// them may have failed; inspect the task states to find out.
    Finished,
    /// A task failed under halt-on-error; later tasks never ran.
    Halted(TaskFailure),
}

impl Completion {
    pub fn error(&self) -> Option<&TaskFailure> {
        match self {
            Completion::Finished => None,
            Completion::Halted(failure) => Some(failure),
        }
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, Completion::Halted(_))
    }

    pub fn into_result(self) -> Result<(), TaskFailure> {
        match self {
            Completion::Finished => Ok(()),
            Completion::Halted(failure) => Err(failure),
        }
    }
}

type Notify = Box<dyn FnOnce(Completion) + Send>;

/// Caller-supplied completion callback.
pub struct CompletionSignal {
    notify: Notify,
}

impl CompletionSignal {
    /// Wrap an `on_complete(error?)` callback.
    pub fn from_fn<F>(on_complete: F) -> Self
    where
        F: FnOnce(Option<TaskFailure>) + Send + 'static,
    {
        Self {
            notify: Box::new(move |completion: Completion| {
                on_complete(completion.into_result().err())
            }),
        }
    }

    /// A signal paired with a receiver that resolves when the run completes.
    pub fn channel() -> (Self, oneshot::Receiver<Completion>) {
        let (tx, rx) = oneshot::channel();
        let signal = Self {
            notify: Box::new(move |completion| {
                if tx.send(completion).is_err() {
                    debug!("Completion receiver dropped before the run finished");
                }
            }),
        };
        (signal, rx)
    }

    pub fn noop() -> Self {
        Self {
            notify: Box::new(|_| {}),
        }
    }

    pub(crate) fn fire(self, completion: Completion) {
        (self.notify)(completion)
    }
}

impl std::fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSignal").finish_non_exhaustive()
    }
}
