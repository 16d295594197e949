// ABOUTME: Sequential task orchestration engine
// ABOUTME: Runs ordered tasks with skip predicates, derived group status, and failure policies

pub mod completion;
pub mod context;
pub mod error;
pub mod group;
pub mod result;
pub mod runner;
pub mod snapshot;
pub mod state;
pub mod task;

pub use completion::{Completion, CompletionSignal, TaskFailure};
pub use context::{Merge, SharedContext};
pub use error::{EngineError, Result, TaskActionError};
pub use group::{current_group, derive_status, group_status, GroupStatus};
pub use result::{RunReport, RunStatus, RunSummary};
pub use runner::{FailurePolicy, RunHandle, RunOutcome, TaskRunner};
pub use snapshot::{GroupSnapshot, RunSnapshot, TaskSnapshot};
pub use state::{TaskState, TaskStateMap, TaskStatus};
pub use task::{FnAction, Group, SkipDecision, SkipFn, Task, TaskAction};
