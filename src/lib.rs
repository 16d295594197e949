// ABOUTME: Main library module for the stagehand sequential task runner
// ABOUTME: Exports the engine, plan, action, template, and output modules

pub mod cli;
pub mod engine;
pub mod output;
pub mod plan;
pub mod tasks;
pub mod template;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use engine::{
    Completion, CompletionSignal, FailurePolicy, Group, RunReport, RunStatus, SkipDecision, Task,
    TaskRunner, TaskStatus,
};
pub use plan::{Plan, PlanAssembler, PlanParser, PlanValidator};
pub use tasks::{ActionRegistry, ProvisionContext, ProvisionPatch};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
