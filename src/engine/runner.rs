// ABOUTME: Sequential task runner driving a run from the first task to completion
// ABOUTME: Evaluates skip predicates, awaits one action at a time, and applies the failure policy

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::completion::{Completion, CompletionSignal, TaskFailure};
use super::context::SharedContext;
use super::error::{EngineError, Result};
use super::result::RunReport;
use super::snapshot::{RunSnapshot, TaskSnapshot};
use super::state::{TaskState, TaskStateMap};
use super::task::{Group, SkipDecision, Task};

/// What happens to the rest of the run when a task action fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failure and report it through the completion signal.
    #[default]
    HaltOnError,
    /// Record the failure on the task and keep going.
    ContinueOnError,
}

impl FailurePolicy {
    pub fn from_exit_on_error(exit_on_error: bool) -> Self {
        if exit_on_error {
            FailurePolicy::HaltOnError
        } else {
            FailurePolicy::ContinueOnError
        }
    }

    pub fn exits_on_error(&self) -> bool {
        *self == FailurePolicy::HaltOnError
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::HaltOnError => write!(f, "halt_on_error"),
            FailurePolicy::ContinueOnError => write!(f, "continue_on_error"),
        }
    }
}

type Observer = Box<dyn Fn(&RunSnapshot) + Send + Sync>;

/// Everything a finished run hands back to the caller.
#[derive(Debug)]
pub struct RunOutcome<C> {
    pub completion: Completion,
    pub snapshot: RunSnapshot,
    pub context: C,
    pub report: RunReport,
}

pub struct TaskRunner<C> {
    name: String,
    run_id: String,
    tasks: Vec<Task<C>>,
    groups: Vec<Group>,
    policy: FailurePolicy,
    observers: Vec<Observer>,
}

impl<C: Send + Sync + 'static> TaskRunner<C> {
    /// Register tasks and groups. Task keys and group keys must be unique and
    /// every task must reference a declared group.
    pub fn new(tasks: Vec<Task<C>>, groups: Vec<Group>) -> Result<Self> {
        let mut group_keys = HashSet::new();
        for group in &groups {
            if !group_keys.insert(group.key.as_str()) {
                return Err(EngineError::DuplicateGroupKey {
                    group_key: group.key.clone(),
                });
            }
        }

        let mut task_keys = HashSet::new();
        for task in &tasks {
            if !task_keys.insert(task.key()) {
                return Err(EngineError::DuplicateTaskKey {
                    task_key: task.key().to_string(),
                });
            }
            if !group_keys.contains(task.group()) {
                return Err(EngineError::UnknownGroup {
                    task_key: task.key().to_string(),
                    group_key: task.group().to_string(),
                });
            }
        }

        if tasks.is_empty() {
            warn!("Task runner created with an empty task list");
        }

        Ok(Self {
            name: "run".to_string(),
            run_id: uuid::Uuid::new_v4().to_string(),
            tasks,
            groups,
            policy: FailurePolicy::default(),
            observers: Vec::new(),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use an externally generated run id, e.g. one already rendered into
    /// templates.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_exit_on_error(self, exit_on_error: bool) -> Self {
        self.with_policy(FailurePolicy::from_exit_on_error(exit_on_error))
    }

    /// Called synchronously with a fresh snapshot after every transition.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&RunSnapshot) + Send + Sync + 'static,
    {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn tasks(&self) -> &[Task<C>] {
        &self.tasks
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// The snapshot before the first step: every task pending.
    pub fn initial_snapshot(&self) -> RunSnapshot {
        let states = initial_states(&self.tasks);
        build_snapshot(&self.tasks, &self.groups, &states, 0, false)
    }

    /// Drive the run to completion on the current task, firing `signal`
    /// exactly once.
    #[instrument(skip_all, fields(run = %self.name, run_id = %self.run_id, policy = %self.policy))]
    pub async fn run(self, context: C, signal: CompletionSignal) -> RunOutcome<C> {
        let TaskRunner {
            name,
            run_id,
            tasks,
            groups,
            policy,
            observers,
        } = self;

        let start_time = Utc::now();
        let started = Instant::now();
        info!("Starting run with {} tasks", tasks.len());

        let mut stepper = Stepper {
            tasks: &tasks,
            groups: &groups,
            states: initial_states(&tasks),
            observers: &observers,
            policy,
            current_index: 0,
            is_complete: false,
            terminal_error: None,
        };
        let mut context = SharedContext::new(context);

        stepper.publish();
        let completion = stepper.drive(&mut context).await;
        let snapshot = stepper.snapshot();

        match &completion {
            Completion::Finished => info!(
                "Run completed in {:?}: {} tasks finished",
                started.elapsed(),
                tasks.len()
            ),
            Completion::Halted(failure) => error!(
                "Run halted after {:?}: {}",
                started.elapsed(),
                failure
            ),
        }

        signal.fire(completion.clone());

        let report = RunReport::new(run_id, name, policy, start_time, &snapshot, &completion);

        RunOutcome {
            completion,
            snapshot,
            context: context.into_inner(),
            report,
        }
    }

    /// Run on a background tokio task, exposing progress and completion
    /// channels.
    pub fn spawn(self, context: C) -> RunHandle<C> {
        let (progress_tx, progress_rx) = watch::channel(self.initial_snapshot());
        let (signal, completion_rx) = CompletionSignal::channel();

        let runner = self.with_observer(move |snapshot| {
            progress_tx.send_replace(snapshot.clone());
        });
        let join = tokio::spawn(runner.run(context, signal));

        RunHandle {
            progress: progress_rx,
            completion: completion_rx,
            join,
        }
    }
}

impl<C> std::fmt::Debug for TaskRunner<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("name", &self.name)
            .field("run_id", &self.run_id)
            .field("tasks", &self.tasks)
            .field("groups", &self.groups)
            .field("policy", &self.policy)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Handle to a run started with [`TaskRunner::spawn`].
pub struct RunHandle<C> {
    pub progress: watch::Receiver<RunSnapshot>,
    pub completion: oneshot::Receiver<Completion>,
    join: JoinHandle<RunOutcome<C>>,
}

impl<C> RunHandle<C> {
    pub fn progress(&self) -> watch::Receiver<RunSnapshot> {
        self.progress.clone()
    }

    /// Wait for the background run to finish.
    pub async fn wait(self) -> Result<RunOutcome<C>> {
        Ok(self.join.await?)
    }
}

enum StepOutcome {
    Advanced,
    Halted(TaskFailure),
}

/// Mutable engine state for a single run. Lives only inside
/// [`TaskRunner::run`], so nothing but the loop below can trigger a step.
struct Stepper<'r, C> {
    tasks: &'r [Task<C>],
    groups: &'r [Group],
    states: TaskStateMap,
    observers: &'r [Observer],
    policy: FailurePolicy,
    current_index: usize,
    is_complete: bool,
    terminal_error: Option<TaskFailure>,
}

impl<'r, C: Send + Sync> Stepper<'r, C> {
    async fn drive(&mut self, context: &mut SharedContext<C>) -> Completion {
        let tasks = self.tasks;

        while let Some(task) = tasks.get(self.current_index) {
            let outcome = match self.step(task, context).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Engine error while stepping task {}: {}", task.key(), e);
                    StepOutcome::Halted(TaskFailure {
                        task_key: task.key().to_string(),
                        message: e.to_string(),
                    })
                }
            };

            if let StepOutcome::Halted(failure) = outcome {
                self.terminal_error = Some(failure.clone());
                self.is_complete = true;
                self.publish();
                return Completion::Halted(failure);
            }
        }

        self.is_complete = true;
        self.publish();
        Completion::Finished
    }

    async fn step(
        &mut self,
        task: &Task<C>,
        context: &mut SharedContext<C>,
    ) -> Result<StepOutcome> {
        let key = task.key();

        if let SkipDecision::Skip(reason) = task.evaluate_skip(context.get()) {
            info!("Skipping task {}: {}", key, reason);
            self.state_mut(key)?.mark_skipped(reason)?;
            self.advance();
            self.publish();
            return Ok(StepOutcome::Advanced);
        }

        info!("Running task {} ({})", key, task.title());
        self.state_mut(key)?.mark_running()?;
        self.publish();

        let started = Instant::now();
        match task.run(context).await {
            Ok(()) => {
                info!("Task {} succeeded in {:?}", key, started.elapsed());
                self.state_mut(key)?.mark_success()?;
                self.advance();
                self.publish();
                Ok(StepOutcome::Advanced)
            }
            Err(e) => {
                self.state_mut(key)?.mark_error(e.message.clone())?;
                let failure = TaskFailure {
                    task_key: key.to_string(),
                    message: e.message,
                };

                match self.policy {
                    FailurePolicy::HaltOnError => {
                        error!("Task {} failed, halting run: {}", key, failure.message);
                        Ok(StepOutcome::Halted(failure))
                    }
                    FailurePolicy::ContinueOnError => {
                        warn!("Task {} failed, continuing: {}", key, failure.message);
                        self.advance();
                        self.publish();
                        Ok(StepOutcome::Advanced)
                    }
                }
            }
        }
    }

    fn advance(&mut self) {
        self.current_index += 1;
        debug!("Advanced to index {}", self.current_index);
    }

    fn state_mut(&mut self, key: &str) -> Result<&mut TaskState> {
        self.states
            .get_mut(key)
            .ok_or_else(|| EngineError::TaskNotFound {
                task_key: key.to_string(),
            })
    }

    fn snapshot(&self) -> RunSnapshot {
        build_snapshot(
            self.tasks,
            self.groups,
            &self.states,
            self.current_index,
            self.is_complete,
        )
        .with_terminal_error(self.terminal_error.clone())
    }

    fn publish(&self) {
        if self.observers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for observer in self.observers {
            observer(&snapshot);
        }
    }
}

fn initial_states<C>(tasks: &[Task<C>]) -> TaskStateMap
where
    C: Send + Sync,
{
    tasks
        .iter()
        .map(|task| (task.key().to_string(), TaskState::new()))
        .collect()
}

fn build_snapshot<C>(
    tasks: &[Task<C>],
    groups: &[Group],
    states: &TaskStateMap,
    current_index: usize,
    is_complete: bool,
) -> RunSnapshot
where
    C: Send + Sync,
{
    let task_snapshots = tasks
        .iter()
        .map(|task| TaskSnapshot {
            key: task.key().to_string(),
            title: task.title().to_string(),
            group: task.group().to_string(),
            state: states.get(task.key()).cloned().unwrap_or_default(),
        })
        .collect();

    RunSnapshot::new(task_snapshots, groups, current_index, is_complete)
}
