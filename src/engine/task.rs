// ABOUTME: Task and group definitions registered with the runner
// ABOUTME: A task pairs a synchronous skip predicate with an asynchronous action

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::context::SharedContext;
use super::error::TaskActionError;

/// Outcome of a task's skip predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipDecision {
    Run,
    Skip(String),
}

impl SkipDecision {
    pub const DEFAULT_REASON: &'static str = "Skipped";

    /// Skip with the given reason; an empty reason falls back to the default.
    pub fn skip(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if reason.trim().is_empty() {
            SkipDecision::Skip(Self::DEFAULT_REASON.to_string())
        } else {
            SkipDecision::Skip(reason)
        }
    }

    pub fn skip_default() -> Self {
        SkipDecision::Skip(Self::DEFAULT_REASON.to_string())
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, SkipDecision::Skip(_))
    }
}

impl From<bool> for SkipDecision {
    /// `true` means skip with the default reason.
    fn from(skip: bool) -> Self {
        if skip {
            SkipDecision::skip_default()
        } else {
            SkipDecision::Run
        }
    }
}

#[async_trait]
pub trait TaskAction<C>: Send + Sync {
    async fn run(&self, context: &mut SharedContext<C>) -> Result<(), TaskActionError>;
}

/// Adapter turning a closure that returns a boxed future into a [`TaskAction`].
pub struct FnAction<F> {
    f: F,
}

#[async_trait]
impl<C, F> TaskAction<C> for FnAction<F>
where
    C: Send + Sync,
    F: for<'a> Fn(&'a mut SharedContext<C>) -> BoxFuture<'a, Result<(), TaskActionError>>
        + Send
        + Sync,
{
    async fn run(&self, context: &mut SharedContext<C>) -> Result<(), TaskActionError> {
        (self.f)(context).await
    }
}

pub type SkipFn<C> = Box<dyn Fn(&C) -> SkipDecision + Send + Sync>;

pub struct Task<C> {
    key: String,
    title: String,
    group: String,
    skip: Option<SkipFn<C>>,
    action: Box<dyn TaskAction<C>>,
}

impl<C: Send + Sync> Task<C> {
    pub fn new<A>(
        key: impl Into<String>,
        title: impl Into<String>,
        group: impl Into<String>,
        action: A,
    ) -> Self
    where
        A: TaskAction<C> + 'static,
    {
        Self::from_boxed(key, title, group, Box::new(action))
    }

    /// Build a task around an already boxed action, e.g. one produced by an
    /// action registry.
    pub fn from_boxed(
        key: impl Into<String>,
        title: impl Into<String>,
        group: impl Into<String>,
        action: Box<dyn TaskAction<C>>,
    ) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            group: group.into(),
            skip: None,
            action,
        }
    }

    /// Build a task from a closure. The parameter needs an explicit type, e.g.
    /// `|ctx: &mut SharedContext<MyCtx>| async move { ... }.boxed()`.
    pub fn from_fn<F>(
        key: impl Into<String>,
        title: impl Into<String>,
        group: impl Into<String>,
        f: F,
    ) -> Self
    where
        C: 'static,
        F: for<'a> Fn(&'a mut SharedContext<C>) -> BoxFuture<'a, Result<(), TaskActionError>>
            + Send
            + Sync
            + 'static,
    {
        Self::new(key, title, group, FnAction { f })
    }

    pub fn with_skip<S>(mut self, skip: S) -> Self
    where
        S: Fn(&C) -> SkipDecision + Send + Sync + 'static,
    {
        self.skip = Some(Box::new(skip));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn has_skip(&self) -> bool {
        self.skip.is_some()
    }

    pub fn evaluate_skip(&self, context: &C) -> SkipDecision {
        match &self.skip {
            Some(skip) => skip(context),
            None => SkipDecision::Run,
        }
    }

    pub async fn run(&self, context: &mut SharedContext<C>) -> Result<(), TaskActionError> {
        self.action.run(context).await
    }
}

impl<C> std::fmt::Debug for Task<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("key", &self.key)
            .field("title", &self.title)
            .field("group", &self.group)
            .field("has_skip", &self.skip.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub key: String,
    pub title: String,
}

impl Group {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
        }
    }
}
