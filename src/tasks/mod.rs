// ABOUTME: Built-in task actions for plan-driven runs
// ABOUTME: Registry mapping plan step types to factories that build engine task actions

pub mod command;
pub mod context;
pub mod error;
pub mod probe;

pub use command::{CommandAction, CommandConfig, CommandFactory, CommandOutput, InvocationConfig};
pub use context::{ProvisionContext, ProvisionPatch};
pub use error::{ActionError, Result};
pub use probe::{ProbeAction, ProbeConfig, ProbeFactory};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::TaskAction;
use crate::template::{PlanInfo, RunInfo, TemplateEngine};

pub const DEFAULT_SHELL: &str = "/bin/bash";
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// Run-wide settings shared by every action built for one plan run.
#[derive(Debug, Clone)]
pub struct ActionEnv {
    pub templates: TemplateEngine,
    pub plan: PlanInfo,
    pub run: RunInfo,
    pub shell: String,
    pub command_timeout: Duration,
}

impl ActionEnv {
    pub fn new(plan: PlanInfo, run: RunInfo) -> Self {
        Self {
            templates: TemplateEngine::new(),
            plan,
            run,
            shell: DEFAULT_SHELL.to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Everything a factory needs to know about one plan step.
#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub task_key: String,
    pub config: serde_yaml::Value,
    pub creates: Vec<String>,
    pub deletes: Vec<String>,
    pub timeout: Option<Duration>,
}

impl ActionSpec {
    pub fn new(task_key: impl Into<String>, config: serde_yaml::Value) -> Self {
        Self {
            task_key: task_key.into(),
            config,
            creates: Vec::new(),
            deletes: Vec::new(),
            timeout: None,
        }
    }
}

pub type BoxedAction = Box<dyn TaskAction<ProvisionContext>>;

pub trait ActionFactory: Send + Sync {
    fn action_type(&self) -> &'static str;
    fn validate_config(&self, config: &serde_yaml::Value) -> Result<()>;
    fn build(&self, spec: ActionSpec, env: Arc<ActionEnv>) -> Result<BoxedAction>;
}

pub struct ActionRegistry {
    factories: HashMap<String, Box<dyn ActionFactory>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };

        registry.register(Box::new(CommandFactory));
        registry.register(Box::new(ProbeFactory));

        registry
    }

    pub fn register(&mut self, factory: Box<dyn ActionFactory>) {
        let action_type = factory.action_type().to_string();
        self.factories.insert(action_type, factory);
    }

    pub fn get_factory(&self, action_type: &str) -> Option<&dyn ActionFactory> {
        self.factories.get(action_type).map(|f| f.as_ref())
    }

    pub fn supports(&self, action_type: &str) -> bool {
        self.factories.contains_key(action_type)
    }

    pub fn validate_config(&self, action_type: &str, config: &serde_yaml::Value) -> Result<()> {
        self.factory(action_type)?.validate_config(config)
    }

    pub fn build(
        &self,
        action_type: &str,
        spec: ActionSpec,
        env: Arc<ActionEnv>,
    ) -> Result<BoxedAction> {
        self.factory(action_type)?.build(spec, env)
    }

    pub fn list_supported_actions(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(|k| k.as_str()).collect();
        types.sort_unstable();
        types
    }

    fn factory(&self, action_type: &str) -> Result<&dyn ActionFactory> {
        self.get_factory(action_type)
            .ok_or_else(|| ActionError::UnsupportedAction {
                action_type: action_type.to_string(),
            })
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
