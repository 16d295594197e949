// ABOUTME: Turns a validated plan into a ready-to-run task runner
// ABOUTME: Resolves variables, builds step actions through the registry, compiles skip conditions

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::definition::Plan;
use super::error::{PlanError, Result};
use super::validation::PlanValidator;
use crate::engine::{FailurePolicy, Task, TaskRunner};
use crate::output::OutputConfig;
use crate::tasks::{
    ActionEnv, ActionRegistry, ActionSpec, ProvisionContext, DEFAULT_COMMAND_TIMEOUT,
    DEFAULT_SHELL,
};
use crate::template::{PlanInfo, RunInfo, TemplateContext};

/// A plan ready to hand to the engine.
pub struct AssembledRun {
    pub runner: TaskRunner<ProvisionContext>,
    pub context: ProvisionContext,
    /// Output settings with the destination already rendered.
    pub output: OutputConfig,
    pub env: Arc<ActionEnv>,
}

pub struct PlanAssembler {
    registry: Arc<ActionRegistry>,
    shell: String,
    command_timeout: Duration,
    overrides: BTreeMap<String, String>,
    policy_override: Option<FailurePolicy>,
}

impl PlanAssembler {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(ActionRegistry::new()))
    }

    pub fn with_registry(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            shell: DEFAULT_SHELL.to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            overrides: BTreeMap::new(),
            policy_override: None,
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

    /// Variables that replace plan values verbatim.
    pub fn with_variables<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.overrides.extend(vars);
        self
    }

    /// Takes precedence over the plan's `exit_on_error`.
    pub fn with_policy(mut self, policy: Option<FailurePolicy>) -> Self {
        self.policy_override = policy;
        self
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn assemble(&self, plan: &Plan) -> Result<AssembledRun> {
        let report = PlanValidator::with_registry(Arc::clone(&self.registry)).validate(plan);
        if !report.is_valid {
            return Err(PlanError::Invalid(report.errors));
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        let plan_info = PlanInfo::new(plan.name.clone(), plan.description.clone());
        let run_info = RunInfo::new(run_id.clone());

        let env = ActionEnv::new(plan_info.clone(), run_info.clone())
            .with_shell(self.shell.clone())
            .with_command_timeout(self.command_timeout);

        let declared: Vec<(String, String)> = plan
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let base = TemplateContext::for_plan(BTreeMap::new(), plan_info, run_info)?;
        let variables = env
            .templates
            .resolve_variables(&declared, &self.overrides, &base)?;

        let mut output = plan.output.clone();
        let render_context = TemplateContext {
            variables: variables.clone(),
            ..base
        };
        output.destination = env.templates.render(&output.destination, &render_context)?;

        let env = Arc::new(env);
        let mut tasks = Vec::with_capacity(plan.tasks.len());
        for step in &plan.tasks {
            let spec = ActionSpec {
                task_key: step.key.clone(),
                config: step.config.clone(),
                creates: step.creates.clone(),
                deletes: step.deletes.clone(),
                timeout: step.timeout,
            };
            let action = self
                .registry
                .build(&step.step_type, spec, Arc::clone(&env))
                .map_err(|source| PlanError::ActionError {
                    task: step.key.clone(),
                    source,
                })?;

            let mut task = Task::from_boxed(
                step.key.clone(),
                step.display_title().to_string(),
                step.group.clone(),
                action,
            );
            if let Some(condition) = step.skip_if.clone() {
                task = task.with_skip(condition.into_predicate());
            }
            debug!("Assembled step {} ({})", step.key, step.step_type);
            tasks.push(task);
        }

        let policy = self.policy_override.unwrap_or_else(|| plan.policy());
        let runner = TaskRunner::new(tasks, plan.engine_groups())?
            .with_name(plan.name.clone())
            .with_run_id(run_id)
            .with_policy(policy);

        info!(
            "Assembled plan '{}' with {} steps ({})",
            plan.name,
            plan.tasks.len(),
            policy
        );

        Ok(AssembledRun {
            runner,
            context: ProvisionContext::new(variables),
            output,
            env,
        })
    }
}

impl Default for PlanAssembler {
    fn default() -> Self {
        Self::new()
    }
}
