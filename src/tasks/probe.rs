// ABOUTME: Probe action that checks whether a resource already exists
// ABOUTME: Exit codes decide existence; only spawn failures and timeouts fail the step

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::command::InvocationConfig;
use super::context::{ProvisionContext, ProvisionPatch};
use super::error::{ActionError, Result};
use super::{ActionEnv, ActionFactory, ActionSpec, BoxedAction};
use crate::engine::{SharedContext, TaskAction, TaskActionError};

/// ```yaml
/// type: probe
/// config:
///   resource: bucket
///   command: aws
///   args: [s3api, head-bucket, --bucket, "{{variables.bucket}}"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub resource: String,

    #[serde(flatten)]
    pub invocation: InvocationConfig,

    /// Exit codes meaning "the resource exists" (default: [0])
    #[serde(default = "default_exists_codes")]
    pub exists_codes: Vec<i32>,
}

fn default_exists_codes() -> Vec<i32> {
    vec![0]
}

pub struct ProbeFactory;

impl ActionFactory for ProbeFactory {
    fn action_type(&self) -> &'static str {
        "probe"
    }

    fn validate_config(&self, config: &serde_yaml::Value) -> Result<()> {
        parse_config(config)?.validate()
    }

    fn build(&self, spec: ActionSpec, env: Arc<ActionEnv>) -> Result<BoxedAction> {
        let config = parse_config(&spec.config)?;
        config.validate()?;

        Ok(Box::new(ProbeAction {
            limit: config.invocation.deadline(spec.timeout, &env),
            task_key: spec.task_key,
            config,
            env,
        }))
    }
}

fn parse_config(config: &serde_yaml::Value) -> Result<ProbeConfig> {
    serde_yaml::from_value(config.clone())
        .map_err(|e| ActionError::invalid_config("probe", e.to_string()))
}

impl ProbeConfig {
    fn validate(&self) -> Result<()> {
        if self.resource.trim().is_empty() {
            return Err(ActionError::invalid_config(
                "probe",
                "resource cannot be empty",
            ));
        }
        if self.exists_codes.is_empty() {
            return Err(ActionError::invalid_config(
                "probe",
                "exists_codes cannot be empty",
            ));
        }
        self.invocation.validate("probe")
    }
}

#[derive(Debug)]
pub struct ProbeAction {
    task_key: String,
    config: ProbeConfig,
    limit: Duration,
    env: Arc<ActionEnv>,
}

impl ProbeAction {
    pub fn resource(&self) -> &str {
        &self.config.resource
    }
}

#[async_trait]
impl TaskAction<ProvisionContext> for ProbeAction {
    async fn run(
        &self,
        context: &mut SharedContext<ProvisionContext>,
    ) -> std::result::Result<(), TaskActionError> {
        let template_context = context
            .template_context(&self.env.plan, &self.env.run)
            .and_then(|ctx| ctx.to_json())
            .map_err(|e| TaskActionError::new(format!("Failed to build template context: {}", e)))?;

        let output = self
            .config
            .invocation
            .execute(&self.env, &template_context, self.limit)
            .await?;

        let resource = self.config.resource.clone();
        let found = self.config.exists_codes.contains(&output.exit_code);
        info!(
            "Probe {}: resource {} {} (exit code {})",
            self.task_key,
            resource,
            if found { "exists" } else { "missing" },
            output.exit_code
        );

        context.update(|_| {
            let patch = ProvisionPatch::new().output(self.task_key.clone(), output.stdout.trim());
            if found {
                patch.found(resource)
            } else {
                patch.missing(resource)
            }
        });

        Ok(())
    }
}
