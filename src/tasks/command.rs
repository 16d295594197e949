// ABOUTME: Command action running external programs and shell scripts as plan steps
// ABOUTME: Renders arguments against the run context, enforces a deadline, records resources

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info};

use super::context::{ProvisionContext, ProvisionPatch};
use super::error::{ActionError, Result};
use super::{ActionEnv, ActionFactory, ActionSpec, BoxedAction};
use crate::engine::{SharedContext, TaskAction, TaskActionError};
use crate::template::TemplateError;

/// How to launch a process. Shared by the `command` and `probe` steps.
///
/// Two modes:
/// 1. `command` + `args`: run a program directly.
/// 2. `script`: write the rendered script to a temporary file and run it with
///    the shell.
///
/// ```yaml
/// type: command
/// config:
///   script: |
///     aws s3 mb "s3://{{variables.bucket}}" --region {{variables.region}}
///     aws s3api put-bucket-versioning --bucket {{variables.bucket}} \
///       --versioning-configuration Status=Enabled
///   env:
///     AWS_PAGER: ""
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvocationConfig {
    #[serde(default)]
    pub command: Option<String>,

    /// Only used with `command`.
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub script: Option<String>,

    /// Script interpreter; falls back to the configured shell.
    #[serde(default)]
    pub shell: Option<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub working_dir: Option<String>,

    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(flatten)]
    pub invocation: InvocationConfig,

    /// Exit codes considered successful (default: [0])
    #[serde(default = "default_expected_exit_codes")]
    pub expected_exit_codes: Vec<i32>,
}

fn default_expected_exit_codes() -> Vec<i32> {
    vec![0]
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            invocation: InvocationConfig::default(),
            expected_exit_codes: default_expected_exit_codes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Combined output in the `STDOUT:` / `STDERR:` layout used in logs.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (false, false) => format!("STDOUT:\n{}\nSTDERR:\n{}", self.stdout, self.stderr),
            (false, true) => self.stdout.clone(),
            (true, false) => format!("STDERR:\n{}", self.stderr),
            (true, true) => String::new(),
        }
    }
}

impl InvocationConfig {
    pub fn validate(&self, action_type: &str) -> Result<()> {
        match (&self.command, &self.script) {
            (None, None) => Err(ActionError::invalid_config(
                action_type,
                "either 'command' or 'script' must be provided",
            )),
            (Some(_), Some(_)) => Err(ActionError::invalid_config(
                action_type,
                "cannot specify both 'command' and 'script'",
            )),
            (Some(cmd), None) if cmd.trim().is_empty() => Err(ActionError::invalid_config(
                action_type,
                "command cannot be empty",
            )),
            (None, Some(script)) if script.trim().is_empty() => Err(
                ActionError::invalid_config(action_type, "script cannot be empty"),
            ),
            _ => match self.timeout_seconds {
                Some(0) => Err(ActionError::invalid_config(
                    action_type,
                    "timeout_seconds must be greater than 0",
                )),
                _ => Ok(()),
            },
        }
    }

    /// Deadline for one execution: step timeout, then `timeout_seconds`, then
    /// the run-wide default.
    pub fn deadline(&self, step_timeout: Option<Duration>, env: &ActionEnv) -> Duration {
        step_timeout
            .or(self.timeout_seconds.map(Duration::from_secs))
            .unwrap_or(env.command_timeout)
    }

    /// Render, spawn, and wait for the process. The child is killed if the
    /// deadline passes.
    pub async fn execute(
        &self,
        env: &ActionEnv,
        template_context: &JsonValue,
        limit: Duration,
    ) -> std::result::Result<CommandOutput, TaskActionError> {
        let templates = &env.templates;
        let render_err = |e: TemplateError| {
            TaskActionError::new(format!("Failed to render template: {}", e))
        };

        // The script file must outlive the child process
        let (mut cmd, _script_file) = if let Some(ref script) = self.script {
            let rendered = templates
                .render_template(script, template_context)
                .map_err(render_err)?;
            debug!("Rendered script ({} chars)", rendered.len());

            let file = write_script(&rendered)?;
            let shell = self.shell.as_deref().unwrap_or(&env.shell);
            let mut cmd = Command::new(shell);
            cmd.arg(file.path());
            (cmd, Some(file))
        } else if let Some(ref command) = self.command {
            let program = templates
                .render_template(command, template_context)
                .map_err(render_err)?;
            let args = templates
                .render_all(&self.args, template_context)
                .map_err(render_err)?;
            debug!("Command: {} {:?}", program, args);

            let mut cmd = Command::new(program);
            cmd.args(args);
            (cmd, None)
        } else {
            return Err(TaskActionError::new(
                "Either 'command' or 'script' must be provided",
            ));
        };

        for (key, value) in &self.env {
            let value = templates
                .render_template(value, template_context)
                .map_err(render_err)?;
            cmd.env(key, value);
        }
        if let Some(ref working_dir) = self.working_dir {
            let dir = templates
                .render_template(working_dir, template_context)
                .map_err(render_err)?;
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(limit, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(TaskActionError::new(format!("Failed to execute: {}", e)));
            }
            Err(_) => {
                return Err(TaskActionError::new(format!(
                    "Command timed out after {}",
                    humantime::format_duration(limit)
                )));
            }
        };

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

fn write_script(script: &str) -> std::result::Result<NamedTempFile, TaskActionError> {
    let mut file = NamedTempFile::new()
        .map_err(|e| TaskActionError::new(format!("Failed to create script file: {}", e)))?;
    file.write_all(script.as_bytes())
        .map_err(|e| TaskActionError::new(format!("Failed to write script file: {}", e)))?;
    file.flush()?;

    let mut perms = std::fs::metadata(file.path())?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(file.path(), perms)?;

    Ok(file)
}

pub struct CommandFactory;

impl ActionFactory for CommandFactory {
    fn action_type(&self) -> &'static str {
        "command"
    }

    fn validate_config(&self, config: &serde_yaml::Value) -> Result<()> {
        parse_config(config)?.invocation.validate(self.action_type())
    }

    fn build(&self, spec: ActionSpec, env: Arc<ActionEnv>) -> Result<BoxedAction> {
        let config = parse_config(&spec.config)?;
        config.invocation.validate(self.action_type())?;

        Ok(Box::new(CommandAction {
            limit: config.invocation.deadline(spec.timeout, &env),
            task_key: spec.task_key,
            config,
            creates: spec.creates,
            deletes: spec.deletes,
            env,
        }))
    }
}

fn parse_config(config: &serde_yaml::Value) -> Result<CommandConfig> {
    serde_yaml::from_value(config.clone())
        .map_err(|e| ActionError::invalid_config("command", e.to_string()))
}

/// Runs a command and, on success, marks `creates` as existing and `deletes`
/// as gone.
#[derive(Debug)]
pub struct CommandAction {
    task_key: String,
    config: CommandConfig,
    creates: Vec<String>,
    deletes: Vec<String>,
    limit: Duration,
    env: Arc<ActionEnv>,
}

impl CommandAction {
    pub fn limit(&self) -> Duration {
        self.limit
    }
}

#[async_trait]
impl TaskAction<ProvisionContext> for CommandAction {
    async fn run(
        &self,
        context: &mut SharedContext<ProvisionContext>,
    ) -> std::result::Result<(), TaskActionError> {
        let template_context = context
            .template_context(&self.env.plan, &self.env.run)
            .and_then(|ctx| ctx.to_json())
            .map_err(|e| TaskActionError::new(format!("Failed to build template context: {}", e)))?;

        let started = Instant::now();
        let output = self
            .config
            .invocation
            .execute(&self.env, &template_context, self.limit)
            .await?;

        debug!(
            "Command for {} exited with {} after {:?}\n{}",
            self.task_key,
            output.exit_code,
            started.elapsed(),
            output.combined()
        );

        if !self.config.expected_exit_codes.contains(&output.exit_code) {
            let stderr = output.stderr.trim();
            let message = if stderr.is_empty() {
                format!(
                    "Command exited with unexpected code {} (expected one of {:?})",
                    output.exit_code, self.config.expected_exit_codes
                )
            } else {
                format!("Command exited with code {}: {}", output.exit_code, stderr)
            };
            error!("{}: {}", self.task_key, message);
            return Err(TaskActionError::new(message));
        }

        info!(
            "Command for {} succeeded (created: {:?}, deleted: {:?})",
            self.task_key, self.creates, self.deletes
        );

        context.update(|_| {
            ProvisionPatch::new()
                .created(self.creates.iter().cloned())
                .deleted(self.deletes.iter().cloned())
                .output(self.task_key.clone(), output.stdout.trim())
        });

        Ok(())
    }
}
