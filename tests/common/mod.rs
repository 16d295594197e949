// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides recording engine actions, a plan YAML builder, and scratch environments

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs;

use stagehand::engine::{SharedContext, SkipDecision, Task, TaskAction, TaskActionError};

/// Context used by engine-level tests: task key -> value written by the task.
pub type TestContext = BTreeMap<String, String>;

/// Shared log of action invocations, in call order.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: &str) {
        self.0.lock().unwrap().push(key.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, key: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|k| *k == key).count()
    }
}

/// Action that logs its invocation, optionally sleeps, then succeeds by
/// writing `key -> "done"` into the context or fails with a fixed message.
pub struct RecordingAction {
    key: String,
    log: CallLog,
    failure: Option<String>,
    delay: Duration,
}

#[async_trait]
impl TaskAction<TestContext> for RecordingAction {
    async fn run(&self, context: &mut SharedContext<TestContext>) -> Result<(), TaskActionError> {
        self.log.record(&self.key);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(message) => Err(TaskActionError::new(message.clone())),
            None => {
                let key = self.key.clone();
                context.update(move |_| BTreeMap::from([(key, "done".to_string())]));
                Ok(())
            }
        }
    }
}

pub fn ok_task(key: &str, group: &str, log: &CallLog) -> Task<TestContext> {
    recording_task(key, group, log, None, Duration::ZERO)
}

pub fn slow_task(key: &str, group: &str, log: &CallLog, delay: Duration) -> Task<TestContext> {
    recording_task(key, group, log, None, delay)
}

pub fn failing_task(key: &str, group: &str, message: &str, log: &CallLog) -> Task<TestContext> {
    recording_task(key, group, log, Some(message.to_string()), Duration::ZERO)
}

/// A task whose skip predicate always returns `Skip(reason)`.
pub fn skipped_task(key: &str, group: &str, reason: &str, log: &CallLog) -> Task<TestContext> {
    let reason = reason.to_string();
    ok_task(key, group, log).with_skip(move |_| SkipDecision::skip(reason.clone()))
}

fn recording_task(
    key: &str,
    group: &str,
    log: &CallLog,
    failure: Option<String>,
    delay: Duration,
) -> Task<TestContext> {
    Task::new(
        key,
        format!("Task {}", key),
        group,
        RecordingAction {
            key: key.to_string(),
            log: log.clone(),
            failure,
            delay,
        },
    )
}

pub struct TestStep {
    pub key: String,
    pub group: String,
    pub step_type: String,
    pub command: String,
    pub args: Vec<String>,
    pub extra: Vec<String>,
}

/// Builds plan YAML for plan-level and CLI tests.
pub struct TestPlanBuilder {
    name: String,
    exit_on_error: bool,
    variables: Vec<(String, String)>,
    groups: Vec<(String, String)>,
    steps: Vec<TestStep>,
    output: Option<(String, String)>,
}

impl TestPlanBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            exit_on_error: true,
            variables: Vec::new(),
            groups: Vec::new(),
            steps: Vec::new(),
            output: None,
        }
    }

    pub fn continue_on_error(mut self) -> Self {
        self.exit_on_error = false;
        self
    }

    pub fn with_variable(mut self, key: &str, value: &str) -> Self {
        self.variables.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_group(mut self, key: &str, title: &str) -> Self {
        self.groups.push((key.to_string(), title.to_string()));
        self
    }

    pub fn with_output(mut self, format: &str, destination: &str) -> Self {
        self.output = Some((format.to_string(), destination.to_string()));
        self
    }

    pub fn add_echo_step(self, key: &str, group: &str, message: &str) -> Self {
        self.add_command_step(key, group, "echo", &[message], &[])
    }

    pub fn add_failing_step(self, key: &str, group: &str) -> Self {
        self.add_command_step(key, group, "sh", &["-c", "echo boom >&2; exit 1"], &[])
    }

    /// Probe that finds `resource` when `exists` is true.
    pub fn add_probe_step(self, key: &str, group: &str, resource: &str, exists: bool) -> Self {
        let command = if exists { "true" } else { "false" };
        let resource_line = format!("resource: {}", resource);
        self.add_step(key, group, "probe", command, &[], &[], &[&resource_line])
    }

    /// Echo step that creates `resource` unless it already exists.
    pub fn add_create_step(self, key: &str, group: &str, resource: &str) -> Self {
        let skip = format!("skip_if: {{ exists: {} }}", resource);
        let creates = format!("creates: [{}]", resource);
        self.add_step(key, group, "command", "echo", &[key], &[&skip, &creates], &[])
    }

    pub fn add_command_step(
        self,
        key: &str,
        group: &str,
        command: &str,
        args: &[&str],
        extra: &[&str],
    ) -> Self {
        self.add_step(key, group, "command", command, args, extra, &[])
    }

    #[allow(clippy::too_many_arguments)]
    fn add_step(
        mut self,
        key: &str,
        group: &str,
        step_type: &str,
        command: &str,
        args: &[&str],
        extra: &[&str],
        config_extra: &[&str],
    ) -> Self {
        let mut extra: Vec<String> = extra.iter().map(|s| s.to_string()).collect();
        extra.extend(config_extra.iter().map(|s| format!("config.{}", s)));
        self.steps.push(TestStep {
            key: key.to_string(),
            group: group.to_string(),
            step_type: step_type.to_string(),
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            extra,
        });
        self
    }

    pub fn generate_yaml(&self) -> String {
        let mut yaml = format!(
            "name: {}\nexit_on_error: {}\n\n",
            self.name, self.exit_on_error
        );

        if !self.variables.is_empty() {
            yaml.push_str("variables:\n");
            for (key, value) in &self.variables {
                yaml.push_str(&format!("  {}: \"{}\"\n", key, value));
            }
        }

        yaml.push_str("groups:\n");
        for (key, title) in &self.groups {
            yaml.push_str(&format!("  - {{ key: {}, title: \"{}\" }}\n", key, title));
        }
        if self.groups.is_empty() {
            yaml.push_str("  []\n");
        }

        yaml.push_str("tasks:\n");
        for step in &self.steps {
            yaml.push_str(&format!("  - key: {}\n", step.key));
            yaml.push_str(&format!("    group: {}\n", step.group));
            yaml.push_str(&format!("    type: {}\n", step.step_type));
            for line in step.extra.iter().filter(|l| !l.starts_with("config.")) {
                yaml.push_str(&format!("    {}\n", line));
            }
            yaml.push_str("    config:\n");
            yaml.push_str(&format!("      command: \"{}\"\n", step.command));
            for line in step.extra.iter().filter_map(|l| l.strip_prefix("config.")) {
                yaml.push_str(&format!("      {}\n", line));
            }
            if !step.args.is_empty() {
                yaml.push_str("      args:\n");
                for arg in &step.args {
                    yaml.push_str(&format!("        - \"{}\"\n", arg));
                }
            }
        }
        if self.steps.is_empty() {
            yaml.push_str("  []\n");
        }

        if let Some((format, destination)) = &self.output {
            yaml.push_str(&format!(
                "\noutput:\n  format: {}\n  destination: \"{}\"\n",
                format, destination
            ));
        }

        yaml
    }

    pub async fn write_to_file(&self, path: &Path) -> std::io::Result<()> {
        fs::write(path, self.generate_yaml()).await
    }
}

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn plan_file(&self, name: &str) -> PathBuf {
        self.path().join(format!("{}.yaml", name))
    }

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.path().join(format!("{}_report.json", name))
    }

    /// `file://` destination for `output_file(name)`.
    pub fn output_destination(&self, name: &str) -> String {
        format!("file://{}", self.output_file(name).display())
    }

    pub async fn create_plan_file(&self, name: &str, builder: &TestPlanBuilder) -> PathBuf {
        let plan_file = self.plan_file(name);
        builder
            .write_to_file(&plan_file)
            .await
            .expect("Failed to write plan file");
        plan_file
    }
}

pub async fn read_json_output(
    file_path: &Path,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(file_path).await?;
    let json: serde_json::Value = serde_json::from_str(&content)?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand::plan::Plan;

    #[test]
    fn test_plan_builder_yaml_parses() {
        let builder = TestPlanBuilder::new("builder")
            .with_variable("env", "test")
            .with_group("g", "Group")
            .add_probe_step("probe", "g", "thing", true)
            .add_create_step("create", "g", "thing")
            .add_failing_step("fail", "g");

        let plan = Plan::from_yaml(&builder.generate_yaml()).unwrap();

        assert_eq!(plan.tasks.len(), 3);
        assert_eq!(plan.tasks[0].config["resource"].as_str(), Some("thing"));
        assert_eq!(plan.tasks[1].creates, vec!["thing".to_string()]);
        assert!(plan.tasks[1].skip_if.is_some());
    }

    #[test]
    fn test_environment_setup() {
        let env = TestEnvironment::new();
        assert!(env.path().exists());
        assert!(env.output_destination("x").starts_with("file://"));
    }
}
