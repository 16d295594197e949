// ABOUTME: Plan file data structures and YAML parsing
// ABOUTME: A plan declares variables, display groups, ordered steps, and report output

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use super::error::{PlanError, Result};
use super::step::StepConfig;
use crate::engine::{FailurePolicy, Group};
use crate::output::OutputConfig;

fn default_exit_on_error() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `false` selects continue-on-error.
    #[serde(default = "default_exit_on_error")]
    pub exit_on_error: bool,
    /// Resolved in declaration order; values may reference earlier variables.
    #[serde(default)]
    pub variables: IndexMap<String, String>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub tasks: Vec<StepConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub key: String,
    pub title: String,
}

impl Plan {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let plan: Plan = serde_yaml::from_str(content).map_err(PlanError::YamlError)?;
        plan.validate_structure()?;
        Ok(plan)
    }

    /// Checks that need no registry: required fields are present and non-empty.
    fn validate_structure(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PlanError::MissingField("name".to_string()));
        }

        for (index, step) in self.tasks.iter().enumerate() {
            if step.key.trim().is_empty() {
                return Err(PlanError::MissingField(format!("tasks[{}].key", index)));
            }
            if step.group.trim().is_empty() {
                return Err(PlanError::MissingField(format!("tasks.{}.group", step.key)));
            }
            if step.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
                return Err(PlanError::MissingField(format!("tasks.{}.title", step.key)));
            }
        }

        for (index, group) in self.groups.iter().enumerate() {
            if group.key.trim().is_empty() {
                return Err(PlanError::MissingField(format!("groups[{}].key", index)));
            }
        }

        Ok(())
    }

    pub fn policy(&self) -> FailurePolicy {
        FailurePolicy::from_exit_on_error(self.exit_on_error)
    }

    pub fn engine_groups(&self) -> Vec<Group> {
        self.groups
            .iter()
            .map(|g| Group::new(g.key.clone(), g.title.clone()))
            .collect()
    }

    pub fn task_keys(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.key.as_str()).collect()
    }

    pub fn get_task(&self, key: &str) -> Option<&StepConfig> {
        self.tasks.iter().find(|t| t.key == key)
    }

    pub fn merge_variables<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.variables.extend(vars);
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(PlanError::YamlError)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanParser;

impl PlanParser {
    pub fn new() -> Self {
        Self
    }

    pub async fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Plan> {
        let content = fs::read_to_string(path.as_ref())
            .await
            .map_err(PlanError::IoError)?;
        self.parse_string(&content)
    }

    pub fn parse_string(&self, content: &str) -> Result<Plan> {
        Plan::from_yaml(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC_PLAN: &str = r#"
name: analytics-stack
description: Provision the ingestion stack
variables:
  region: us-east-1
  bucket: "{{variables.region}}-events"
groups:
  - { key: discover, title: Discover }
  - { key: storage, title: Storage }
tasks:
  - key: check-bucket
    title: Check bucket
    group: discover
    type: probe
    config: { resource: bucket, command: "true" }
  - key: create-bucket
    group: storage
    type: command
    skip_if: { exists: bucket }
    creates: [bucket]
    config: { command: echo, args: [created] }
output:
  format: yaml
  destination: "file://./out/result.yaml"
"#;

    #[test]
    fn test_parse_basic_plan() {
        let plan = Plan::from_yaml(BASIC_PLAN).unwrap();

        assert_eq!(plan.name, "analytics-stack");
        assert!(plan.exit_on_error);
        assert_eq!(plan.policy(), FailurePolicy::HaltOnError);
        assert_eq!(plan.task_keys(), vec!["check-bucket", "create-bucket"]);
        assert_eq!(plan.engine_groups()[1], Group::new("storage", "Storage"));
        assert_eq!(plan.output.format, OutputFormat::Yaml);
        assert_eq!(
            plan.variables.keys().collect::<Vec<_>>(),
            vec!["region", "bucket"]
        );
        assert_eq!(
            plan.get_task("create-bucket").unwrap().display_title(),
            "create-bucket"
        );
    }

    #[test]
    fn test_continue_on_error_policy() {
        let plan = Plan::from_yaml("name: teardown\nexit_on_error: false\n").unwrap();
        assert_eq!(plan.policy(), FailurePolicy::ContinueOnError);
        assert!(plan.tasks.is_empty());
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = Plan::from_yaml("name: \"\"\n");
        assert!(matches!(result, Err(PlanError::MissingField(field)) if field == "name"));
    }

    #[test]
    fn test_empty_group_rejected() {
        let yaml = r#"
name: p
tasks:
  - { key: a, group: "", type: command, config: { command: "true" } }
"#;
        assert!(matches!(
            Plan::from_yaml(yaml),
            Err(PlanError::MissingField(field)) if field == "tasks.a.group"
        ));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            Plan::from_yaml("name: [unclosed"),
            Err(PlanError::YamlError(_))
        ));
    }

    #[tokio::test]
    async fn test_parse_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC_PLAN.as_bytes()).unwrap();

        let plan = PlanParser::new().parse_file(temp_file.path()).await.unwrap();
        assert_eq!(plan.tasks.len(), 2);

        let reparsed = Plan::from_yaml(&plan.to_yaml().unwrap()).unwrap();
        assert_eq!(reparsed.name, plan.name);
    }
}
