// ABOUTME: Plan validation against the action registry and template syntax
// ABOUTME: Collects every error and warning into a report instead of stopping at the first

use std::collections::HashSet;
use std::sync::Arc;

use super::definition::Plan;
use super::error::ValidationError;
use super::step::StepConfig;
use crate::output::Destination;
use crate::tasks::{ActionError, ActionRegistry};
use crate::template::TemplateEngine;

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
    pub is_valid: bool,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

pub struct PlanValidator {
    registry: Arc<ActionRegistry>,
    templates: TemplateEngine,
}

impl PlanValidator {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(ActionRegistry::new()))
    }

    pub fn with_registry(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            templates: TemplateEngine::new(),
        }
    }

    pub fn validate(&self, plan: &Plan) -> ValidationReport {
        let mut report = ValidationReport::new();

        self.validate_groups(plan, &mut report);
        self.validate_steps(plan, &mut report);
        self.validate_templates(plan, &mut report);
        self.validate_output(plan, &mut report);
        self.check_skip_resources(plan, &mut report);

        if plan.tasks.is_empty() {
            report
                .warnings
                .push("Plan has no tasks; a run will complete immediately".to_string());
        }

        report.is_valid = report.errors.is_empty();
        report
    }

    fn validate_groups(&self, plan: &Plan, report: &mut ValidationReport) {
        let mut seen = HashSet::new();
        for group in &plan.groups {
            if !seen.insert(group.key.as_str()) {
                report.errors.push(ValidationError::DuplicateGroup {
                    group: group.key.clone(),
                });
            }
        }

        let used: HashSet<&str> = plan.tasks.iter().map(|t| t.group.as_str()).collect();
        for group in &plan.groups {
            if !used.contains(group.key.as_str()) {
                report
                    .warnings
                    .push(format!("Group '{}' has no tasks", group.key));
            }
        }
    }

    fn validate_steps(&self, plan: &Plan, report: &mut ValidationReport) {
        let groups: HashSet<&str> = plan.groups.iter().map(|g| g.key.as_str()).collect();
        let mut keys = HashSet::new();

        for step in &plan.tasks {
            if !keys.insert(step.key.as_str()) {
                report.errors.push(ValidationError::DuplicateTask {
                    task: step.key.clone(),
                });
            }

            if !groups.contains(step.group.as_str()) {
                report.errors.push(ValidationError::UnknownGroup {
                    task: step.key.clone(),
                    group: step.group.clone(),
                });
            }

            if let Some(ref condition) = step.skip_if {
                if let Err(reason) = condition.validate() {
                    report.errors.push(ValidationError::InvalidSkipCondition {
                        task: step.key.clone(),
                        reason,
                    });
                }
            }

            if let Err(error) = self.validate_step_config(step) {
                report.errors.push(error);
            }
        }
    }

    fn validate_step_config(&self, step: &StepConfig) -> Result<(), ValidationError> {
        match self.registry.validate_config(&step.step_type, &step.config) {
            Ok(()) => Ok(()),
            Err(ActionError::UnsupportedAction { action_type }) => {
                Err(ValidationError::UnsupportedStepType {
                    task: step.key.clone(),
                    step_type: action_type,
                    supported_types: self
                        .registry
                        .list_supported_actions()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                })
            }
            Err(e) => Err(ValidationError::InvalidStepConfig {
                task: step.key.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn validate_templates(&self, plan: &Plan, report: &mut ValidationReport) {
        for (key, value) in &plan.variables {
            self.check_template(&format!("variables.{}", key), value, report);
        }

        for step in &plan.tasks {
            self.check_yaml_templates(&format!("tasks.{}.config", step.key), &step.config, report);
        }

        self.check_template("output.destination", &plan.output.destination, report);
    }

    fn check_yaml_templates(
        &self,
        field: &str,
        value: &serde_yaml::Value,
        report: &mut ValidationReport,
    ) {
        match value {
            serde_yaml::Value::String(s) => self.check_template(field, s, report),
            serde_yaml::Value::Sequence(items) => {
                for (index, item) in items.iter().enumerate() {
                    self.check_yaml_templates(&format!("{}[{}]", field, index), item, report);
                }
            }
            serde_yaml::Value::Mapping(map) => {
                for (key, item) in map {
                    let key = key.as_str().unwrap_or("?");
                    self.check_yaml_templates(&format!("{}.{}", field, key), item, report);
                }
            }
            _ => {}
        }
    }

    fn check_template(&self, field: &str, template: &str, report: &mut ValidationReport) {
        if !template.contains("{{") {
            return;
        }
        if let Err(e) = self.templates.validate_template(template) {
            report.errors.push(ValidationError::InvalidTemplate {
                field: field.to_string(),
                error: e.to_string(),
            });
        }
    }

    fn validate_output(&self, plan: &Plan, report: &mut ValidationReport) {
        // Templated destinations are only checked after rendering
        if self.templates.has_templates(&plan.output.destination) {
            return;
        }
        if let Err(e) = plan.output.destination.parse::<Destination>() {
            report.errors.push(ValidationError::InvalidOutput {
                reason: e.to_string(),
            });
        }
    }

    /// Warn about skip conditions on resources nothing in the plan ever
    /// observes or changes; such steps behave the same on every rerun.
    fn check_skip_resources(&self, plan: &Plan, report: &mut ValidationReport) {
        let mut tracked: HashSet<&str> = HashSet::new();
        for step in &plan.tasks {
            tracked.extend(step.creates.iter().map(String::as_str));
            tracked.extend(step.deletes.iter().map(String::as_str));
            if step.step_type == "probe" {
                if let Some(resource) = step.config.get("resource").and_then(|r| r.as_str()) {
                    tracked.insert(resource);
                }
            }
        }

        for step in &plan.tasks {
            let resource = step.skip_if.as_ref().and_then(|c| c.resource());
            if let Some(resource) = resource {
                if !tracked.contains(resource) {
                    report.warnings.push(format!(
                        "Task '{}' skips on resource '{}' that no step probes, creates, or deletes",
                        step.key, resource
                    ));
                }
            }
        }
    }
}

impl Default for PlanValidator {
    fn default() -> Self {
        Self::new()
    }
}
