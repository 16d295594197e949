// ABOUTME: Error types for plan parsing, validation, and assembly
// ABOUTME: Structural parse failures are fatal; validation errors are collected into a report

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Failed to read plan file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Plan is invalid: {}", format_errors(.0))]
    Invalid(Vec<ValidationError>),

    #[error("Template error: {0}")]
    TemplateError(#[from] crate::template::TemplateError),

    #[error("Action error in step '{task}': {source}")]
    ActionError {
        task: String,
        #[source]
        source: crate::tasks::ActionError,
    },

    #[error("Engine error: {0}")]
    EngineError(#[from] crate::engine::EngineError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Duplicate task key: {task}")]
    DuplicateTask { task: String },

    #[error("Duplicate group key: {group}")]
    DuplicateGroup { group: String },

    #[error("Task '{task}' references unknown group '{group}'")]
    UnknownGroup { task: String, group: String },

    #[error("Unsupported step type '{step_type}' in task '{task}'. Supported types: {supported_types:?}")]
    UnsupportedStepType {
        task: String,
        step_type: String,
        supported_types: Vec<String>,
    },

    #[error("Invalid configuration for '{task}': {reason}")]
    InvalidStepConfig { task: String, reason: String },

    #[error("Invalid skip condition for '{task}': {reason}")]
    InvalidSkipCondition { task: String, reason: String },

    #[error("Invalid template syntax in '{field}': {error}")]
    InvalidTemplate { field: String, error: String },

    #[error("Invalid output configuration: {reason}")]
    InvalidOutput { reason: String },
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, PlanError>;
