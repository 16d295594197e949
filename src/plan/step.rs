// ABOUTME: Plan step definitions and declarative skip conditions
// ABOUTME: A skip condition compiles into a skip predicate over the provisioning context

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::engine::SkipDecision;
use crate::tasks::ProvisionContext;

pub const ALREADY_EXISTS: &str = "Already exists";
pub const DOES_NOT_EXIST: &str = "Does not exist";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub key: String,
    /// Defaults to the key.
    #[serde(default)]
    pub title: Option<String>,
    pub group: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub skip_if: Option<SkipCondition>,
    /// Resources marked existing once the step succeeds.
    #[serde(default)]
    pub creates: Vec<String>,
    /// Resources marked gone once the step succeeds.
    #[serde(default)]
    pub deletes: Vec<String>,
    #[serde(with = "humantime_serde", default)]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub config: serde_yaml::Value,
}

impl StepConfig {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.key)
    }
}

/// `skip_if: { exists: bucket }` skips when the resource is known to exist,
/// `skip_if: { missing: bucket }` skips when it is not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCondition {
    #[serde(default)]
    pub exists: Option<String>,
    #[serde(default)]
    pub missing: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl SkipCondition {
    pub fn when_exists(resource: impl Into<String>) -> Self {
        Self {
            exists: Some(resource.into()),
            ..Self::default()
        }
    }

    pub fn when_missing(resource: impl Into<String>) -> Self {
        Self {
            missing: Some(resource.into()),
            ..Self::default()
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        match (&self.exists, &self.missing) {
            (None, None) => Err("one of 'exists' or 'missing' is required".to_string()),
            (Some(_), Some(_)) => Err("'exists' and 'missing' are mutually exclusive".to_string()),
            (Some(r), None) | (None, Some(r)) if r.trim().is_empty() => {
                Err("resource name cannot be empty".to_string())
            }
            _ => Ok(()),
        }
    }

    pub fn resource(&self) -> Option<&str> {
        self.exists.as_deref().or(self.missing.as_deref())
    }

    pub fn evaluate(&self, context: &ProvisionContext) -> SkipDecision {
        let (skip, default_reason) = match (&self.exists, &self.missing) {
            (Some(resource), _) => (context.exists(resource), ALREADY_EXISTS),
            (None, Some(resource)) => (!context.exists(resource), DOES_NOT_EXIST),
            (None, None) => (false, ""),
        };

        if !skip {
            return SkipDecision::Run;
        }
        match &self.reason {
            Some(reason) => SkipDecision::skip(reason.clone()),
            None => SkipDecision::skip(default_reason),
        }
    }

    pub fn into_predicate(
        self,
    ) -> impl Fn(&ProvisionContext) -> SkipDecision + Send + Sync + 'static {
        move |context| self.evaluate(context)
    }
}
