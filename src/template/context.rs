// ABOUTME: Template context exposed to plan templates
// ABOUTME: Carries plan variables, known resources, captured outputs, and run metadata

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::env;

use super::error::{Result, TemplateError};

#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    pub variables: BTreeMap<String, String>,
    pub resources: ResourceView,
    pub outputs: BTreeMap<String, String>,
    pub plan: PlanInfo,
    pub run: RunInfo,
    pub system: SystemInfo,
}

/// Resource bookkeeping as seen by templates, e.g. `{{#each resources.existing}}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceView {
    pub existing: BTreeSet<String>,
    pub created: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanInfo {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub user: String,
    pub pwd: String,
}

impl TemplateContext {
    pub fn new(variables: BTreeMap<String, String>) -> Result<Self> {
        Ok(Self {
            variables,
            resources: ResourceView::default(),
            outputs: BTreeMap::new(),
            plan: PlanInfo::default(),
            run: RunInfo::default(),
            system: SystemInfo::collect()?,
        })
    }

    /// Context for a specific plan run.
    pub fn for_plan(
        variables: BTreeMap<String, String>,
        plan: PlanInfo,
        run: RunInfo,
    ) -> Result<Self> {
        let mut context = Self::new(variables)?;
        context.plan = plan;
        context.run = run;
        Ok(context)
    }

    pub fn with_resources(mut self, resources: ResourceView) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_outputs(mut self, outputs: BTreeMap<String, String>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn get_variable(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    /// Convert context to JSON for handlebars rendering
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(TemplateError::JsonError)
    }
}

impl PlanInfo {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            name: name.into(),
            description,
        }
    }
}

impl Default for PlanInfo {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
            description: None,
        }
    }
}

impl RunInfo {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
        }
    }
}

impl Default for RunInfo {
    fn default() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}

impl SystemInfo {
    pub fn collect() -> Result<Self> {
        let user = env::var("USER")
            .or_else(|_| env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());

        let pwd = env::current_dir()
            .map_err(TemplateError::IoError)?
            .display()
            .to_string();

        Ok(Self {
            os: env::consts::OS.to_string(),
            arch: env::consts::ARCH.to_string(),
            user,
            pwd,
        })
    }
}
