// ABOUTME: Provisioning context threaded through plan-driven runs
// ABOUTME: Tracks which resources exist, what this run created or deleted, and captured step output

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::engine::Merge;
use crate::template::{self, PlanInfo, ResourceView, RunInfo, TemplateContext};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionContext {
    pub variables: BTreeMap<String, String>,
    /// Resources currently known to exist.
    pub existing: BTreeSet<String>,
    pub created: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
    /// Trimmed stdout of each completed step, keyed by task key.
    pub outputs: BTreeMap<String, String>,
}

impl ProvisionContext {
    pub fn new(variables: BTreeMap<String, String>) -> Self {
        Self {
            variables,
            ..Self::default()
        }
    }

    pub fn exists(&self, resource: &str) -> bool {
        self.existing.contains(resource)
    }

    pub fn output(&self, task_key: &str) -> Option<&str> {
        self.outputs.get(task_key).map(String::as_str)
    }

    pub fn resources(&self) -> ResourceView {
        ResourceView {
            existing: self.existing.clone(),
            created: self.created.clone(),
            deleted: self.deleted.clone(),
        }
    }

    /// Template view of this context for the given plan run.
    pub fn template_context(
        &self,
        plan: &PlanInfo,
        run: &RunInfo,
    ) -> template::Result<TemplateContext> {
        Ok(
            TemplateContext::for_plan(self.variables.clone(), plan.clone(), run.clone())?
                .with_resources(self.resources())
                .with_outputs(self.outputs.clone()),
        )
    }
}

/// Partial update produced by a step and merged into [`ProvisionContext`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionPatch {
    pub variables: BTreeMap<String, String>,
    pub found: BTreeSet<String>,
    pub missing: BTreeSet<String>,
    pub created: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
    pub outputs: BTreeMap<String, String>,
}

impl ProvisionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn found(mut self, resource: impl Into<String>) -> Self {
        self.found.insert(resource.into());
        self
    }

    pub fn missing(mut self, resource: impl Into<String>) -> Self {
        self.missing.insert(resource.into());
        self
    }

    pub fn created<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.created.extend(resources.into_iter().map(Into::into));
        self
    }

    pub fn deleted<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deleted.extend(resources.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, task_key: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.insert(task_key.into(), value.into());
        self
    }

    pub fn variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Merge for ProvisionContext {
    type Patch = ProvisionPatch;

    /// `created` and `deleted` accumulate over the run; `existing` always
    /// reflects the latest observation.
    fn merge(&mut self, patch: ProvisionPatch) {
        self.variables.extend(patch.variables);
        self.outputs.extend(patch.outputs);

        for resource in patch.found {
            self.existing.insert(resource);
        }
        for resource in patch.missing {
            self.existing.remove(&resource);
        }
        for resource in patch.created {
            self.existing.insert(resource.clone());
            self.created.insert(resource);
        }
        for resource in patch.deleted {
            self.existing.remove(&resource);
            self.deleted.insert(resource);
        }
    }
}
