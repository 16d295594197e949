// ABOUTME: Template engine implementation using Handlebars
// ABOUTME: Renders step arguments, scripts, and plan variables against the run context

use handlebars::Handlebars;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tracing::debug;

use super::context::TemplateContext;
use super::error::{Result, TemplateError};
use super::helpers;

#[derive(Clone)]
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    /// Create a new template engine with all built-in helpers
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();

        handlebars.set_strict_mode(false);
        handlebars.set_dev_mode(false);

        // Output goes to shell commands, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        helpers::register_helpers(&mut handlebars);

        Self { handlebars }
    }

    /// Render a template string with a raw JSON context
    pub fn render_template(&self, template: &str, context: &JsonValue) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .map_err(TemplateError::HandlebarsError)
    }

    pub fn render(&self, template: &str, context: &TemplateContext) -> Result<String> {
        let json_context = context.to_json()?;
        self.render_template(template, &json_context)
    }

    /// Render every string in a list, skipping the handlebars pass for plain
    /// strings.
    pub fn render_all(&self, templates: &[String], context: &JsonValue) -> Result<Vec<String>> {
        templates
            .iter()
            .map(|t| {
                if self.has_templates(t) {
                    self.render_template(t, context)
                } else {
                    Ok(t.clone())
                }
            })
            .collect()
    }

    /// Resolve plan variables in declaration order so later variables can
    /// reference earlier ones. `overrides` replace plan values and are taken
    /// verbatim.
    pub fn resolve_variables(
        &self,
        declared: &[(String, String)],
        overrides: &BTreeMap<String, String>,
        context: &TemplateContext,
    ) -> Result<BTreeMap<String, String>> {
        let mut context = context.clone();

        for (key, value) in declared {
            let resolved = match overrides.get(key) {
                Some(value) => value.clone(),
                None => self.render(value, &context)?,
            };
            debug!("Resolved variable {} = {}", key, resolved);
            context.variables.insert(key.clone(), resolved);
        }

        for (key, value) in overrides {
            context
                .variables
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        Ok(context.variables)
    }

    /// Recursively resolve templates in JSON values
    pub fn resolve_json_templates(
        &self,
        value: &JsonValue,
        context: &JsonValue,
    ) -> Result<JsonValue> {
        match value {
            JsonValue::String(s) => Ok(JsonValue::String(self.render_template(s, context)?)),
            JsonValue::Array(arr) => {
                let resolved: Result<Vec<JsonValue>> = arr
                    .iter()
                    .map(|v| self.resolve_json_templates(v, context))
                    .collect();
                Ok(JsonValue::Array(resolved?))
            }
            JsonValue::Object(obj) => {
                let mut resolved_obj = serde_json::Map::new();
                for (key, val) in obj {
                    resolved_obj.insert(key.clone(), self.resolve_json_templates(val, context)?);
                }
                Ok(JsonValue::Object(resolved_obj))
            }
            other => Ok(other.clone()),
        }
    }

    /// Validate template syntax without rendering
    pub fn validate_template(&self, template: &str) -> Result<()> {
        handlebars::Template::compile(template)
            .map(|_| ())
            .map_err(|e| TemplateError::SyntaxError(e.to_string()))
    }

    /// Check if a string contains template expressions
    pub fn has_templates(&self, text: &str) -> bool {
        text.contains("{{") && text.contains("}}")
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}
