// ABOUTME: Handlebars helper functions for plan templates
// ABOUTME: Timestamps, UUIDs, environment lookups, and case/slug helpers for resource names

use chrono::Utc;
use handlebars::{
    Context, Handlebars, Helper, HelperResult, Output, RenderContext, RenderError,
    RenderErrorReason,
};
use std::env;
use uuid::Uuid;

fn helper_error(message: impl Into<String>) -> RenderError {
    RenderErrorReason::Other(message.into()).into()
}

fn string_param<'a>(h: &'a Helper, index: usize, helper: &str) -> Result<&'a str, RenderError> {
    h.param(index)
        .and_then(|v| v.value().as_str())
        .ok_or_else(|| helper_error(format!("{} helper requires a string parameter", helper)))
}

/// Timestamp helper - formats current time with optional format string
pub fn timestamp_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let format = h
        .param(0)
        .and_then(|v| v.value().as_str())
        .unwrap_or("%Y-%m-%d %H:%M:%S");

    out.write(&Utc::now().format(format).to_string())?;
    Ok(())
}

pub fn uuid_helper(
    _h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&Uuid::new_v4().to_string())?;
    Ok(())
}

/// `{{env "NAME" "fallback"}}`
pub fn env_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let var_name = string_param(h, 0, "env")?;
    let default_value = h.param(1).and_then(|v| v.value().as_str()).unwrap_or("");

    let value = env::var(var_name).unwrap_or_else(|_| default_value.to_string());
    out.write(&value)?;
    Ok(())
}

pub fn upper_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&string_param(h, 0, "upper")?.to_uppercase())?;
    Ok(())
}

pub fn lower_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&string_param(h, 0, "lower")?.to_lowercase())?;
    Ok(())
}

/// Lowercase and collapse anything that is not alphanumeric into single
/// dashes. Cloud resource names (buckets, topics) reject most punctuation.
pub fn slug_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let input = string_param(h, 0, "slug")?;

    let mut slug = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }

    out.write(slug.trim_end_matches('-'))?;
    Ok(())
}

/// Default helper - provides default value if variable is empty
pub fn default_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _rc: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let value = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    let default_value = string_param(h, 1, "default")?;

    out.write(if value.is_empty() { default_value } else { value })?;
    Ok(())
}

pub fn register_helpers(handlebars: &mut Handlebars) {
    handlebars.register_helper("timestamp", Box::new(timestamp_helper));
    handlebars.register_helper("uuid", Box::new(uuid_helper));
    handlebars.register_helper("env", Box::new(env_helper));
    handlebars.register_helper("upper", Box::new(upper_helper));
    handlebars.register_helper("lower", Box::new(lower_helper));
    handlebars.register_helper("slug", Box::new(slug_helper));
    handlebars.register_helper("default", Box::new(default_helper));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_handlebars() -> Handlebars<'static> {
        let mut handlebars = Handlebars::new();
        register_helpers(&mut handlebars);
        handlebars
    }

    #[test]
    fn test_timestamp_helper() {
        let handlebars = create_test_handlebars();
        let year = handlebars
            .render_template("{{timestamp \"%Y\"}}", &json!({}))
            .unwrap();
        assert_eq!(year.len(), 4);
    }

    #[test]
    fn test_uuid_helper() {
        let handlebars = create_test_handlebars();
        let result = handlebars.render_template("{{uuid}}", &json!({})).unwrap();
        assert_eq!(result.len(), 36);
    }

    #[test]
    fn test_env_helper_default() {
        let handlebars = create_test_handlebars();
        let result = handlebars
            .render_template(
                "{{env \"STAGEHAND_SURELY_UNSET_VAR\" \"fallback\"}}",
                &json!({}),
            )
            .unwrap();
        assert_eq!(result, "fallback");
    }

    #[test]
    fn test_case_helpers() {
        let handlebars = create_test_handlebars();
        let upper = handlebars
            .render_template("{{upper \"eu-west-1\"}}", &json!({}))
            .unwrap();
        assert_eq!(upper, "EU-WEST-1");

        let lower = handlebars
            .render_template("{{lower name}}", &json!({"name": "Ingest"}))
            .unwrap();
        assert_eq!(lower, "ingest");
    }

    #[test]
    fn test_slug_helper() {
        let handlebars = create_test_handlebars();
        let result = handlebars
            .render_template("{{slug \"My Analytics_Stack!\"}}", &json!({}))
            .unwrap();
        assert_eq!(result, "my-analytics-stack");
    }

    #[test]
    fn test_default_helper() {
        let handlebars = create_test_handlebars();
        let result = handlebars
            .render_template("{{default \"\" \"fallback\"}}", &json!({}))
            .unwrap();
        assert_eq!(result, "fallback");

        let result = handlebars
            .render_template("{{default \"value\" \"fallback\"}}", &json!({}))
            .unwrap();
        assert_eq!(result, "value");
    }

    #[test]
    fn test_missing_parameter_is_error() {
        let handlebars = create_test_handlebars();
        assert!(handlebars.render_template("{{upper}}", &json!({})).is_err());
    }
}
