// ABOUTME: Template engine module for stagehand plans
// ABOUTME: Provides handlebars rendering and the context plan templates see

pub mod context;
pub mod engine;
pub mod error;
pub mod helpers;

pub use context::{PlanInfo, ResourceView, RunInfo, SystemInfo, TemplateContext};
pub use engine::TemplateEngine;
pub use error::{Result, TemplateError};
