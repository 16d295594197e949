// ABOUTME: Plan files: YAML definitions, validation, and assembly into task runners
// ABOUTME: Bridges declarative provisioning steps to the sequential engine

pub mod assemble;
pub mod definition;
pub mod error;
pub mod step;
pub mod validation;

pub use assemble::{AssembledRun, PlanAssembler};
pub use definition::{GroupConfig, Plan, PlanParser};
pub use error::{PlanError, Result, ValidationError};
pub use step::{SkipCondition, StepConfig, ALREADY_EXISTS, DOES_NOT_EXIST};
pub use validation::{PlanValidator, ValidationReport};
