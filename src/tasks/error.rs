// ABOUTME: Error types for action construction and configuration checks
// ABOUTME: Raised while turning plan steps into runnable task actions

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("Unsupported action type: {action_type}")]
    UnsupportedAction { action_type: String },

    #[error("Invalid {action_type} configuration: {message}")]
    InvalidConfig {
        action_type: String,
        message: String,
    },
}

impl ActionError {
    pub fn invalid_config(action_type: &str, message: impl Into<String>) -> Self {
        ActionError::InvalidConfig {
            action_type: action_type.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ActionError>;
