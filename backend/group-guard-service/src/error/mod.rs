use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Classification ambiguous: {0}")]
    ClassificationAmbiguous(String),

    #[error("Actor could not be attributed for {0} event")]
    AttributionUnknown(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Remediation failed: {action}: {reason}")]
    RemediationFailed { action: String, reason: String },

    #[error("Emergency condition: {0}")]
    EmergencyCondition(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Gateway call timed out after {0:?}")]
    GatewayTimeout(Duration),

    #[error("Gateway rejected request: {0}")]
    Gateway(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GuardError {
    /// Plain-language text shown in the group when an action cannot be carried out.
    pub fn user_notice(&self) -> &'static str {
        match self {
            GuardError::GatewayTimeout(_) => {
                "The messaging service did not respond in time. Please try again later."
            }
            GuardError::Gateway(_) | GuardError::Http(_) | GuardError::RemediationFailed { .. } => {
                "Action failed: the bot lacks permission to do this in the group."
            }
            GuardError::StorageUnavailable(_) | GuardError::Database(_) | GuardError::Redis(_) => {
                "Moderation records are temporarily unavailable."
            }
            _ => "Something went wrong while moderating this group.",
        }
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;
