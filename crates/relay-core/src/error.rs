use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid relay {relay}: must be between 1 and {count}")]
    InvalidRelay { relay: u8, count: u8 },

    #[error("hardware unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("invalid schedule expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("configuration unavailable: {0}")]
    ConfigUnavailable(String),

    #[error("schedule not found: {0}")]
    ScheduleNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RelayError {
    pub(crate) fn hardware(context: &str, err: impl std::fmt::Display) -> Self {
        Self::HardwareUnavailable(format!("{context}: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
