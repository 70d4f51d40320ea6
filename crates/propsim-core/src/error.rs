use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid numeric input to a pure formula (negative rate, non-positive term).
    #[error("Domain error: {field} — {reason}")]
    Domain { field: String, reason: String },

    /// Invalid simulation configuration, raised before any month executes.
    #[error("Configuration error: {field} — {reason}")]
    Config { field: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    pub(crate) fn domain(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Domain {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}
