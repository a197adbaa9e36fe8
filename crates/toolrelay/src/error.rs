use serde::Serialize;

use crate::provider::ModelError;

/// Classification of a failed tool call, as seen by the loop and dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No tool with that name is registered.
    NotFound,
    /// Arguments did not satisfy the declared schema.
    Validation,
    /// The tool ran and reported a semantic failure (e.g. division by zero).
    Domain,
    /// The backend could not be reached or did not answer in time.
    BackendUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Domain => "domain",
            Self::BackendUnavailable => "backend_unavailable",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the relay core.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Tool discovery failed: {0}")]
    Discovery(String),

    #[error("Unknown tool '{0}'")]
    NotFound(String),

    #[error("Invalid arguments for '{tool}': {message}")]
    Validation { tool: String, message: String },

    #[error("No final answer within {0} model turns")]
    TurnBudgetExceeded(u32),

    #[error("Model service error: {0}")]
    Model(#[from] ModelError),

    #[error(transparent)]
    Config(#[from] relayconf::ConfigError),
}

pub type Result<T, E = RelayError> = std::result::Result<T, E>;
