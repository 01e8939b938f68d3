//! Agent error types.

use thiserror::Error;

use crate::types::SurfaceId;

/// Errors that can end an agent task.
///
/// Every variant is terminal for the task that produced it; none is retried.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("screenshot capture failed: {0}")]
    Capture(String),

    #[error("decision service unreachable: {0}")]
    Transport(String),

    #[error("decision service returned HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("malformed decision response: {0}")]
    DecisionParse(String),

    #[error("nested surface {surface} is no longer attached")]
    MissingSurface { surface: SurfaceId },

    #[error("input dispatch failed: {0}")]
    Dispatch(String),

    #[error("invalid scale factor: {0}")]
    InvalidScale(f64),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AgentError {
    /// Short stable name, used as a metrics label and in task reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Capture(_) => "capture",
            Self::Transport(_) => "transport",
            Self::Service { .. } => "service",
            Self::DecisionParse(_) => "decision_parse",
            Self::MissingSurface { .. } => "missing_surface",
            Self::Dispatch(_) => "dispatch",
            Self::InvalidScale(_) => "invalid_scale",
            Self::InvalidAction(_) => "invalid_action",
            Self::Other(_) => "other",
        }
    }
}

pub type Result<T, E = AgentError> = std::result::Result<T, E>;
