use thiserror::Error;

use crate::decision::DecisionError;

/// Errors raised while building or running simulations.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid statistics for {team}: {reason}")]
    InvalidStatistics { team: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed game state after play {play}: {reason}")]
    MalformedGameState { play: usize, reason: String },

    #[error("Fourth-down decision failed: {0}")]
    DecisionFunction(#[from] DecisionError),

    #[error("All simulation chunks failed ({completed_chunks}/{total_chunks} completed)")]
    WorkerFailure {
        completed_chunks: usize,
        total_chunks: usize,
    },

    #[error("Simulation cancelled before any game completed ({completed_chunks}/{total_chunks} chunks)")]
    Cancelled {
        completed_chunks: usize,
        total_chunks: usize,
    },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Unknown team: {0}")]
    UnknownTeam(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SimError {
    pub(crate) fn invalid_stats(team: &str, reason: impl Into<String>) -> Self {
        SimError::InvalidStatistics {
            team: team.to_string(),
            reason: reason.into(),
        }
    }

    /// Errors the serving layer should report as a bad request rather than an
    /// internal failure.
    pub fn is_client_error(&self) -> bool {
        match self {
            SimError::InvalidStatistics { .. } => true,
            SimError::InvalidConfig(_) => true,
            SimError::UnknownTeam(_) => true,
            SimError::UnknownStrategy(_) => true,
            SimError::Parse(_) => true,
            _ => false,
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
