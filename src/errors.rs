//! Error types for the wagering round engine
//!
//! Every player-facing failure is rejected before any state is mutated.
//! `Persistence` is the only variant that can surface after validation passed,
//! and callers must treat the round's true state as unknown when they see it.

use crate::games::types::{Amount, RoundStatus};

/// Root error type for all engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed bet amount, hazard count or cell index
    #[error("Validation error: {0}")]
    Validation(String),

    /// Round lookup, ownership, status or concurrency failures
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Balance too low to place the bet
    #[error("Insufficient funds: balance {available}, required {required}")]
    Funds { available: Amount, required: Amount },

    /// Cash-out attempted before the minimum number of reveals
    #[error("Policy error: need {required} moves, have {current}")]
    Policy { current: usize, required: usize },

    /// Storage or ledger write failure after validation passed
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Round state violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("round {0} not found")]
    RoundNotFound(String),

    #[error("round {round_id} is not owned by {player_id}")]
    NotOwner { round_id: String, player_id: String },

    #[error("round {round_id} is not active (status: {status})")]
    NotActive { round_id: String, status: RoundStatus },

    #[error("player {player_id} already has an active round {round_id}")]
    ActiveRoundExists { player_id: String, round_id: String },

    #[error("round {round_id} was modified concurrently (expected version {expected}, found {found})")]
    Conflict { round_id: String, expected: u64, found: u64 },
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        EngineError::Persistence(msg.into())
    }

    /// Stable machine-readable code, shared by logs and the HTTP layer
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::State(StateError::RoundNotFound(_)) => "NOT_FOUND",
            EngineError::State(_) => "STATE_ERROR",
            EngineError::Funds { .. } => "INSUFFICIENT_FUNDS",
            EngineError::Policy { .. } => "POLICY_ERROR",
            EngineError::Persistence(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::State(StateError::Conflict { .. }))
    }
}

// External error conversions
impl From<rocksdb::Error> for EngineError {
    fn from(e: rocksdb::Error) -> Self {
        EngineError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Persistence(format!("serialization failed: {}", e))
    }
}

// Convenience type alias for Results
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_error_names_counts() {
        let err = EngineError::Policy { current: 1, required: 2 };
        assert_eq!(err.to_string(), "Policy error: need 2 moves, have 1");
    }

    #[test]
    fn test_state_error_conversion() {
        let err: EngineError = StateError::RoundNotFound("r-1".to_string()).into();
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(err.to_string().contains("r-1"));
    }

    #[test]
    fn test_conflict_detection() {
        let err: EngineError = StateError::Conflict {
            round_id: "r-1".to_string(),
            expected: 2,
            found: 3,
        }
        .into();
        assert!(err.is_conflict());
        assert_eq!(err.code(), "STATE_ERROR");
        assert!(!EngineError::validation("x").is_conflict());
    }

    #[test]
    fn test_json_error_maps_to_persistence() {
        let json_err = serde_json::from_str::<u64>("not json").unwrap_err();
        let err: EngineError = json_err.into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
