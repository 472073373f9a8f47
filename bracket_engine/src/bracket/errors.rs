//! Bracket error types.

use thiserror::Error;

use super::models::{MatchId, MatchKey, MatchStatus};
use crate::db::timeouts::TimeoutError;
use crate::ledger::LedgerError;
use crate::tournament::{TournamentFormat, TournamentId, TournamentStatus};

/// Bracket engine errors
#[derive(Debug, Error)]
pub enum BracketError {
    /// Matches already exist for the tournament
    #[error("Bracket already generated for tournament {0}")]
    AlreadyGenerated(TournamentId),

    /// Not enough active entrants to build a bracket
    #[error("Insufficient entrants: need {needed}, have {current}")]
    InsufficientEntrants { needed: usize, current: usize },

    /// Format the engine cannot build
    #[error("Unsupported tournament format: {0}")]
    UnsupportedFormat(String),

    /// Tied score where a winner is required
    #[error("Tied score in match {match_id} where a winner is required")]
    AmbiguousResult { match_id: MatchId },

    /// Result reported for a match that cannot take one
    #[error("Match {match_id} is not ready (status {status})")]
    MatchNotReady { match_id: MatchId, status: MatchStatus },

    /// Progression target does not exist
    #[error("Downstream match {0} is missing")]
    DownstreamMatchMissing(MatchKey),

    /// Tournament not found
    #[error("Tournament {0} not found")]
    TournamentNotFound(TournamentId),

    /// Match not found
    #[error("Match {0} not found")]
    MatchNotFound(MatchId),

    /// Tournament is in the wrong lifecycle state
    #[error("Invalid tournament state: expected {expected}, got {actual}")]
    InvalidTournamentState {
        expected: TournamentStatus,
        actual: TournamentStatus,
    },

    /// Match status transition not allowed
    #[error("Invalid match transition from {from} to {to}")]
    InvalidTransition { from: MatchStatus, to: MatchStatus },

    /// Cancellation in a format that cannot route around it
    #[error("Match {match_id} cannot be cancelled in a {format} tournament")]
    CancelNotSupported {
        match_id: MatchId,
        format: TournamentFormat,
    },

    /// Stored data the engine cannot interpret
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Ledger error during prize payout
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database operation timed out
    #[error("Database operation timed out")]
    Timeout,
}

impl From<TimeoutError> for BracketError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Timeout(_) => BracketError::Timeout,
            TimeoutError::Database(e) => BracketError::Database(e),
        }
    }
}

impl BracketError {
    /// Get a client-safe error message that doesn't leak internal details
    pub fn client_message(&self) -> String {
        match self {
            BracketError::Database(_) | BracketError::Timeout => {
                "Internal server error".to_string()
            }
            BracketError::InvalidRecord(_) => "Internal server error".to_string(),
            BracketError::Ledger(e) => e.client_message(),
            _ => self.to_string(),
        }
    }
}

/// Result type for bracket operations
pub type BracketResult<T> = Result<T, BracketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_errors_are_sanitized() {
        let err = BracketError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.client_message(), "Internal server error");
        assert_eq!(BracketError::Timeout.client_message(), "Internal server error");
    }

    #[test]
    fn test_domain_errors_pass_through() {
        let err = BracketError::InsufficientEntrants {
            needed: 2,
            current: 1,
        };
        assert_eq!(err.client_message(), "Insufficient entrants: need 2, have 1");
    }

    #[test]
    fn test_timeout_conversion() {
        let err: BracketError =
            TimeoutError::Timeout(std::time::Duration::from_secs(5)).into();
        assert!(matches!(err, BracketError::Timeout));
    }
}
