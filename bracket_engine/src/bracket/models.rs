//! Bracket data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::errors::{BracketError, BracketResult};
use crate::tournament::TournamentId;

/// Entrant ID type (user or team)
pub type EntrantId = i64;

/// Match ID type
pub type MatchId = i64;

/// One of the parallel match trees of a double-elimination bracket.
///
/// Single elimination and round robin use the implicit single bracket,
/// represented as `None` wherever a `Option<BracketKind>` appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketKind {
    Winners,
    Losers,
    Finals,
}

impl BracketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BracketKind::Winners => "winners",
            BracketKind::Losers => "losers",
            BracketKind::Finals => "finals",
        }
    }
}

impl fmt::Display for BracketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BracketKind {
    type Err = BracketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "winners" => Ok(BracketKind::Winners),
            "losers" => Ok(BracketKind::Losers),
            "finals" => Ok(BracketKind::Finals),
            other => Err(BracketError::InvalidRecord(format!(
                "unknown bracket '{other}'"
            ))),
        }
    }
}

/// Match lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// At least one slot is still waiting on an earlier match
    Pending,
    /// Both slots known, ready to play
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::InProgress => "in_progress",
            MatchStatus::Completed => "completed",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled matches never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }

    /// Whether a result may be reported in this state
    pub fn accepts_result(&self) -> bool {
        matches!(self, MatchStatus::Scheduled | MatchStatus::InProgress)
    }

    pub fn can_transition_to(&self, next: MatchStatus) -> bool {
        use MatchStatus::*;
        matches!(
            (self, next),
            (Pending, Scheduled)
                | (Scheduled, InProgress)
                | (Scheduled, Completed)
                | (InProgress, Completed)
                | (Scheduled, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = BracketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MatchStatus::Pending),
            "scheduled" => Ok(MatchStatus::Scheduled),
            "in_progress" => Ok(MatchStatus::InProgress),
            "completed" => Ok(MatchStatus::Completed),
            "cancelled" => Ok(MatchStatus::Cancelled),
            other => Err(BracketError::InvalidRecord(format!(
                "unknown match status '{other}'"
            ))),
        }
    }
}

/// Slot of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

/// Address of a match inside one tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchKey {
    pub bracket: Option<BracketKind>,
    pub round: u32,
    pub match_number: u32,
}

impl MatchKey {
    pub fn new(bracket: Option<BracketKind>, round: u32, match_number: u32) -> Self {
        Self {
            bracket,
            round,
            match_number,
        }
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bracket {
            Some(bracket) => write!(f, "{bracket} R{} M{}", self.round, self.match_number),
            None => write!(f, "R{} M{}", self.round, self.match_number),
        }
    }
}

/// A seeded entrant; seed 1 is the top seed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrant {
    pub id: EntrantId,
    pub seed: u32,
}

/// A persisted match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub bracket: Option<BracketKind>,
    pub round: u32,
    pub match_number: u32,
    pub slot_a: Option<EntrantId>,
    pub slot_b: Option<EntrantId>,
    pub score_a: u32,
    pub score_b: u32,
    pub winner: Option<EntrantId>,
    pub status: MatchStatus,
    pub scheduled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn key(&self) -> MatchKey {
        MatchKey::new(self.bracket, self.round, self.match_number)
    }

    /// Both slots are populated
    pub fn is_ready(&self) -> bool {
        self.slot_a.is_some() && self.slot_b.is_some()
    }

    /// Participants that are already known
    pub fn occupants(&self) -> impl Iterator<Item = EntrantId> + '_ {
        self.slot_a.into_iter().chain(self.slot_b)
    }

    /// Loser of a decided match
    pub fn loser(&self) -> Option<EntrantId> {
        let winner = self.winner?;
        if self.slot_a == Some(winner) {
            self.slot_b
        } else {
            self.slot_a
        }
    }

    /// Write an entrant into a slot.
    ///
    /// A pending match whose second slot gets filled becomes scheduled. Returns
    /// `true` when that happened.
    pub fn fill_slot(&mut self, side: Side, entrant: EntrantId) -> BracketResult<bool> {
        if self.status != MatchStatus::Pending {
            return Err(BracketError::MatchNotReady {
                match_id: self.id,
                status: self.status,
            });
        }
        match side {
            Side::A => self.slot_a = Some(entrant),
            Side::B => self.slot_b = Some(entrant),
        }
        if self.is_ready() {
            self.transition(MatchStatus::Scheduled)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Move to `next`, enforcing the status machine
    pub fn transition(&mut self, next: MatchStatus) -> BracketResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(BracketError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// A match about to be created by the builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMatch {
    pub bracket: Option<BracketKind>,
    pub round: u32,
    pub match_number: u32,
    pub slot_a: Option<EntrantId>,
    pub slot_b: Option<EntrantId>,
    pub status: MatchStatus,
    pub scheduled_at: DateTime<Utc>,
}

impl NewMatch {
    /// Status follows the slots: scheduled only when both are known
    pub fn new(
        key: MatchKey,
        slot_a: Option<EntrantId>,
        slot_b: Option<EntrantId>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        let status = if slot_a.is_some() && slot_b.is_some() {
            MatchStatus::Scheduled
        } else {
            MatchStatus::Pending
        };
        Self {
            bracket: key.bracket,
            round: key.round,
            match_number: key.match_number,
            slot_a,
            slot_b,
            status,
            scheduled_at,
        }
    }

    pub fn key(&self) -> MatchKey {
        MatchKey::new(self.bracket, self.round, self.match_number)
    }

    /// Attach a store-assigned ID
    pub fn into_match(self, id: MatchId, tournament_id: TournamentId) -> Match {
        Match {
            id,
            tournament_id,
            bracket: self.bracket,
            round: self.round,
            match_number: self.match_number,
            slot_a: self.slot_a,
            slot_b: self.slot_b,
            score_a: 0,
            score_b: 0,
            winner: None,
            status: self.status,
            scheduled_at: self.scheduled_at,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(slot_a: Option<EntrantId>) -> Match {
        NewMatch::new(MatchKey::new(None, 2, 1), slot_a, None, Utc::now()).into_match(1, 1)
    }

    #[test]
    fn test_new_match_status_follows_slots() {
        let now = Utc::now();
        let key = MatchKey::new(None, 1, 1);
        assert_eq!(NewMatch::new(key, Some(1), Some(2), now).status, MatchStatus::Scheduled);
        assert_eq!(NewMatch::new(key, Some(1), None, now).status, MatchStatus::Pending);
        assert_eq!(NewMatch::new(key, None, None, now).status, MatchStatus::Pending);
    }

    #[test]
    fn test_fill_second_slot_schedules() {
        let mut m = pending(Some(10));
        assert!(m.fill_slot(Side::B, 20).unwrap());
        assert_eq!(m.status, MatchStatus::Scheduled);
        assert_eq!(m.slot_b, Some(20));
    }

    #[test]
    fn test_fill_first_slot_stays_pending() {
        let mut m = pending(None);
        assert!(!m.fill_slot(Side::A, 10).unwrap());
        assert_eq!(m.status, MatchStatus::Pending);
    }

    #[test]
    fn test_fill_scheduled_match_rejected() {
        let mut m = pending(Some(10));
        m.fill_slot(Side::B, 20).unwrap();
        assert!(matches!(
            m.fill_slot(Side::B, 30),
            Err(BracketError::MatchNotReady { .. })
        ));
    }

    #[test]
    fn test_status_machine() {
        use MatchStatus::*;
        assert!(Pending.can_transition_to(Scheduled));
        assert!(Scheduled.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Scheduled));
        assert!(!Cancelled.can_transition_to(InProgress));
        assert!(Completed.is_terminal());
    }

    #[test]
    fn test_loser() {
        let mut m = pending(Some(10));
        m.fill_slot(Side::B, 20).unwrap();
        assert_eq!(m.loser(), None);
        m.winner = Some(20);
        assert_eq!(m.loser(), Some(10));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(MatchKey::new(None, 2, 1).to_string(), "R2 M1");
        assert_eq!(
            MatchKey::new(Some(BracketKind::Losers), 3, 2).to_string(),
            "losers R3 M2"
        );
    }
}
