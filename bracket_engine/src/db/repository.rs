//! Persistence seams of the bracket engine.
//!
//! A [`BracketStore`] hands out units of work. Each unit locks one tournament
//! for its whole lifetime, so every read-modify-write inside it (slot fills in
//! particular) is serialised against other writers of the same tournament.
//! Dropping a unit without calling [`BracketTx::commit`] discards its writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::bracket::{BracketResult, Entrant, EntrantId, Match, MatchId, MatchKey, NewMatch};
use crate::ledger::Ledger;
use crate::tournament::{Registration, TournamentId, TournamentInfo, TournamentStatus};

/// Source of units of work, plus a few lock-free reads
#[async_trait]
pub trait BracketStore: Send + Sync {
    type Tx: BracketTx;

    /// Lock `tournament_id` and open a unit of work over it
    async fn begin(&self, tournament_id: TournamentId) -> BracketResult<Self::Tx>;

    /// Tournament owning a match
    async fn tournament_of(&self, match_id: MatchId) -> BracketResult<TournamentId>;

    /// Scheduled matches with `from <= scheduled_at < to`, across tournaments
    async fn scheduled_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BracketResult<Vec<Match>>;

    /// Tournament snapshot without taking the lock
    async fn tournament(&self, tournament_id: TournamentId) -> BracketResult<TournamentInfo>;
}

/// One locked, all-or-nothing unit of work over a tournament
#[async_trait]
pub trait BracketTx: Ledger + Send {
    /// The locked tournament as read when the unit began
    fn tournament(&self) -> &TournamentInfo;

    /// Active registrations, in store order
    async fn list_registrations(&mut self) -> BracketResult<Vec<Registration>>;

    /// Persist the seeds chosen at generation
    async fn assign_seeds(&mut self, entrants: &[Entrant]) -> BracketResult<()>;

    /// Seeded entrants ordered by seed; empty before generation
    async fn list_entrants(&mut self) -> BracketResult<Vec<Entrant>>;

    async fn create_match(&mut self, new_match: NewMatch) -> BracketResult<Match>;

    /// Overwrite the mutable fields of a match
    async fn update_match(&mut self, m: &Match) -> BracketResult<()>;

    async fn find_match(&mut self, key: MatchKey) -> BracketResult<Option<Match>>;

    /// Match of this tournament by ID
    async fn get_match(&mut self, match_id: MatchId) -> BracketResult<Match>;

    /// Every match of the tournament, ordered by key
    async fn list_matches(&mut self) -> BracketResult<Vec<Match>>;

    async fn update_tournament_status(
        &mut self,
        status: TournamentStatus,
        winner: Option<EntrantId>,
    ) -> BracketResult<()>;

    async fn commit(self) -> BracketResult<()>;
}
