//! In-memory store.
//!
//! An arena of matches keyed by ID with a `(tournament, bracket, round,
//! match_number)` index. A unit of work holds the store mutex for its whole
//! lifetime and edits a working copy, written back on commit. Used by tests
//! and the worker's simulation mode.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::repository::{BracketStore, BracketTx};
use crate::bracket::{
    BracketError, BracketResult, Entrant, EntrantId, Match, MatchId, MatchKey, MatchStatus,
    NewMatch,
};
use crate::ledger::{Ledger, LedgerError, LedgerResult, Transaction, TransactionType};
use crate::tournament::{Registration, TournamentId, TournamentInfo, TournamentStatus};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    next_match_id: MatchId,
    tournaments: HashMap<TournamentId, TournamentInfo>,
    registrations: HashMap<TournamentId, Vec<Registration>>,
    seeds: HashMap<TournamentId, Vec<Entrant>>,
    matches: BTreeMap<MatchId, Match>,
    index: HashMap<(TournamentId, MatchKey), MatchId>,
    wallets: HashMap<i64, Decimal>,
    transactions: Vec<Transaction>,
}

impl MemoryState {
    fn tournament(&self, tournament_id: TournamentId) -> BracketResult<&TournamentInfo> {
        self.tournaments
            .get(&tournament_id)
            .ok_or(BracketError::TournamentNotFound(tournament_id))
    }
}

/// Store backed by process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a tournament
    pub async fn insert_tournament(&self, tournament: TournamentInfo) {
        let mut state = self.state.lock().await;
        state.tournaments.insert(tournament.id, tournament);
    }

    /// Add an active registration
    pub async fn register(&self, tournament_id: TournamentId, registration: Registration) {
        let mut state = self.state.lock().await;
        state
            .registrations
            .entry(tournament_id)
            .or_default()
            .push(registration);
    }

    /// Create a wallet, or reset its balance
    pub async fn open_wallet(&self, user_id: i64, balance: Decimal) {
        self.state.lock().await.wallets.insert(user_id, balance);
    }

    pub async fn wallet_balance(&self, user_id: i64) -> Option<Decimal> {
        self.state.lock().await.wallets.get(&user_id).copied()
    }

    /// Recorded transactions, oldest first
    pub async fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().await.transactions.clone()
    }

    /// Matches of a tournament ordered by key
    pub async fn matches(&self, tournament_id: TournamentId) -> Vec<Match> {
        let state = self.state.lock().await;
        sorted_matches(&state, tournament_id)
    }

    /// Move a stored match to another key, leaving its old key unoccupied
    #[cfg(test)]
    pub(crate) async fn renumber_match(
        &self,
        tournament_id: TournamentId,
        from: MatchKey,
        match_number: u32,
    ) {
        let mut state = self.state.lock().await;
        let id = state.index.remove(&(tournament_id, from)).unwrap();
        let m = state.matches.get_mut(&id).unwrap();
        m.match_number = match_number;
        let to = m.key();
        state.index.insert((tournament_id, to), id);
    }
}

fn sorted_matches(state: &MemoryState, tournament_id: TournamentId) -> Vec<Match> {
    let mut matches: Vec<Match> = state
        .matches
        .values()
        .filter(|m| m.tournament_id == tournament_id)
        .cloned()
        .collect();
    matches.sort_by_key(|m| m.key());
    matches
}

#[async_trait]
impl BracketStore for InMemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self, tournament_id: TournamentId) -> BracketResult<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let tournament = guard.tournament(tournament_id)?.clone();
        let work = (*guard).clone();
        Ok(MemoryTx {
            guard,
            work,
            tournament,
        })
    }

    async fn tournament_of(&self, match_id: MatchId) -> BracketResult<TournamentId> {
        let state = self.state.lock().await;
        state
            .matches
            .get(&match_id)
            .map(|m| m.tournament_id)
            .ok_or(BracketError::MatchNotFound(match_id))
    }

    async fn scheduled_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BracketResult<Vec<Match>> {
        let state = self.state.lock().await;
        Ok(state
            .matches
            .values()
            .filter(|m| {
                m.status == MatchStatus::Scheduled && m.scheduled_at >= from && m.scheduled_at < to
            })
            .cloned()
            .collect())
    }

    async fn tournament(&self, tournament_id: TournamentId) -> BracketResult<TournamentInfo> {
        let state = self.state.lock().await;
        state.tournament(tournament_id).cloned()
    }
}

/// Unit of work over an [`InMemoryStore`]
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
    tournament: TournamentInfo,
}

impl MemoryTx {
    fn owned(&self, match_id: MatchId) -> BracketResult<&Match> {
        self.work
            .matches
            .get(&match_id)
            .filter(|m| m.tournament_id == self.tournament.id)
            .ok_or(BracketError::MatchNotFound(match_id))
    }
}

#[async_trait]
impl BracketTx for MemoryTx {
    fn tournament(&self) -> &TournamentInfo {
        &self.tournament
    }

    async fn list_registrations(&mut self) -> BracketResult<Vec<Registration>> {
        Ok(self
            .work
            .registrations
            .get(&self.tournament.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn assign_seeds(&mut self, entrants: &[Entrant]) -> BracketResult<()> {
        let mut seeded = entrants.to_vec();
        seeded.sort_by_key(|e| e.seed);
        self.work.seeds.insert(self.tournament.id, seeded);
        Ok(())
    }

    async fn list_entrants(&mut self) -> BracketResult<Vec<Entrant>> {
        Ok(self
            .work
            .seeds
            .get(&self.tournament.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_match(&mut self, new_match: NewMatch) -> BracketResult<Match> {
        let index_key = (self.tournament.id, new_match.key());
        if self.work.index.contains_key(&index_key) {
            return Err(BracketError::InvalidRecord(format!(
                "duplicate match {}",
                new_match.key()
            )));
        }
        self.work.next_match_id += 1;
        let m = new_match.into_match(self.work.next_match_id, self.tournament.id);
        self.work.index.insert(index_key, m.id);
        self.work.matches.insert(m.id, m.clone());
        Ok(m)
    }

    async fn update_match(&mut self, m: &Match) -> BracketResult<()> {
        let current = self.owned(m.id)?;
        if current.key() != m.key() {
            return Err(BracketError::InvalidRecord(format!(
                "match {} cannot move from {} to {}",
                m.id,
                current.key(),
                m.key()
            )));
        }
        self.work.matches.insert(m.id, m.clone());
        Ok(())
    }

    async fn find_match(&mut self, key: MatchKey) -> BracketResult<Option<Match>> {
        Ok(self
            .work
            .index
            .get(&(self.tournament.id, key))
            .and_then(|id| self.work.matches.get(id))
            .cloned())
    }

    async fn get_match(&mut self, match_id: MatchId) -> BracketResult<Match> {
        self.owned(match_id).cloned()
    }

    async fn list_matches(&mut self) -> BracketResult<Vec<Match>> {
        Ok(sorted_matches(&self.work, self.tournament.id))
    }

    async fn update_tournament_status(
        &mut self,
        status: TournamentStatus,
        winner: Option<EntrantId>,
    ) -> BracketResult<()> {
        self.tournament.status = status;
        if winner.is_some() {
            self.tournament.winner = winner;
        }
        self.work
            .tournaments
            .insert(self.tournament.id, self.tournament.clone());
        Ok(())
    }

    async fn commit(self) -> BracketResult<()> {
        let MemoryTx {
            mut guard, work, ..
        } = self;
        *guard = work;
        Ok(())
    }
}

#[async_trait]
impl Ledger for MemoryTx {
    async fn credit_wallet(&mut self, user_id: i64, amount: Decimal) -> LedgerResult<()> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let balance = self
            .work
            .wallets
            .get_mut(&user_id)
            .ok_or(LedgerError::WalletNotFound(user_id))?;
        *balance += amount;
        Ok(())
    }

    async fn record_transaction(
        &mut self,
        user_id: i64,
        transaction_type: TransactionType,
        amount: Decimal,
        description: &str,
    ) -> LedgerResult<()> {
        self.work.transactions.push(Transaction {
            user_id,
            transaction_type,
            amount,
            description: description.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::{SeedingType, TournamentFormat};
    use rust_decimal_macros::dec;

    fn tournament(id: TournamentId) -> TournamentInfo {
        TournamentInfo {
            id,
            name: format!("Cup {id}"),
            format: TournamentFormat::SingleElimination,
            seeding: SeedingType::RegistrationOrder,
            status: TournamentStatus::RegistrationClosed,
            max_players: 16,
            start_date: Utc::now(),
            prize_pool: dec!(100),
            winner: None,
        }
    }

    fn new_match(round: u32) -> NewMatch {
        NewMatch::new(MatchKey::new(None, round, 1), Some(1), Some(2), Utc::now())
    }

    #[tokio::test]
    async fn test_begin_unknown_tournament() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.begin(7).await,
            Err(BracketError::TournamentNotFound(7))
        ));
    }

    #[tokio::test]
    async fn test_commit_persists_and_drop_discards() {
        let store = InMemoryStore::new();
        store.insert_tournament(tournament(1)).await;

        let mut tx = store.begin(1).await.unwrap();
        tx.create_match(new_match(1)).await.unwrap();
        drop(tx);
        assert!(store.matches(1).await.is_empty());

        let mut tx = store.begin(1).await.unwrap();
        let created = tx.create_match(new_match(1)).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.matches(1).await, vec![created.clone()]);
        assert_eq!(store.tournament_of(created.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let store = InMemoryStore::new();
        store.insert_tournament(tournament(1)).await;
        let mut tx = store.begin(1).await.unwrap();
        tx.create_match(new_match(1)).await.unwrap();
        assert!(matches!(
            tx.create_match(new_match(1)).await,
            Err(BracketError::InvalidRecord(_))
        ));
    }

    #[tokio::test]
    async fn test_matches_are_scoped_to_tournament() {
        let store = InMemoryStore::new();
        store.insert_tournament(tournament(1)).await;
        store.insert_tournament(tournament(2)).await;

        let mut tx = store.begin(1).await.unwrap();
        let other = tx.create_match(new_match(1)).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin(2).await.unwrap();
        assert!(matches!(
            tx.get_match(other.id).await,
            Err(BracketError::MatchNotFound(_))
        ));
        assert!(tx.find_match(other.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_credit_wallet() {
        let store = InMemoryStore::new();
        store.insert_tournament(tournament(1)).await;
        store.open_wallet(5, dec!(10)).await;

        let mut tx = store.begin(1).await.unwrap();
        tx.credit_wallet(5, dec!(2.50)).await.unwrap();
        assert!(matches!(
            tx.credit_wallet(6, dec!(1)).await,
            Err(LedgerError::WalletNotFound(6))
        ));
        assert!(matches!(
            tx.credit_wallet(5, dec!(0)).await,
            Err(LedgerError::InvalidAmount(_))
        ));
        tx.commit().await.unwrap();
        assert_eq!(store.wallet_balance(5).await, Some(dec!(12.50)));
    }

    #[tokio::test]
    async fn test_scheduled_between() {
        let store = InMemoryStore::new();
        store.insert_tournament(tournament(1)).await;
        let mut tx = store.begin(1).await.unwrap();
        let now = Utc::now();
        let mut early = new_match(1);
        early.scheduled_at = now;
        let mut late = new_match(2);
        late.scheduled_at = now + chrono::Duration::days(2);
        tx.create_match(early).await.unwrap();
        tx.create_match(late).await.unwrap();
        tx.commit().await.unwrap();

        let due = store
            .scheduled_between(now, now + chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].round, 1);
    }
}
