//! PostgreSQL store.
//!
//! A unit of work is a database transaction that starts by taking a row lock
//! on the tournament (`SELECT ... FOR UPDATE`). Concurrent writers of the
//! same tournament queue on that lock until the holder commits or rolls back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use std::sync::Arc;

use super::repository::{BracketStore, BracketTx};
use super::timeouts::{LOCK_TIMEOUT, with_default_timeout, with_timeout};
use crate::bracket::{
    BracketError, BracketResult, Entrant, EntrantId, Match, MatchId, MatchKey, NewMatch,
};
use crate::ledger::{Ledger, LedgerError, LedgerResult, TransactionType};
use crate::tournament::{Registration, TournamentId, TournamentInfo, TournamentStatus};

const TOURNAMENT_COLUMNS: &str =
    "id, name, format, seeding_type, status, max_players, start_date, prize_pool, winner_id";

const MATCH_COLUMNS: &str = "id, tournament_id, bracket, round, match_number, slot_a_user_id, \
     slot_b_user_id, score_a, score_b, winner_user_id, status, scheduled_at, completed_at";

/// Store backed by PostgreSQL
#[derive(Clone)]
pub struct PgBracketStore {
    pool: Arc<PgPool>,
}

impl PgBracketStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn column_u32(row: &PgRow, column: &str) -> BracketResult<u32> {
    let value: i32 = row.get(column);
    u32::try_from(value)
        .map_err(|_| BracketError::InvalidRecord(format!("negative {column}: {value}")))
}

fn db_int(value: u32) -> BracketResult<i32> {
    i32::try_from(value).map_err(|_| BracketError::InvalidRecord(format!("{value} out of range")))
}

fn tournament_from_row(row: &PgRow) -> BracketResult<TournamentInfo> {
    Ok(TournamentInfo {
        id: row.get("id"),
        name: row.get("name"),
        format: row.get::<String, _>("format").parse()?,
        seeding: row.get::<String, _>("seeding_type").parse()?,
        status: row.get::<String, _>("status").parse()?,
        max_players: column_u32(row, "max_players")?,
        start_date: row.get("start_date"),
        prize_pool: row.get("prize_pool"),
        winner: row.get("winner_id"),
    })
}

fn match_from_row(row: &PgRow) -> BracketResult<Match> {
    let bracket: Option<String> = row.get("bracket");
    Ok(Match {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        bracket: bracket.as_deref().map(str::parse).transpose()?,
        round: column_u32(row, "round")?,
        match_number: column_u32(row, "match_number")?,
        slot_a: row.get("slot_a_user_id"),
        slot_b: row.get("slot_b_user_id"),
        score_a: column_u32(row, "score_a")?,
        score_b: column_u32(row, "score_b")?,
        winner: row.get("winner_user_id"),
        status: row.get::<String, _>("status").parse()?,
        scheduled_at: row.get("scheduled_at"),
        completed_at: row.get("completed_at"),
    })
}

#[async_trait]
impl BracketStore for PgBracketStore {
    type Tx = PgTx;

    async fn begin(&self, tournament_id: TournamentId) -> BracketResult<PgTx> {
        let mut tx = self.pool.begin().await?;
        let query = format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1 FOR UPDATE");
        let row = with_timeout(
            LOCK_TIMEOUT,
            sqlx::query(&query).bind(tournament_id).fetch_optional(&mut *tx),
        )
        .await?
        .ok_or(BracketError::TournamentNotFound(tournament_id))?;
        let tournament = tournament_from_row(&row)?;
        Ok(PgTx { tx, tournament })
    }

    async fn tournament_of(&self, match_id: MatchId) -> BracketResult<TournamentId> {
        let row = with_default_timeout(
            sqlx::query("SELECT tournament_id FROM matches WHERE id = $1")
                .bind(match_id)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?
        .ok_or(BracketError::MatchNotFound(match_id))?;
        Ok(row.get("tournament_id"))
    }

    async fn scheduled_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BracketResult<Vec<Match>> {
        let query = format!(
            "SELECT {MATCH_COLUMNS} FROM matches \
             WHERE status = 'scheduled' AND scheduled_at >= $1 AND scheduled_at < $2 \
             ORDER BY scheduled_at, id"
        );
        let rows = with_default_timeout(
            sqlx::query(&query)
                .bind(from)
                .bind(to)
                .fetch_all(self.pool.as_ref()),
        )
        .await?;
        rows.iter().map(match_from_row).collect()
    }

    async fn tournament(&self, tournament_id: TournamentId) -> BracketResult<TournamentInfo> {
        let query = format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1");
        let row = with_default_timeout(
            sqlx::query(&query)
                .bind(tournament_id)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?
        .ok_or(BracketError::TournamentNotFound(tournament_id))?;
        tournament_from_row(&row)
    }
}

/// Unit of work over a [`PgBracketStore`]; rolls back when dropped uncommitted
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
    tournament: TournamentInfo,
}

#[async_trait]
impl BracketTx for PgTx {
    fn tournament(&self) -> &TournamentInfo {
        &self.tournament
    }

    async fn list_registrations(&mut self) -> BracketResult<Vec<Registration>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT user_id, registered_at, seed_rating
                FROM tournament_entries
                WHERE tournament_id = $1 AND status = 'active'
                ORDER BY registered_at, id
                "#,
            )
            .bind(self.tournament.id)
            .fetch_all(&mut *self.tx),
        )
        .await?;

        Ok(rows
            .iter()
            .map(|row| Registration {
                entrant_id: row.get("user_id"),
                registered_at: row.get("registered_at"),
                rating: row.get("seed_rating"),
            })
            .collect())
    }

    async fn assign_seeds(&mut self, entrants: &[Entrant]) -> BracketResult<()> {
        for entrant in entrants {
            with_default_timeout(
                sqlx::query(
                    "UPDATE tournament_entries SET seed = $1 WHERE tournament_id = $2 AND user_id = $3",
                )
                .bind(db_int(entrant.seed)?)
                .bind(self.tournament.id)
                .bind(entrant.id)
                .execute(&mut *self.tx),
            )
            .await?;
        }
        Ok(())
    }

    async fn list_entrants(&mut self) -> BracketResult<Vec<Entrant>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT user_id, seed
                FROM tournament_entries
                WHERE tournament_id = $1 AND seed IS NOT NULL
                ORDER BY seed
                "#,
            )
            .bind(self.tournament.id)
            .fetch_all(&mut *self.tx),
        )
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Entrant {
                    id: row.get("user_id"),
                    seed: column_u32(row, "seed")?,
                })
            })
            .collect()
    }

    async fn create_match(&mut self, new_match: NewMatch) -> BracketResult<Match> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO matches (
                    tournament_id, bracket, round, match_number,
                    slot_a_user_id, slot_b_user_id, status, scheduled_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id
                "#,
            )
            .bind(self.tournament.id)
            .bind(new_match.bracket.map(|b| b.as_str()))
            .bind(db_int(new_match.round)?)
            .bind(db_int(new_match.match_number)?)
            .bind(new_match.slot_a)
            .bind(new_match.slot_b)
            .bind(new_match.status.as_str())
            .bind(new_match.scheduled_at)
            .fetch_one(&mut *self.tx),
        )
        .await?;

        Ok(new_match.into_match(row.get("id"), self.tournament.id))
    }

    async fn update_match(&mut self, m: &Match) -> BracketResult<()> {
        let result = with_default_timeout(
            sqlx::query(
                r#"
                UPDATE matches
                SET slot_a_user_id = $1, slot_b_user_id = $2, score_a = $3, score_b = $4,
                    winner_user_id = $5, status = $6, scheduled_at = $7, completed_at = $8,
                    updated_at = NOW()
                WHERE id = $9 AND tournament_id = $10
                "#,
            )
            .bind(m.slot_a)
            .bind(m.slot_b)
            .bind(db_int(m.score_a)?)
            .bind(db_int(m.score_b)?)
            .bind(m.winner)
            .bind(m.status.as_str())
            .bind(m.scheduled_at)
            .bind(m.completed_at)
            .bind(m.id)
            .bind(self.tournament.id)
            .execute(&mut *self.tx),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(BracketError::MatchNotFound(m.id));
        }
        Ok(())
    }

    async fn find_match(&mut self, key: MatchKey) -> BracketResult<Option<Match>> {
        let query = format!(
            "SELECT {MATCH_COLUMNS} FROM matches \
             WHERE tournament_id = $1 AND bracket IS NOT DISTINCT FROM $2 \
             AND round = $3 AND match_number = $4"
        );
        let row = with_default_timeout(
            sqlx::query(&query)
                .bind(self.tournament.id)
                .bind(key.bracket.map(|b| b.as_str()))
                .bind(db_int(key.round)?)
                .bind(db_int(key.match_number)?)
                .fetch_optional(&mut *self.tx),
        )
        .await?;
        row.as_ref().map(match_from_row).transpose()
    }

    async fn get_match(&mut self, match_id: MatchId) -> BracketResult<Match> {
        let query =
            format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = $1 AND tournament_id = $2");
        let row = with_default_timeout(
            sqlx::query(&query)
                .bind(match_id)
                .bind(self.tournament.id)
                .fetch_optional(&mut *self.tx),
        )
        .await?
        .ok_or(BracketError::MatchNotFound(match_id))?;
        match_from_row(&row)
    }

    async fn list_matches(&mut self) -> BracketResult<Vec<Match>> {
        let query = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE tournament_id = $1");
        let rows = with_default_timeout(
            sqlx::query(&query)
                .bind(self.tournament.id)
                .fetch_all(&mut *self.tx),
        )
        .await?;
        let mut matches = rows
            .iter()
            .map(match_from_row)
            .collect::<BracketResult<Vec<_>>>()?;
        matches.sort_by_key(|m| m.key());
        Ok(matches)
    }

    async fn update_tournament_status(
        &mut self,
        status: TournamentStatus,
        winner: Option<EntrantId>,
    ) -> BracketResult<()> {
        with_default_timeout(
            sqlx::query(
                r#"
                UPDATE tournaments
                SET status = $1, winner_id = COALESCE($2, winner_id), updated_at = NOW()
                WHERE id = $3
                "#,
            )
            .bind(status.as_str())
            .bind(winner)
            .bind(self.tournament.id)
            .execute(&mut *self.tx),
        )
        .await?;

        self.tournament.status = status;
        if winner.is_some() {
            self.tournament.winner = winner;
        }
        Ok(())
    }

    async fn commit(self) -> BracketResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Ledger for PgTx {
    async fn credit_wallet(&mut self, user_id: i64, amount: Decimal) -> LedgerResult<()> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let result = sqlx::query(
            "UPDATE wallets SET balance = balance + $1, updated_at = NOW() WHERE user_id = $2",
        )
        .bind(amount)
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::WalletNotFound(user_id));
        }
        Ok(())
    }

    async fn record_transaction(
        &mut self,
        user_id: i64,
        transaction_type: TransactionType,
        amount: Decimal,
        description: &str,
    ) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (user_id, type, amount, description, status)
            VALUES ($1, $2, $3, $4, 'completed')
            "#,
        )
        .bind(user_id)
        .bind(transaction_type.as_str())
        .bind(amount)
        .bind(description)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}
