//! Bracket engine: the operations an operator or the web layer calls.
//!
//! Every mutating operation opens one unit of work on the owning tournament,
//! does all of its reads and writes inside it, and commits once. Notifications
//! are queued while the unit runs and delivered after commit.

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;

use crate::bracket::{
    BracketError, BracketProgressor, BracketResult, BracketView, Effect, Entrant, Match, MatchId,
    MatchStatus, ProgressStats, Progression, SeedingStrategy, Side, StandingRow, builder,
    progression, seeding, standings,
};
use crate::db::{BracketStore, BracketTx};
use crate::ledger::{Ledger, TransactionType, place_label};
use crate::notifications::{Notification, Notifier};
use crate::tournament::{
    Placements, PrizeAward, PrizeSplit, TournamentFormat, TournamentId, TournamentInfo,
    TournamentStatus,
};

/// Outcome of a reported result
#[derive(Debug, Clone, Serialize)]
pub struct ResultReport {
    /// The match as completed
    pub decided: Match,
    /// Downstream matches that became playable
    pub scheduled: Vec<Match>,
    /// Set when the result decided the tournament
    pub completion: Option<Completion>,
}

/// Final placings and what was paid out
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub placements: Placements,
    pub awards: Vec<PrizeAward>,
}

/// Consistent read of a tournament's bracket
#[derive(Debug, Clone, Serialize)]
pub struct BracketSnapshot {
    pub tournament: TournamentInfo,
    pub matches: Vec<Match>,
    pub entrants: Vec<Entrant>,
}

/// Drives bracket generation and progression over a store
pub struct BracketEngine<S, N> {
    store: S,
    notifier: N,
    prizes: PrizeSplit,
}

impl<S: BracketStore, N: Notifier> BracketEngine<S, N> {
    pub fn new(store: S, notifier: N) -> Self {
        Self {
            store,
            notifier,
            prizes: PrizeSplit::default(),
        }
    }

    pub fn with_prize_split(mut self, prizes: PrizeSplit) -> Self {
        self.prizes = prizes;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Generate the bracket using the tournament's own seeding type
    pub async fn generate_brackets(&self, tournament_id: TournamentId) -> BracketResult<Vec<Match>> {
        let tx = self.store.begin(tournament_id).await?;
        let mut seeder = seeding::for_type(tx.tournament().seeding);
        self.generate(tx, seeder.as_mut()).await
    }

    /// Generate the bracket with an explicit seeding strategy
    pub async fn generate_brackets_with(
        &self,
        tournament_id: TournamentId,
        seeder: &mut dyn SeedingStrategy,
    ) -> BracketResult<Vec<Match>> {
        let tx = self.store.begin(tournament_id).await?;
        self.generate(tx, seeder).await
    }

    async fn generate(
        &self,
        mut tx: S::Tx,
        seeder: &mut dyn SeedingStrategy,
    ) -> BracketResult<Vec<Match>> {
        let tournament = tx.tournament().clone();

        if !tx.list_matches().await?.is_empty() {
            return Err(BracketError::AlreadyGenerated(tournament.id));
        }
        if tournament.status != TournamentStatus::RegistrationClosed {
            return Err(BracketError::InvalidTournamentState {
                expected: TournamentStatus::RegistrationClosed,
                actual: tournament.status,
            });
        }

        let mut registrations = tx.list_registrations().await?;
        let capacity = tournament.max_players as usize;
        if capacity > 0 && registrations.len() > capacity {
            warn!(
                "Tournament {} has {} registrations for {} places, dropping the latest",
                tournament.id,
                registrations.len(),
                capacity
            );
            registrations.sort_by_key(|reg| reg.registered_at);
            registrations.truncate(capacity);
        }

        let entrants = seeder.seed(&registrations);
        let new_matches = builder::build(tournament.format, &entrants, tournament.start_date)?;

        tx.assign_seeds(&entrants).await?;
        let mut created = Vec::with_capacity(new_matches.len());
        for new_match in new_matches {
            created.push(tx.create_match(new_match).await?);
        }
        tx.update_tournament_status(TournamentStatus::InProgress, None)
            .await?;

        let mut outbox: Vec<Notification> = entrants
            .iter()
            .map(|e| Notification::tournament_started(e.id, &tournament))
            .collect();
        for m in created.iter().filter(|m| m.status == MatchStatus::Scheduled) {
            outbox.extend(Notification::match_scheduled(&tournament, m));
        }

        tx.commit().await?;
        info!(
            "Generated {} bracket for tournament {} ({} entrants, {} matches)",
            tournament.format,
            tournament.id,
            entrants.len(),
            created.len()
        );

        self.dispatch(outbox).await;
        Ok(created)
    }

    /// Record a result and progress the bracket
    pub async fn report_result(
        &self,
        match_id: MatchId,
        score_a: u32,
        score_b: u32,
    ) -> BracketResult<ResultReport> {
        let tournament_id = self.store.tournament_of(match_id).await?;
        let mut tx = self.store.begin(tournament_id).await?;
        let tournament = tx.tournament().clone();
        require_in_progress(&tournament)?;

        let mut matches = tx.list_matches().await?;
        let strategy = Progression::for_bracket(tournament.format, &matches)?;

        let mut decided = tx.get_match(match_id).await?;
        progression::record_result(
            &mut decided,
            score_a,
            score_b,
            strategy.allows_draws(),
            Utc::now(),
        )?;
        tx.update_match(&decided).await?;
        if let Some(stale) = matches.iter_mut().find(|m| m.id == decided.id) {
            *stale = decided.clone();
        }

        let entrants = tx.list_entrants().await?;
        let effects = strategy.advance(&decided, &matches, &entrants)?;

        let mut outbox = Notification::match_result(&tournament, &decided);
        let mut report = ResultReport {
            decided,
            scheduled: Vec::new(),
            completion: None,
        };
        for effect in effects {
            match effect {
                Effect::FillSlot { target, entrant } => {
                    let mut m = tx
                        .find_match(target.key)
                        .await?
                        .ok_or(BracketError::DownstreamMatchMissing(target.key))?;
                    let now_scheduled = m.fill_slot(target.side, entrant)?;
                    tx.update_match(&m).await?;
                    debug!("Entrant {entrant} advanced to {} ({:?})", target.key, target.side);
                    if now_scheduled {
                        outbox.extend(Notification::match_scheduled(&tournament, &m));
                        report.scheduled.push(m);
                    }
                }
                Effect::ResetFinals {
                    target,
                    slot_a,
                    slot_b,
                } => {
                    let mut m = tx
                        .find_match(target)
                        .await?
                        .ok_or(BracketError::DownstreamMatchMissing(target))?;
                    m.fill_slot(Side::A, slot_a)?;
                    m.fill_slot(Side::B, slot_b)?;
                    tx.update_match(&m).await?;
                    info!("Grand finals reset in tournament {}", tournament.id);
                    outbox.extend(Notification::match_scheduled(&tournament, &m));
                    report.scheduled.push(m);
                }
                Effect::Complete(placements) => {
                    let completion = self
                        .complete(&mut tx, &tournament, placements, &entrants, &mut outbox)
                        .await?;
                    report.completion = Some(completion);
                }
            }
        }

        tx.commit().await?;
        info!(
            "Match {} in tournament {} reported {score_a}-{score_b}",
            match_id, tournament.id
        );

        self.dispatch(outbox).await;
        Ok(report)
    }

    async fn complete(
        &self,
        tx: &mut S::Tx,
        tournament: &TournamentInfo,
        placements: Placements,
        entrants: &[Entrant],
        outbox: &mut Vec<Notification>,
    ) -> BracketResult<Completion> {
        tx.update_tournament_status(TournamentStatus::Completed, Some(placements.winner))
            .await?;

        let awards = self.prizes.distribute(tournament.prize_pool, &placements);
        for award in &awards {
            let description = format!(
                "Prize for {} place in tournament: {}",
                place_label(award.place),
                tournament.name
            );
            tx.credit_wallet(award.entrant_id, award.amount).await?;
            tx.record_transaction(
                award.entrant_id,
                TransactionType::TournamentPrize,
                award.amount,
                &description,
            )
            .await?;
            outbox.push(Notification::prize_awarded(
                award.entrant_id,
                tournament,
                award.amount,
                award.place,
            ));
        }

        outbox.extend(
            entrants
                .iter()
                .map(|e| Notification::tournament_completed(e.id, tournament, placements.winner)),
        );

        info!(
            "Tournament {} completed, winner {}, {} prizes paid",
            tournament.id,
            placements.winner,
            awards.len()
        );
        Ok(Completion { placements, awards })
    }

    /// Mark a scheduled match as being played
    pub async fn start_match(&self, match_id: MatchId) -> BracketResult<Match> {
        let tournament_id = self.store.tournament_of(match_id).await?;
        let mut tx = self.store.begin(tournament_id).await?;
        require_in_progress(tx.tournament())?;

        let mut m = tx.get_match(match_id).await?;
        m.transition(MatchStatus::InProgress)?;
        tx.update_match(&m).await?;
        tx.commit().await?;

        info!("Match {match_id} started");
        Ok(m)
    }

    /// Cancel a scheduled or running round-robin match.
    ///
    /// Elimination brackets have no way to route around a cancelled match,
    /// so cancelling one is rejected. Cancelling the last open round-robin
    /// match completes the tournament, or cancels it when no match was
    /// played at all.
    pub async fn cancel_match(&self, match_id: MatchId) -> BracketResult<Option<Completion>> {
        let tournament_id = self.store.tournament_of(match_id).await?;
        let mut tx = self.store.begin(tournament_id).await?;
        let tournament = tx.tournament().clone();
        require_in_progress(&tournament)?;
        if tournament.format != TournamentFormat::RoundRobin {
            return Err(BracketError::CancelNotSupported {
                match_id,
                format: tournament.format,
            });
        }

        let mut m = tx.get_match(match_id).await?;
        m.transition(MatchStatus::Cancelled)?;
        tx.update_match(&m).await?;

        let matches = tx.list_matches().await?;
        let mut outbox = Vec::new();
        let mut completion = None;
        if matches.iter().all(|m| m.status == MatchStatus::Cancelled) {
            tx.update_tournament_status(TournamentStatus::Cancelled, None)
                .await?;
            warn!(
                "Tournament {} cancelled: every match was cancelled unplayed",
                tournament.id
            );
        } else {
            let entrants = tx.list_entrants().await?;
            let strategy = Progression::for_bracket(tournament.format, &matches)?;
            for effect in strategy.advance(&m, &matches, &entrants)? {
                if let Effect::Complete(placements) = effect {
                    completion = Some(
                        self.complete(&mut tx, &tournament, placements, &entrants, &mut outbox)
                            .await?,
                    );
                }
            }
        }

        tx.commit().await?;
        info!("Match {match_id} cancelled");

        self.dispatch(outbox).await;
        Ok(completion)
    }

    /// Move a match that has not started yet
    pub async fn reschedule_match(
        &self,
        match_id: MatchId,
        scheduled_at: DateTime<Utc>,
    ) -> BracketResult<Match> {
        let tournament_id = self.store.tournament_of(match_id).await?;
        let mut tx = self.store.begin(tournament_id).await?;
        let tournament = tx.tournament().clone();
        require_in_progress(&tournament)?;

        let mut m = tx.get_match(match_id).await?;
        if !matches!(m.status, MatchStatus::Pending | MatchStatus::Scheduled) {
            return Err(BracketError::MatchNotReady {
                match_id,
                status: m.status,
            });
        }
        m.scheduled_at = scheduled_at;
        tx.update_match(&m).await?;
        tx.commit().await?;

        info!("Match {match_id} rescheduled to {scheduled_at}");
        self.dispatch(Notification::match_rescheduled(&tournament, &m))
            .await;
        Ok(m)
    }

    /// Read the tournament, its matches and seeded entrants under the lock
    pub async fn snapshot(&self, tournament_id: TournamentId) -> BracketResult<BracketSnapshot> {
        let mut tx = self.store.begin(tournament_id).await?;
        let matches = tx.list_matches().await?;
        let entrants = tx.list_entrants().await?;
        Ok(BracketSnapshot {
            tournament: tx.tournament().clone(),
            matches,
            entrants,
        })
    }

    pub async fn standings(&self, tournament_id: TournamentId) -> BracketResult<Vec<StandingRow>> {
        let snapshot = self.snapshot(tournament_id).await?;
        Ok(standings::compute(&snapshot.matches, &snapshot.entrants))
    }

    pub async fn progress(&self, tournament_id: TournamentId) -> BracketResult<ProgressStats> {
        let snapshot = self.snapshot(tournament_id).await?;
        Ok(ProgressStats::compute(
            snapshot.tournament.format,
            &snapshot.matches,
        ))
    }

    pub async fn bracket_view(&self, tournament_id: TournamentId) -> BracketResult<BracketView> {
        let snapshot = self.snapshot(tournament_id).await?;
        Ok(BracketView::build(
            snapshot.tournament.format,
            &snapshot.matches,
            &snapshot.entrants,
        ))
    }

    /// Remind both players of every match scheduled for the calendar day
    /// after `now` (UTC). Returns the number of matches reminded.
    pub async fn send_due_reminders(&self, now: DateTime<Utc>) -> BracketResult<usize> {
        let from = now.date_naive().and_time(NaiveTime::MIN).and_utc() + TimeDelta::days(1);
        let to = from + TimeDelta::days(1);
        let due = self.store.scheduled_between(from, to).await?;

        let mut tournaments: HashMap<TournamentId, TournamentInfo> = HashMap::new();
        let mut outbox = Vec::new();
        for m in &due {
            if !tournaments.contains_key(&m.tournament_id) {
                let tournament = self.store.tournament(m.tournament_id).await?;
                tournaments.insert(m.tournament_id, tournament);
            }
            if let Some(tournament) = tournaments.get(&m.tournament_id) {
                outbox.extend(Notification::match_reminder(tournament, m));
            }
        }

        info!(
            "Sending reminders for {} matches scheduled on {}",
            due.len(),
            from.date_naive()
        );
        self.dispatch(outbox).await;
        Ok(due.len())
    }

    async fn dispatch(&self, outbox: Vec<Notification>) {
        for notification in &outbox {
            if let Err(e) = self.notifier.notify(notification).await {
                warn!(
                    "Failed to deliver {} notification to user {}: {e}",
                    notification.kind.action(),
                    notification.user_id
                );
            }
        }
    }
}

fn require_in_progress(tournament: &TournamentInfo) -> BracketResult<()> {
    if tournament.status != TournamentStatus::InProgress {
        return Err(BracketError::InvalidTournamentState {
            expected: TournamentStatus::InProgress,
            actual: tournament.status,
        });
    }
    Ok(())
}
