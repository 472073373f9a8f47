//! Worker subcommands.
//!
//! Every command except `migrate` and `simulate` drives a [`BracketEngine`]
//! over Postgres and prints its outcome as JSON on stdout.

use anyhow::{Error, bail};
use bracket_engine::{
    BracketEngine, TournamentFormat, TournamentInfo, TournamentStatus,
    bracket::{MatchId, MatchStatus, StandingRow, seeding::RandomSeeding},
    db::{BracketStore, InMemoryStore},
    notifications::{LogNotifier, Notifier},
    tournament::{Placements, PrizeAward, Registration, SeedingType, TournamentId},
};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use pico_args::Arguments;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info};

use crate::metrics;

/// Tournament ID used by in-memory simulations
const SIMULATION_ID: TournamentId = 1;

/// A parsed subcommand
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Migrate,
    Generate { tournament_id: TournamentId },
    Report { match_id: MatchId, score_a: u32, score_b: u32 },
    Start { match_id: MatchId },
    Cancel { match_id: MatchId },
    Reschedule { match_id: MatchId, at: DateTime<Utc> },
    Standings { tournament_id: TournamentId },
    Progress { tournament_id: TournamentId },
    Bracket { tournament_id: TournamentId },
    Remind { at: Option<DateTime<Utc>> },
    Watch,
    Simulate(SimulationOptions),
}

/// Parameters of an in-memory dry run
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOptions {
    pub format: TournamentFormat,
    pub entrants: u32,
    pub seeding: SeedingType,
    pub rng_seed: Option<u64>,
    pub prize_pool: Decimal,
}

impl Command {
    /// Parse the subcommand and its arguments. Global options must already
    /// have been taken out of `pargs`.
    pub fn parse(pargs: &mut Arguments) -> Result<Self, Error> {
        let Some(name) = pargs.subcommand()? else {
            bail!("Missing subcommand, see --help");
        };

        let command = match name.as_str() {
            "migrate" => Command::Migrate,
            "generate" => Command::Generate {
                tournament_id: pargs.free_from_str()?,
            },
            "report" => Command::Report {
                match_id: pargs.free_from_str()?,
                score_a: pargs.free_from_str()?,
                score_b: pargs.free_from_str()?,
            },
            "start" => Command::Start {
                match_id: pargs.free_from_str()?,
            },
            "cancel" => Command::Cancel {
                match_id: pargs.free_from_str()?,
            },
            "reschedule" => Command::Reschedule {
                match_id: pargs.free_from_str()?,
                at: pargs.free_from_str()?,
            },
            "standings" => Command::Standings {
                tournament_id: pargs.free_from_str()?,
            },
            "progress" => Command::Progress {
                tournament_id: pargs.free_from_str()?,
            },
            "bracket" => Command::Bracket {
                tournament_id: pargs.free_from_str()?,
            },
            "remind" => Command::Remind {
                at: pargs.opt_value_from_str("--at")?,
            },
            "watch" => Command::Watch,
            "simulate" => {
                let entrants: u32 = pargs.value_from_str("--entrants")?;
                if entrants < 2 {
                    bail!("A simulation needs at least 2 entrants");
                }
                Command::Simulate(SimulationOptions {
                    format: pargs.value_from_str("--format")?,
                    entrants,
                    seeding: pargs.opt_value_from_str("--seeding")?.unwrap_or_default(),
                    rng_seed: pargs.opt_value_from_str("--rng-seed")?,
                    prize_pool: pargs.opt_value_from_str("--pool")?.unwrap_or(Decimal::ZERO),
                })
            }
            other => bail!("Unknown subcommand '{other}', see --help"),
        };
        Ok(command)
    }

    /// Name used in logs and metric labels
    pub fn name(&self) -> &'static str {
        match self {
            Command::Migrate => "migrate",
            Command::Generate { .. } => "generate",
            Command::Report { .. } => "report",
            Command::Start { .. } => "start",
            Command::Cancel { .. } => "cancel",
            Command::Reschedule { .. } => "reschedule",
            Command::Standings { .. } => "standings",
            Command::Progress { .. } => "progress",
            Command::Bracket { .. } => "bracket",
            Command::Remind { .. } => "remind",
            Command::Watch => "watch",
            Command::Simulate(_) => "simulate",
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run a database-backed command
pub async fn execute<S, N>(
    engine: &BracketEngine<S, N>,
    command: &Command,
    reminder_interval: Duration,
) -> Result<(), Error>
where
    S: BracketStore,
    N: Notifier,
{
    match command {
        Command::Migrate => bail!("migrate runs against the database directly"),
        Command::Generate { tournament_id } => {
            let matches = engine.generate_brackets(*tournament_id).await?;
            let tournament = engine.store().tournament(*tournament_id).await?;
            metrics::brackets_generated_total(tournament.format.as_str());
            print_json(&matches)
        }
        Command::Report {
            match_id,
            score_a,
            score_b,
        } => {
            let report = engine.report_result(*match_id, *score_a, *score_b).await?;
            metrics::results_reported_total();
            if report.completion.is_some() {
                metrics::tournaments_completed_total();
            }
            print_json(&report)
        }
        Command::Start { match_id } => print_json(&engine.start_match(*match_id).await?),
        Command::Cancel { match_id } => {
            let completion = engine.cancel_match(*match_id).await?;
            if completion.is_some() {
                metrics::tournaments_completed_total();
            }
            print_json(&json!({ "cancelled": match_id, "completion": completion }))
        }
        Command::Reschedule { match_id, at } => {
            print_json(&engine.reschedule_match(*match_id, *at).await?)
        }
        Command::Standings { tournament_id } => {
            print_json(&engine.standings(*tournament_id).await?)
        }
        Command::Progress { tournament_id } => print_json(&engine.progress(*tournament_id).await?),
        Command::Bracket { tournament_id } => {
            print_json(&engine.bracket_view(*tournament_id).await?)
        }
        Command::Remind { at } => {
            let count = engine.send_due_reminders(at.unwrap_or_else(Utc::now)).await?;
            metrics::reminders_sent_total(count);
            print_json(&json!({ "matches_reminded": count }))
        }
        Command::Watch => watch(engine, reminder_interval).await,
        Command::Simulate(options) => print_json(&simulate(options).await?),
    }
}

/// Tracks the calendar day reminders were last sent for
#[derive(Debug, Default)]
pub struct ReminderSchedule {
    last_sent: Option<NaiveDate>,
}

impl ReminderSchedule {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.last_sent != Some(now.date_naive())
    }

    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.last_sent = Some(now.date_naive());
    }
}

/// Send reminders once per UTC day until interrupted
async fn watch<S, N>(engine: &BracketEngine<S, N>, interval: Duration) -> Result<(), Error>
where
    S: BracketStore,
    N: Notifier,
{
    info!("Watching for due matches every {}s", interval.as_secs());
    let mut ticker = tokio::time::interval(interval);
    let mut schedule = ReminderSchedule::default();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                info!("Shutdown signal received, stopping");
                return Ok(());
            }
            _ = ticker.tick() => {
                let now = Utc::now();
                if !schedule.is_due(now) {
                    continue;
                }
                match engine.send_due_reminders(now).await {
                    Ok(count) => {
                        metrics::reminders_sent_total(count);
                        schedule.mark_sent(now);
                    }
                    Err(e) => error!("Reminder run failed: {e}"),
                }
            }
        }
    }
}

/// Outcome of a simulated tournament
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub format: TournamentFormat,
    pub entrants: u32,
    pub matches_played: usize,
    pub placements: Placements,
    pub awards: Vec<PrizeAward>,
    pub standings: Vec<StandingRow>,
}

/// Build a bracket for synthetic entrants and play it out with random scores
pub async fn simulate(options: &SimulationOptions) -> Result<SimulationSummary, Error> {
    let mut rng = match options.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let store = InMemoryStore::new();
    let start = Utc::now();
    store
        .insert_tournament(TournamentInfo {
            id: SIMULATION_ID,
            name: "Simulation".to_string(),
            format: options.format,
            seeding: options.seeding,
            status: TournamentStatus::RegistrationClosed,
            max_players: 0,
            start_date: start,
            prize_pool: options.prize_pool,
            winner: None,
        })
        .await;
    for id in 1..=i64::from(options.entrants) {
        let registered_at = start - TimeDelta::minutes(i64::from(options.entrants) - id + 1);
        let registration =
            Registration::new(id, registered_at).with_rating(rng.random_range(800..=2400));
        store.register(SIMULATION_ID, registration).await;
        store.open_wallet(id, Decimal::ZERO).await;
    }

    let engine = BracketEngine::new(store.clone(), LogNotifier);
    if options.seeding == SeedingType::Random {
        let mut seeder = RandomSeeding::with_seed(rng.random());
        engine
            .generate_brackets_with(SIMULATION_ID, &mut seeder)
            .await?;
    } else {
        engine.generate_brackets(SIMULATION_ID).await?;
    }

    let mut matches_played = 0;
    let completion = loop {
        let Some(next) = store
            .matches(SIMULATION_ID)
            .await
            .into_iter()
            .find(|m| m.status == MatchStatus::Scheduled)
        else {
            bail!("Simulation stalled after {matches_played} matches");
        };
        let (score_a, score_b) = random_score(&mut rng, options.format.is_elimination());
        let report = engine.report_result(next.id, score_a, score_b).await?;
        matches_played += 1;
        if let Some(completion) = report.completion {
            break completion;
        }
    };

    info!(
        "Simulated {} with {} entrants: {} matches, winner {}",
        options.format, options.entrants, matches_played, completion.placements.winner
    );
    Ok(SimulationSummary {
        format: options.format,
        entrants: options.entrants,
        matches_played,
        placements: completion.placements,
        awards: completion.awards,
        standings: engine.standings(SIMULATION_ID).await?,
    })
}

fn random_score(rng: &mut StdRng, decisive: bool) -> (u32, u32) {
    let mut score_a = rng.random_range(0..=3);
    let mut score_b = rng.random_range(0..=3);
    if decisive && score_a == score_b {
        if rng.random_bool(0.5) {
            score_a += 1;
        } else {
            score_b += 1;
        }
    }
    (score_a, score_b)
}
