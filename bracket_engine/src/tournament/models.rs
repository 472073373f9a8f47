//! Tournament data models, as far as the bracket engine needs them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::bracket::{BracketError, EntrantId};

/// Tournament ID type
pub type TournamentId = i64;

/// Bracket format of a tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentFormat {
    SingleElimination,
    DoubleElimination,
    RoundRobin,
}

impl TournamentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentFormat::SingleElimination => "single_elimination",
            TournamentFormat::DoubleElimination => "double_elimination",
            TournamentFormat::RoundRobin => "round_robin",
        }
    }

    /// Whether every match of this format must produce a winner
    pub fn is_elimination(&self) -> bool {
        !matches!(self, TournamentFormat::RoundRobin)
    }
}

impl fmt::Display for TournamentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentFormat {
    type Err = BracketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_elimination" => Ok(TournamentFormat::SingleElimination),
            "double_elimination" => Ok(TournamentFormat::DoubleElimination),
            "round_robin" => Ok(TournamentFormat::RoundRobin),
            other => Err(BracketError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// How registered entrants are ordered into bracket positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedingType {
    /// Seed by registration time
    #[default]
    RegistrationOrder,
    /// Shuffle entrants
    Random,
    /// Seed by rating, highest first
    Ranked,
}

impl SeedingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeedingType::RegistrationOrder => "registration_order",
            SeedingType::Random => "random",
            SeedingType::Ranked => "ranked",
        }
    }
}

impl FromStr for SeedingType {
    type Err = BracketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration_order" | "registration" => Ok(SeedingType::RegistrationOrder),
            "random" => Ok(SeedingType::Random),
            "ranked" => Ok(SeedingType::Ranked),
            other => Err(BracketError::InvalidRecord(format!(
                "unknown seeding type '{other}'"
            ))),
        }
    }
}

/// Tournament lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    Draft,
    Upcoming,
    RegistrationOpen,
    /// Registration closed, bracket not generated yet
    RegistrationClosed,
    /// Bracket generated, results coming in
    InProgress,
    Completed,
    Cancelled,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Draft => "draft",
            TournamentStatus::Upcoming => "upcoming",
            TournamentStatus::RegistrationOpen => "registration_open",
            TournamentStatus::RegistrationClosed => "registration_closed",
            TournamentStatus::InProgress => "in_progress",
            TournamentStatus::Completed => "completed",
            TournamentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentStatus {
    type Err = BracketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(TournamentStatus::Draft),
            "upcoming" => Ok(TournamentStatus::Upcoming),
            "registration_open" => Ok(TournamentStatus::RegistrationOpen),
            "registration_closed" => Ok(TournamentStatus::RegistrationClosed),
            "in_progress" => Ok(TournamentStatus::InProgress),
            "completed" => Ok(TournamentStatus::Completed),
            "cancelled" => Ok(TournamentStatus::Cancelled),
            other => Err(BracketError::InvalidRecord(format!(
                "unknown tournament status '{other}'"
            ))),
        }
    }
}

/// Tournament information read by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentInfo {
    /// Tournament ID
    pub id: TournamentId,
    /// Display name, used in ledger descriptions and notifications
    pub name: String,
    /// Bracket format
    pub format: TournamentFormat,
    /// Seeding policy applied at generation
    pub seeding: SeedingType,
    /// Current state
    pub status: TournamentStatus,
    /// Maximum entrants accepted at registration
    pub max_players: u32,
    /// First day of play
    pub start_date: DateTime<Utc>,
    /// Total prize pool
    pub prize_pool: Decimal,
    /// Champion, once completed
    pub winner: Option<EntrantId>,
}

/// An active registration handed to the seeder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub entrant_id: EntrantId,
    pub registered_at: DateTime<Utc>,
    /// Skill rating, only consulted by ranked seeding
    pub rating: Option<i32>,
}

impl Registration {
    pub fn new(entrant_id: EntrantId, registered_at: DateTime<Utc>) -> Self {
        Self {
            entrant_id,
            registered_at,
            rating: None,
        }
    }

    pub fn with_rating(mut self, rating: i32) -> Self {
        self.rating = Some(rating);
        self
    }
}
