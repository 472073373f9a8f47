//! # Bracket Engine
//!
//! Tournament bracket construction and progression for esports events.
//!
//! A tournament moves through the engine in three steps:
//!
//! - **Seeding**: active registrations become entrants with seeds `1..=N`
//! - **Building**: every match of the bracket is created once, when
//!   registration closes (single elimination, double elimination with a
//!   bracket reset, or round robin)
//! - **Progression**: each reported result routes the winner (and in double
//!   elimination the loser) into the downstream match, until the tournament
//!   completes and the prize pool is paid out
//!
//! ## Core Modules
//!
//! - [`bracket`]: bracket models, seeding, layout, builder, progression, standings
//! - [`engine`]: the operations, each run as one unit of work over a store
//! - [`db`]: PostgreSQL and in-memory stores
//! - [`ledger`]: wallet credits for prizes
//! - [`notifications`]: player notifications
//! - [`tournament`]: tournament records and prize split
//!
//! ## Example
//!
//! ```
//! use bracket_engine::{TournamentFormat, bracket::{Entrant, builder}};
//! use chrono::Utc;
//!
//! let entrants: Vec<Entrant> = (1..=4).map(|i| Entrant { id: i, seed: i as u32 }).collect();
//! let matches = builder::build(TournamentFormat::SingleElimination, &entrants, Utc::now()).unwrap();
//! assert_eq!(matches.len(), 3);
//! ```

/// Bracket models and algorithms.
pub mod bracket;
pub use bracket::{BracketError, BracketResult, Match, MatchKey, MatchStatus};

/// Persistence.
pub mod db;

/// Engine operations.
pub mod engine;
pub use engine::{BracketEngine, BracketSnapshot, Completion, ResultReport};

pub mod ledger;
pub mod notifications;

/// Tournament records.
pub mod tournament;
pub use tournament::{TournamentFormat, TournamentId, TournamentInfo, TournamentStatus};
