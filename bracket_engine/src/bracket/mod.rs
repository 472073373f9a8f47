//! Bracket construction and progression.
//!
//! - [`seeding`]: orders registrations into seeds
//! - [`builder`]: creates every match of a bracket at tournament lock
//! - [`layout`]: the shared shape of elimination brackets, including byes
//! - [`progression`]: routes results to downstream matches
//! - [`standings`]: win/draw/loss table
//! - [`view`]: display grouping and progress statistics

pub mod builder;
pub mod errors;
pub mod layout;
pub mod models;
pub mod progression;
pub mod seeding;
pub mod standings;
pub mod view;

pub use errors::{BracketError, BracketResult};
pub use layout::{BracketLayout, Routes, SlotRef};
pub use models::{
    BracketKind, Entrant, EntrantId, Match, MatchId, MatchKey, MatchStatus, NewMatch, Side,
};
pub use progression::{BracketProgressor, Effect, Progression};
pub use seeding::SeedingStrategy;
pub use standings::StandingRow;
pub use view::{BracketView, ProgressStats, RoundView};
