//! Tournament records as seen by the bracket engine, and prize payout rules.

pub mod models;
pub mod prizes;

pub use models::{
    Registration, SeedingType, TournamentFormat, TournamentId, TournamentInfo, TournamentStatus,
};
pub use prizes::{Placements, PrizeAward, PrizeSplit};
