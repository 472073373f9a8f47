//! Seeding: ordering registrations into bracket positions.
//!
//! The seeder turns N active registrations into entrants with seeds `1..=N`,
//! where seed order is bracket-position order (seed 1 meets seed N in the
//! first round of an elimination bracket).

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::models::Entrant;
use crate::tournament::{Registration, SeedingType};

/// A policy for ordering registrations
pub trait SeedingStrategy: Send {
    /// Reorder registrations so that index 0 becomes seed 1
    fn arrange(&mut self, registrations: &mut [Registration]);

    /// Produce seeded entrants
    fn seed(&mut self, registrations: &[Registration]) -> Vec<Entrant> {
        let mut ordered = registrations.to_vec();
        self.arrange(&mut ordered);
        ordered
            .iter()
            .enumerate()
            .map(|(idx, reg)| Entrant {
                id: reg.entrant_id,
                seed: idx as u32 + 1,
            })
            .collect()
    }
}

/// Seeds by registration time, earliest first
#[derive(Debug, Default, Clone, Copy)]
pub struct RegistrationOrder;

impl SeedingStrategy for RegistrationOrder {
    fn arrange(&mut self, registrations: &mut [Registration]) {
        // Stable sort keeps store order for identical timestamps
        registrations.sort_by_key(|reg| reg.registered_at);
    }
}

/// Shuffles entrants
pub struct RandomSeeding {
    rng: StdRng,
}

impl RandomSeeding {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Deterministic shuffle, for replays and tests
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSeeding {
    fn default() -> Self {
        Self::new()
    }
}

impl SeedingStrategy for RandomSeeding {
    fn arrange(&mut self, registrations: &mut [Registration]) {
        registrations.shuffle(&mut self.rng);
    }
}

/// Seeds by rating, highest first. Unrated entrants go last, ties fall back
/// to registration order.
#[derive(Debug, Default, Clone, Copy)]
pub struct RankedSeeding;

impl SeedingStrategy for RankedSeeding {
    fn arrange(&mut self, registrations: &mut [Registration]) {
        registrations.sort_by(|a, b| {
            b.rating
                .cmp(&a.rating)
                .then_with(|| a.registered_at.cmp(&b.registered_at))
        });
    }
}

/// Strategy for a tournament's configured seeding type
pub fn for_type(seeding: SeedingType) -> Box<dyn SeedingStrategy> {
    match seeding {
        SeedingType::RegistrationOrder => Box::new(RegistrationOrder),
        SeedingType::Random => Box::new(RandomSeeding::new()),
        SeedingType::Ranked => Box::new(RankedSeeding),
    }
}
