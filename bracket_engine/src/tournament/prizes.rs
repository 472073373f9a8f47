//! Prize distribution at tournament completion.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::bracket::EntrantId;

/// Final placings of a completed tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placements {
    pub winner: EntrantId,
    pub runner_up: Option<EntrantId>,
    /// Only decided in double elimination (losers-final loser)
    pub third: Option<EntrantId>,
}

/// One payout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeAward {
    pub entrant_id: EntrantId,
    /// 1 = winner
    pub place: u32,
    pub amount: Decimal,
}

/// Share of the pool per place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeSplit {
    pub winner: Decimal,
    pub runner_up: Decimal,
    pub third: Decimal,
}

impl Default for PrizeSplit {
    /// 70 / 20 / 10
    fn default() -> Self {
        Self {
            winner: dec!(0.70),
            runner_up: dec!(0.20),
            third: dec!(0.10),
        }
    }
}

impl PrizeSplit {
    /// Compute payouts for the places that were decided.
    ///
    /// Each share is rounded to cents. The winner also takes the rounding
    /// residue of the paid shares, so the payouts sum to the paid fraction of
    /// the pool rounded once. Shares of undecided places, and whatever a
    /// split leaves unallocated, stay in the pool.
    pub fn distribute(&self, pool: Decimal, placements: &Placements) -> Vec<PrizeAward> {
        if pool <= Decimal::ZERO {
            return Vec::new();
        }
        let share = |ratio: Decimal| {
            (pool * ratio).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };

        let runner_up = placements.runner_up.map(|id| (id, share(self.runner_up)));
        let third = placements.third.map(|id| (id, share(self.third)));
        let paid_ratio = self.winner
            + runner_up.map_or(Decimal::ZERO, |_| self.runner_up)
            + third.map_or(Decimal::ZERO, |_| self.third);
        let others: Decimal = [runner_up, third]
            .iter()
            .flatten()
            .map(|(_, amount)| *amount)
            .sum();
        let winner_amount = share(paid_ratio) - others;

        let mut awards = vec![PrizeAward {
            entrant_id: placements.winner,
            place: 1,
            amount: winner_amount,
        }];
        for (place, paid) in [(2, runner_up), (3, third)] {
            if let Some((entrant_id, amount)) = paid {
                awards.push(PrizeAward {
                    entrant_id,
                    place,
                    amount,
                });
            }
        }
        awards.retain(|award| award.amount > Decimal::ZERO);
        awards
    }
}
