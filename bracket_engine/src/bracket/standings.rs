//! Standings calculator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::models::{Entrant, EntrantId, Match, MatchStatus};

/// Points for a win
pub const WIN_POINTS: u32 = 3;

/// Points for each side of a draw
pub const DRAW_POINTS: u32 = 1;

/// One entrant's line in the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingRow {
    pub entrant_id: EntrantId,
    pub seed: u32,
    pub matches_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub points: u32,
}

impl StandingRow {
    fn new(entrant_id: EntrantId, seed: u32) -> Self {
        Self {
            entrant_id,
            seed,
            matches_played: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            points: 0,
        }
    }
}

/// Fold completed matches into a sorted table.
///
/// Ordering: points, then wins (both descending), then losses ascending, then
/// seed. Entrants with no completed match still appear. Anyone found in a
/// match but missing from `entrants` is ranked after the seeded field in
/// order of first appearance.
pub fn compute(matches: &[Match], entrants: &[Entrant]) -> Vec<StandingRow> {
    let mut rows: Vec<StandingRow> = entrants
        .iter()
        .map(|e| StandingRow::new(e.id, e.seed))
        .collect();
    let mut index: HashMap<EntrantId, usize> = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| (row.entrant_id, idx))
        .collect();
    let unseeded_base = entrants.iter().map(|e| e.seed).max().unwrap_or(0);

    let mut ordered: Vec<&Match> = matches.iter().collect();
    ordered.sort_by_key(|m| m.key());

    for m in ordered {
        for id in m.occupants() {
            if !index.contains_key(&id) {
                let seed = unseeded_base + (rows.len() - entrants.len()) as u32 + 1;
                index.insert(id, rows.len());
                rows.push(StandingRow::new(id, seed));
            }
        }

        let (Some(a), Some(b)) = (m.slot_a, m.slot_b) else {
            continue;
        };
        if m.status != MatchStatus::Completed {
            continue;
        }

        for id in [a, b] {
            let row = &mut rows[index[&id]];
            row.matches_played += 1;
            match m.winner {
                Some(winner) if winner == id => {
                    row.wins += 1;
                    row.points += WIN_POINTS;
                }
                Some(_) => row.losses += 1,
                None => {
                    row.draws += 1;
                    row.points += DRAW_POINTS;
                }
            }
        }
    }

    rows.sort_by(|x, y| {
        y.points
            .cmp(&x.points)
            .then_with(|| y.wins.cmp(&x.wins))
            .then_with(|| x.losses.cmp(&y.losses))
            .then_with(|| x.seed.cmp(&y.seed))
    });
    rows
}
