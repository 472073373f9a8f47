//! Bracket construction.
//!
//! Runs once per tournament, when registration has closed and no matches
//! exist yet. Output rows are in creation order.

use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::collections::HashMap;

use super::errors::{BracketError, BracketResult};
use super::layout::BracketLayout;
use super::models::{BracketKind, Entrant, EntrantId, MatchKey, NewMatch};
use crate::tournament::TournamentFormat;

/// Minimum entrants for any format
pub const MIN_ENTRANTS: usize = 2;

/// Next free match number per (bracket, round)
#[derive(Debug, Default)]
struct MatchCounter {
    next: HashMap<(Option<BracketKind>, u32), u32>,
}

impl MatchCounter {
    fn key(&mut self, bracket: Option<BracketKind>, round: u32) -> MatchKey {
        let next = self.next.entry((bracket, round)).or_insert(0);
        *next += 1;
        MatchKey::new(bracket, round, *next)
    }
}

/// Build every match of a bracket from seeded entrants
pub fn build(
    format: TournamentFormat,
    entrants: &[Entrant],
    start_date: DateTime<Utc>,
) -> BracketResult<Vec<NewMatch>> {
    if entrants.len() < MIN_ENTRANTS {
        return Err(BracketError::InsufficientEntrants {
            needed: MIN_ENTRANTS,
            current: entrants.len(),
        });
    }

    let mut seeded = entrants.to_vec();
    seeded.sort_by_key(|e| e.seed);
    let ids: Vec<EntrantId> = seeded.iter().map(|e| e.id).collect();

    let matches = match format {
        TournamentFormat::SingleElimination | TournamentFormat::DoubleElimination => {
            elimination(format, &ids, start_date)?
        }
        TournamentFormat::RoundRobin => round_robin(&ids, start_date),
    };
    debug!(
        "Built {} {} matches for {} entrants",
        matches.len(),
        format,
        ids.len()
    );
    Ok(matches)
}

fn elimination(
    format: TournamentFormat,
    ids: &[EntrantId],
    start_date: DateTime<Utc>,
) -> BracketResult<Vec<NewMatch>> {
    let layout = BracketLayout::new(format, ids.len())?;
    let losers_rounds = i64::from(layout.losers_rounds());
    let winners_rounds = layout.winners_rounds();

    Ok(layout
        .matches()
        .iter()
        .map(|m| {
            let days = match m.key.bracket {
                None | Some(BracketKind::Winners) => i64::from(m.key.round) - 1,
                Some(BracketKind::Losers) if m.key.round == 1 => 1,
                Some(BracketKind::Losers) => i64::from(m.key.round) + 1,
                Some(BracketKind::Finals) => {
                    losers_rounds + 1 + i64::from(m.key.round - winners_rounds)
                }
            };
            NewMatch::new(
                m.key,
                m.slot_a.map(|idx| ids[idx]),
                m.slot_b.map(|idx| ids[idx]),
                start_date + Duration::days(days),
            )
        })
        .collect())
}

/// Circle method: the first position stays fixed while the others rotate by
/// one each round. An odd field gets a bye position whose pairings are
/// skipped.
fn round_robin(ids: &[EntrantId], start_date: DateTime<Utc>) -> Vec<NewMatch> {
    let mut positions: Vec<Option<EntrantId>> = ids.iter().copied().map(Some).collect();
    if positions.len() % 2 == 1 {
        positions.push(None);
    }
    let size = positions.len();
    let mut counter = MatchCounter::default();
    let mut matches = Vec::with_capacity(ids.len() * (ids.len() - 1) / 2);

    for round in 1..size as u32 {
        let scheduled_at = start_date + Duration::days(i64::from(round) - 1);
        for p in 0..size / 2 {
            if let (Some(a), Some(b)) = (positions[p], positions[size - 1 - p]) {
                let key = counter.key(None, round);
                matches.push(NewMatch::new(key, Some(a), Some(b), scheduled_at));
            }
        }
        positions[1..].rotate_right(1);
    }
    matches
}
