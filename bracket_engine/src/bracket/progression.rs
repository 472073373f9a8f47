//! Progression resolver.
//!
//! Recording a result is split in two. [`record_result`] validates the score
//! and completes the match. A [`BracketProgressor`] then looks at the decided
//! match and returns the effects it has on the rest of the bracket: slot fills
//! in downstream matches, a grand finals reset, or tournament completion.
//! Effects are plain data; the engine applies them inside the same unit of
//! work that recorded the result.

use chrono::{DateTime, Utc};
use enum_dispatch::enum_dispatch;

use super::errors::{BracketError, BracketResult};
use super::layout::{BracketLayout, SlotRef};
use super::models::{Entrant, EntrantId, Match, MatchKey, MatchStatus};
use super::standings;
use crate::tournament::{Placements, TournamentFormat};

/// A consequence of a decided match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write an entrant into a downstream slot
    FillSlot { target: SlotRef, entrant: EntrantId },
    /// Seat both grand finalists again in the reset match
    ResetFinals {
        target: MatchKey,
        slot_a: EntrantId,
        slot_b: EntrantId,
    },
    /// The tournament is decided
    Complete(Placements),
}

/// Validate a score and complete the match.
///
/// A tie is a draw when `allow_draw` is set and an [`BracketError::AmbiguousResult`]
/// otherwise. The match is left untouched on any error.
pub fn record_result(
    m: &mut Match,
    score_a: u32,
    score_b: u32,
    allow_draw: bool,
    now: DateTime<Utc>,
) -> BracketResult<()> {
    let (Some(a), Some(b)) = (m.slot_a, m.slot_b) else {
        return Err(BracketError::MatchNotReady {
            match_id: m.id,
            status: m.status,
        });
    };
    if !m.status.accepts_result() {
        return Err(BracketError::MatchNotReady {
            match_id: m.id,
            status: m.status,
        });
    }

    let winner = match score_a.cmp(&score_b) {
        std::cmp::Ordering::Greater => Some(a),
        std::cmp::Ordering::Less => Some(b),
        std::cmp::Ordering::Equal if allow_draw => None,
        std::cmp::Ordering::Equal => return Err(BracketError::AmbiguousResult { match_id: m.id }),
    };

    m.transition(MatchStatus::Completed)?;
    m.score_a = score_a;
    m.score_b = score_b;
    m.winner = winner;
    m.completed_at = Some(now);
    Ok(())
}

/// Per-format routing of decided matches
#[enum_dispatch]
pub trait BracketProgressor {
    /// Effects of `decided` on the bracket.
    ///
    /// `matches` is the whole bracket with `decided` already completed;
    /// `entrants` carries seeds for standings tiebreaks.
    fn advance(
        &self,
        decided: &Match,
        matches: &[Match],
        entrants: &[Entrant],
    ) -> BracketResult<Vec<Effect>>;

    /// Whether a tied score is a valid result
    fn allows_draws(&self) -> bool {
        false
    }
}

/// Strategy for a tournament's format
#[enum_dispatch(BracketProgressor)]
#[derive(Debug, Clone)]
pub enum Progression {
    SingleElimination,
    DoubleElimination,
    RoundRobin,
}

impl Progression {
    /// Pick the strategy for `format`, recomputing the elimination layout
    /// from the persisted matches
    pub fn for_bracket(format: TournamentFormat, matches: &[Match]) -> BracketResult<Self> {
        Ok(match format {
            TournamentFormat::SingleElimination => SingleElimination {
                layout: BracketLayout::from_matches(format, matches)?,
            }
            .into(),
            TournamentFormat::DoubleElimination => DoubleElimination {
                layout: BracketLayout::from_matches(format, matches)?,
            }
            .into(),
            TournamentFormat::RoundRobin => RoundRobin.into(),
        })
    }
}

fn decided_winner(m: &Match) -> BracketResult<EntrantId> {
    m.winner.ok_or(BracketError::MatchNotReady {
        match_id: m.id,
        status: m.status,
    })
}

fn route(target: Option<SlotRef>, entrant: Option<EntrantId>) -> Option<Effect> {
    Some(Effect::FillSlot {
        target: target?,
        entrant: entrant?,
    })
}

#[derive(Debug, Clone)]
pub struct SingleElimination {
    layout: BracketLayout,
}

impl BracketProgressor for SingleElimination {
    fn advance(&self, decided: &Match, _: &[Match], _: &[Entrant]) -> BracketResult<Vec<Effect>> {
        let winner = decided_winner(decided)?;
        if decided.key() == self.layout.final_key() {
            return Ok(vec![Effect::Complete(Placements {
                winner,
                runner_up: decided.loser(),
                third: None,
            })]);
        }
        let routes = self.layout.routes(&decided.key());
        Ok(route(routes.winner, Some(winner)).into_iter().collect())
    }
}

#[derive(Debug, Clone)]
pub struct DoubleElimination {
    layout: BracketLayout,
}

impl DoubleElimination {
    fn third_place(&self, matches: &[Match]) -> Option<EntrantId> {
        let key = self.layout.losers_final_key()?;
        matches.iter().find(|m| m.key() == key)?.loser()
    }
}

impl BracketProgressor for DoubleElimination {
    fn advance(
        &self,
        decided: &Match,
        matches: &[Match],
        _: &[Entrant],
    ) -> BracketResult<Vec<Effect>> {
        let winner = decided_winner(decided)?;
        let key = decided.key();

        if key == self.layout.final_key() {
            // Slot A holds the winners-bracket champion, who has not lost yet
            if decided.slot_a == Some(winner) {
                return Ok(vec![Effect::Complete(Placements {
                    winner,
                    runner_up: decided.loser(),
                    third: self.third_place(matches),
                })]);
            }
            let (Some(slot_a), Some(slot_b), Some(target)) =
                (decided.slot_a, decided.slot_b, self.layout.reset_key())
            else {
                return Err(BracketError::InvalidRecord(format!(
                    "grand finals {key} cannot be reset"
                )));
            };
            return Ok(vec![Effect::ResetFinals {
                target,
                slot_a,
                slot_b,
            }]);
        }

        if Some(key) == self.layout.reset_key() {
            return Ok(vec![Effect::Complete(Placements {
                winner,
                runner_up: decided.loser(),
                third: self.third_place(matches),
            })]);
        }

        let routes = self.layout.routes(&key);
        Ok(route(routes.winner, Some(winner))
            .into_iter()
            .chain(route(routes.loser, decided.loser()))
            .collect())
    }
}

/// No routing; the tournament ends once every live match is played
#[derive(Debug, Clone, Copy)]
pub struct RoundRobin;

impl BracketProgressor for RoundRobin {
    fn advance(
        &self,
        _: &Match,
        matches: &[Match],
        entrants: &[Entrant],
    ) -> BracketResult<Vec<Effect>> {
        let finished = matches
            .iter()
            .all(|m| matches!(m.status, MatchStatus::Completed | MatchStatus::Cancelled));
        if !finished {
            return Ok(Vec::new());
        }

        let table = standings::compute(matches, entrants);
        let Some(leader) = table.first() else {
            return Ok(Vec::new());
        };
        Ok(vec![Effect::Complete(Placements {
            winner: leader.entrant_id,
            runner_up: table.get(1).map(|row| row.entrant_id),
            third: None,
        })])
    }

    fn allows_draws(&self) -> bool {
        true
    }
}
