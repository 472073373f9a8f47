//! Read-only views over a bracket: grouped rounds for display and progress
//! statistics.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::models::{BracketKind, Entrant, Match, MatchStatus};
use super::standings::{self, StandingRow};
use crate::tournament::TournamentFormat;

/// Display name of a single-elimination round
pub fn round_name(round: u32, total_rounds: u32) -> String {
    match total_rounds.checked_sub(round) {
        Some(0) => "Finals".to_string(),
        Some(1) => "Semi-Finals".to_string(),
        Some(2) => "Quarter-Finals".to_string(),
        _ => format!("Round {round}"),
    }
}

/// One round of matches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundView {
    pub round: u32,
    pub name: String,
    pub matches: Vec<Match>,
}

/// A bracket grouped for display
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum BracketView {
    SingleElimination {
        rounds: Vec<RoundView>,
    },
    DoubleElimination {
        winners: Vec<RoundView>,
        losers: Vec<RoundView>,
        finals: Vec<RoundView>,
    },
    RoundRobin {
        rounds: Vec<RoundView>,
        standings: Vec<StandingRow>,
    },
}

impl BracketView {
    pub fn build(format: TournamentFormat, matches: &[Match], entrants: &[Entrant]) -> Self {
        match format {
            TournamentFormat::SingleElimination => {
                let total = max_round(matches, None);
                BracketView::SingleElimination {
                    rounds: group(matches, None, |round| round_name(round, total)),
                }
            }
            TournamentFormat::DoubleElimination => BracketView::DoubleElimination {
                winners: group(matches, Some(BracketKind::Winners), |round| {
                    format!("Winners Round {round}")
                }),
                losers: group(matches, Some(BracketKind::Losers), |round| {
                    format!("Losers Round {round}")
                }),
                finals: group(matches, Some(BracketKind::Finals), |_| String::new())
                    .into_iter()
                    .enumerate()
                    .map(|(idx, mut view)| {
                        view.name = if idx == 0 {
                            "Grand Finals".to_string()
                        } else {
                            "Grand Finals (Reset)".to_string()
                        };
                        view
                    })
                    .collect(),
            },
            TournamentFormat::RoundRobin => BracketView::RoundRobin {
                rounds: group(matches, None, |round| format!("Round {round}")),
                standings: standings::compute(matches, entrants),
            },
        }
    }
}

fn max_round(matches: &[Match], bracket: Option<BracketKind>) -> u32 {
    matches
        .iter()
        .filter(|m| m.bracket == bracket)
        .map(|m| m.round)
        .max()
        .unwrap_or(0)
}

fn group(
    matches: &[Match],
    bracket: Option<BracketKind>,
    name: impl Fn(u32) -> String,
) -> Vec<RoundView> {
    let mut rounds: BTreeMap<u32, Vec<Match>> = BTreeMap::new();
    for m in matches.iter().filter(|m| m.bracket == bracket) {
        rounds.entry(m.round).or_default().push(m.clone());
    }
    rounds
        .into_iter()
        .map(|(round, mut matches)| {
            matches.sort_by_key(|m| m.match_number);
            RoundView {
                round,
                name: name(round),
                matches,
            }
        })
        .collect()
}

/// Match counts and completion of a tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressStats {
    pub total_matches: usize,
    pub completed_matches: usize,
    pub pending_matches: usize,
    pub scheduled_matches: usize,
    pub in_progress_matches: usize,
    pub cancelled_matches: usize,
    pub winners_bracket_matches: usize,
    pub losers_bracket_matches: usize,
    pub finals_bracket_matches: usize,
    /// Percentage of completed matches, two decimals
    pub completion_percentage: Decimal,
    /// Lowest round with an unfinished match, per bracket (`current` for the
    /// implicit single bracket); 0 once a bracket is finished
    pub current_rounds: BTreeMap<String, u32>,
}

impl ProgressStats {
    pub fn compute(format: TournamentFormat, matches: &[Match]) -> Self {
        let count = |status: MatchStatus| matches.iter().filter(|m| m.status == status).count();
        let in_bracket =
            |kind: BracketKind| matches.iter().filter(|m| m.bracket == Some(kind)).count();

        let total = matches.len();
        let completed = count(MatchStatus::Completed);
        let completion_percentage = if total == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(completed as u64) * Decimal::ONE_HUNDRED / Decimal::from(total as u64))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };

        let current = |bracket: Option<BracketKind>| {
            matches
                .iter()
                .filter(|m| m.bracket == bracket && !m.status.is_terminal())
                .map(|m| m.round)
                .min()
                .unwrap_or(0)
        };
        let current_rounds = match format {
            TournamentFormat::DoubleElimination => [
                BracketKind::Winners,
                BracketKind::Losers,
                BracketKind::Finals,
            ]
            .into_iter()
            .map(|kind| (kind.as_str().to_string(), current(Some(kind))))
            .collect(),
            _ => BTreeMap::from([("current".to_string(), current(None))]),
        };

        Self {
            total_matches: total,
            completed_matches: completed,
            pending_matches: count(MatchStatus::Pending),
            scheduled_matches: count(MatchStatus::Scheduled),
            in_progress_matches: count(MatchStatus::InProgress),
            cancelled_matches: count(MatchStatus::Cancelled),
            winners_bracket_matches: in_bracket(BracketKind::Winners),
            losers_bracket_matches: in_bracket(BracketKind::Losers),
            finals_bracket_matches: in_bracket(BracketKind::Finals),
            completion_percentage,
            current_rounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::builder;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn built(format: TournamentFormat, n: i64) -> (Vec<Match>, Vec<Entrant>) {
        let entrants: Vec<Entrant> = (1..=n)
            .map(|i| Entrant {
                id: i,
                seed: i as u32,
            })
            .collect();
        let matches = builder::build(format, &entrants, Utc::now())
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(idx, m)| m.into_match(idx as i64 + 1, 1))
            .collect();
        (matches, entrants)
    }

    #[test]
    fn test_round_names() {
        assert_eq!(round_name(4, 4), "Finals");
        assert_eq!(round_name(3, 4), "Semi-Finals");
        assert_eq!(round_name(2, 4), "Quarter-Finals");
        assert_eq!(round_name(1, 4), "Round 1");
    }

    #[test]
    fn test_single_elimination_view() {
        let (matches, entrants) = built(TournamentFormat::SingleElimination, 8);
        let BracketView::SingleElimination { rounds } =
            BracketView::build(TournamentFormat::SingleElimination, &matches, &entrants)
        else {
            panic!("wrong view");
        };
        let names: Vec<_> = rounds.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Quarter-Finals", "Semi-Finals", "Finals"]);
        assert_eq!(rounds[0].matches.len(), 4);
    }

    #[test]
    fn test_double_elimination_view_names_finals() {
        let (matches, entrants) = built(TournamentFormat::DoubleElimination, 4);
        let BracketView::DoubleElimination { finals, losers, .. } =
            BracketView::build(TournamentFormat::DoubleElimination, &matches, &entrants)
        else {
            panic!("wrong view");
        };
        assert_eq!(finals[0].name, "Grand Finals");
        assert_eq!(finals[1].name, "Grand Finals (Reset)");
        assert_eq!(losers[0].name, "Losers Round 1");
    }

    #[test]
    fn test_view_serializes_with_format_tag() {
        let (matches, entrants) = built(TournamentFormat::RoundRobin, 4);
        let view = BracketView::build(TournamentFormat::RoundRobin, &matches, &entrants);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["format"], "round_robin");
        assert_eq!(json["rounds"].as_array().unwrap().len(), 3);
        assert_eq!(json["standings"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_progress_stats() {
        let (mut matches, _) = built(TournamentFormat::SingleElimination, 4);
        matches[0].status = MatchStatus::Completed;
        let stats = ProgressStats::compute(TournamentFormat::SingleElimination, &matches);
        assert_eq!(stats.total_matches, 3);
        assert_eq!(stats.completed_matches, 1);
        assert_eq!(stats.scheduled_matches, 1);
        assert_eq!(stats.pending_matches, 1);
        assert_eq!(stats.completion_percentage, dec!(33.33));
        assert_eq!(stats.current_rounds["current"], 1);
    }

    #[test]
    fn test_progress_stats_double_elimination_rounds() {
        let (matches, _) = built(TournamentFormat::DoubleElimination, 4);
        let stats = ProgressStats::compute(TournamentFormat::DoubleElimination, &matches);
        assert_eq!(stats.current_rounds["winners"], 1);
        assert_eq!(stats.current_rounds["losers"], 1);
        assert_eq!(stats.current_rounds["finals"], 3);
        assert_eq!(stats.finals_bracket_matches, 2);
    }

    #[test]
    fn test_progress_stats_empty() {
        let stats = ProgressStats::compute(TournamentFormat::RoundRobin, &[]);
        assert_eq!(stats.completion_percentage, Decimal::ZERO);
        assert_eq!(stats.current_rounds["current"], 0);
    }
}
