/// Property-based tests for bracket construction and progression.
///
/// Brackets of random size are built and played out with random results,
/// applying progression effects directly to the match list. The structural
/// invariants are checked after every result.
use bracket_engine::{
    TournamentFormat,
    bracket::{
        BracketKind, BracketProgressor, Effect, Entrant, Match, MatchStatus, Progression, Side,
        builder, progression, standings,
    },
    tournament::Placements,
};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};

fn entrants(n: usize) -> Vec<Entrant> {
    (1..=n)
        .map(|i| Entrant {
            id: i as i64 * 10,
            seed: i as u32,
        })
        .collect()
}

fn built(format: TournamentFormat, n: usize) -> Vec<Match> {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    builder::build(format, &entrants(n), start)
        .unwrap()
        .into_iter()
        .enumerate()
        .map(|(idx, m)| m.into_match(idx as i64 + 1, 1))
        .collect()
}

// Every status/slot/winner combination a match may legally be in
fn check_invariants(matches: &[Match], format: TournamentFormat) -> Result<(), TestCaseError> {
    for m in matches {
        if m.is_ready() {
            prop_assert_ne!(m.status, MatchStatus::Pending, "{} ready but pending", m.key());
        } else {
            prop_assert_eq!(m.status, MatchStatus::Pending, "{} has an empty slot", m.key());
        }
        if let Some(winner) = m.winner {
            prop_assert_eq!(m.status, MatchStatus::Completed);
            prop_assert!(m.slot_a == Some(winner) || m.slot_b == Some(winner));
        } else if m.status == MatchStatus::Completed {
            prop_assert_eq!(format, TournamentFormat::RoundRobin);
        }
    }
    Ok(())
}

// Rounds contiguous from 1 per bracket (finals excepted), match numbers
// contiguous from 1 per round
fn check_numbering(matches: &[Match]) -> Result<(), TestCaseError> {
    let mut rounds: BTreeMap<Option<BracketKind>, BTreeMap<u32, Vec<u32>>> = BTreeMap::new();
    for m in matches {
        rounds
            .entry(m.bracket)
            .or_default()
            .entry(m.round)
            .or_default()
            .push(m.match_number);
    }
    for (bracket, per_round) in rounds {
        if bracket != Some(BracketKind::Finals) {
            let numbers: Vec<u32> = per_round.keys().copied().collect();
            prop_assert_eq!(numbers, (1..=per_round.len() as u32).collect::<Vec<_>>());
        }
        for (_, mut numbers) in per_round {
            if bracket == Some(BracketKind::Finals) {
                continue;
            }
            numbers.sort_unstable();
            prop_assert_eq!(numbers.clone(), (1..=numbers.len() as u32).collect::<Vec<_>>());
        }
    }
    Ok(())
}

struct Played {
    matches: Vec<Match>,
    placements: Placements,
    decided: usize,
}

fn play(
    format: TournamentFormat,
    n: usize,
    outcomes: &[u8],
) -> Result<Played, TestCaseError> {
    let seeded = entrants(n);
    let mut matches = built(format, n);
    check_numbering(&matches)?;
    let strategy = Progression::for_bracket(format, &matches).unwrap();
    let now = Utc::now();

    for step in 0.. {
        let Some(idx) = matches
            .iter()
            .position(|m| m.status == MatchStatus::Scheduled)
        else {
            return Err(TestCaseError::fail(format!(
                "bracket stalled after {step} results"
            )));
        };
        let (a, b) = match outcomes[step % outcomes.len()] % 3 {
            0 => (2, 1),
            1 => (0, 3),
            _ if strategy.allows_draws() => (1, 1),
            _ => (3, 2),
        };
        progression::record_result(&mut matches[idx], a, b, strategy.allows_draws(), now)
            .unwrap();
        let decided = matches[idx].clone();

        for effect in strategy.advance(&decided, &matches, &seeded).unwrap() {
            match effect {
                Effect::FillSlot { target, entrant } => {
                    let m = matches
                        .iter_mut()
                        .find(|m| m.key() == target.key)
                        .expect("route to a missing match");
                    m.fill_slot(target.side, entrant).unwrap();
                }
                Effect::ResetFinals {
                    target,
                    slot_a,
                    slot_b,
                } => {
                    let m = matches
                        .iter_mut()
                        .find(|m| m.key() == target)
                        .expect("missing reset match");
                    m.fill_slot(Side::A, slot_a).unwrap();
                    m.fill_slot(Side::B, slot_b).unwrap();
                }
                Effect::Complete(placements) => {
                    check_invariants(&matches, format)?;
                    return Ok(Played {
                        matches,
                        placements,
                        decided: step + 1,
                    });
                }
            }
        }
        check_invariants(&matches, format)?;
    }
    unreachable!()
}

fn losses(matches: &[Match]) -> HashMap<i64, usize> {
    let mut losses = HashMap::new();
    for loser in matches.iter().filter_map(|m| m.loser()) {
        *losses.entry(loser).or_default() += 1;
    }
    losses
}

proptest! {
    #[test]
    fn prop_single_elimination_plays_out(
        n in 2usize..=40,
        outcomes in prop::collection::vec(any::<u8>(), 1..64),
    ) {
        let played = play(TournamentFormat::SingleElimination, n, &outcomes)?;
        prop_assert_eq!(played.decided, n - 1);
        prop_assert!(played.matches.iter().all(|m| m.status == MatchStatus::Completed));

        let losses = losses(&played.matches);
        prop_assert_eq!(losses.len(), n - 1);
        prop_assert!(!losses.contains_key(&played.placements.winner));
        prop_assert!(losses.values().all(|&count| count == 1));
        prop_assert!(played.placements.runner_up.is_some());
        prop_assert_eq!(played.placements.third, None);
    }

    #[test]
    fn prop_double_elimination_plays_out(
        n in 2usize..=33,
        outcomes in prop::collection::vec(any::<u8>(), 1..64),
    ) {
        let played = play(TournamentFormat::DoubleElimination, n, &outcomes)?;
        let reset = played
            .matches
            .iter()
            .find(|m| m.bracket == Some(BracketKind::Finals) && m.match_number == 2)
            .unwrap();

        if reset.status == MatchStatus::Completed {
            prop_assert_eq!(played.decided, 2 * n - 1);
        } else {
            prop_assert_eq!(played.decided, 2 * n - 2);
            prop_assert_eq!(reset.status, MatchStatus::Pending);
            prop_assert!(reset.slot_a.is_none() && reset.slot_b.is_none());
        }

        // everyone but the champion is out on two losses
        let losses = losses(&played.matches);
        prop_assert!(losses.get(&played.placements.winner).copied().unwrap_or(0) <= 1);
        for entrant in entrants(n) {
            if entrant.id != played.placements.winner {
                prop_assert_eq!(losses.get(&entrant.id).copied(), Some(2), "entrant {}", entrant.id);
            }
        }
        prop_assert_eq!(played.placements.third.is_some(), n >= 3);
    }

    #[test]
    fn prop_round_robin_plays_every_pair(
        n in 2usize..=16,
        outcomes in prop::collection::vec(any::<u8>(), 1..64),
    ) {
        let played = play(TournamentFormat::RoundRobin, n, &outcomes)?;
        prop_assert_eq!(played.decided, n * (n - 1) / 2);

        let table = standings::compute(&played.matches, &entrants(n));
        prop_assert_eq!(table.len(), n);
        prop_assert_eq!(table[0].entrant_id, played.placements.winner);
        prop_assert!(table.iter().all(|row| row.matches_played as usize == n - 1));
        prop_assert!(table.windows(2).all(|pair| pair[0].points >= pair[1].points));

        let draws: u32 = table.iter().map(|row| row.draws).sum();
        let wins: u32 = table.iter().map(|row| row.wins).sum();
        let points: u32 = table.iter().map(|row| row.points).sum();
        prop_assert_eq!(points, 3 * wins + draws);
    }
}
