//! Bracket generation through the engine and the in-memory store.

use bracket_engine::{
    BracketEngine, BracketError, TournamentFormat, TournamentInfo, TournamentStatus,
    bracket::{BracketKind, Match, MatchKey, MatchStatus, seeding::RandomSeeding},
    db::{BracketStore, InMemoryStore},
    notifications::LogNotifier,
    tournament::{Registration, SeedingType},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashSet};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 6, 17, 0, 0).unwrap()
}

async fn tournament(format: TournamentFormat, seeding: SeedingType, n: i64) -> InMemoryStore {
    let store = InMemoryStore::new();
    store
        .insert_tournament(TournamentInfo {
            id: 42,
            name: "Autumn Open".to_string(),
            format,
            seeding,
            status: TournamentStatus::RegistrationClosed,
            max_players: 128,
            start_date: start(),
            prize_pool: dec!(250),
            winner: None,
        })
        .await;
    for id in 1..=n {
        let registration = Registration::new(100 + id, start() - Duration::hours(n - id + 1))
            .with_rating(1000 + (id as i32 % 5) * 100);
        store.register(42, registration).await;
    }
    store
}

fn by_key(matches: &[Match], key: MatchKey) -> &Match {
    matches
        .iter()
        .find(|m| m.key() == key)
        .unwrap_or_else(|| panic!("no match {key}"))
}

#[tokio::test]
async fn test_single_elimination_four_entrants() {
    let store = tournament(
        TournamentFormat::SingleElimination,
        SeedingType::RegistrationOrder,
        4,
    )
    .await;
    let engine = BracketEngine::new(store.clone(), LogNotifier);
    let matches = engine.generate_brackets(42).await.unwrap();

    assert_eq!(matches.len(), 3);
    let first = by_key(&matches, MatchKey::new(None, 1, 1));
    assert_eq!((first.slot_a, first.slot_b), (Some(101), Some(104)));
    assert_eq!(first.status, MatchStatus::Scheduled);
    assert_eq!(first.scheduled_at, start());

    let second = by_key(&matches, MatchKey::new(None, 1, 2));
    assert_eq!((second.slot_a, second.slot_b), (Some(102), Some(103)));

    let last = by_key(&matches, MatchKey::new(None, 2, 1));
    assert_eq!(last.status, MatchStatus::Pending);
    assert_eq!((last.slot_a, last.slot_b), (None, None));
    assert_eq!(last.scheduled_at, start() + Duration::days(1));
}

#[tokio::test]
async fn test_single_elimination_three_entrants_has_no_bye_row() {
    let store = tournament(
        TournamentFormat::SingleElimination,
        SeedingType::RegistrationOrder,
        3,
    )
    .await;
    let engine = BracketEngine::new(store.clone(), LogNotifier);
    let matches = engine.generate_brackets(42).await.unwrap();

    assert_eq!(matches.len(), 2);
    let only = by_key(&matches, MatchKey::new(None, 1, 1));
    assert_eq!((only.slot_a, only.slot_b), (Some(102), Some(103)));

    // top seed waits in the final and the final is not playable yet
    let last = by_key(&matches, MatchKey::new(None, 2, 1));
    assert_eq!((last.slot_a, last.slot_b), (Some(101), None));
    assert_eq!(last.status, MatchStatus::Pending);
}

#[tokio::test]
async fn test_double_elimination_eight_entrants() {
    let store = tournament(
        TournamentFormat::DoubleElimination,
        SeedingType::RegistrationOrder,
        8,
    )
    .await;
    let engine = BracketEngine::new(store.clone(), LogNotifier);
    let matches = engine.generate_brackets(42).await.unwrap();

    assert_eq!(matches.len(), 15);
    let mut per_round: BTreeMap<(Option<BracketKind>, u32), usize> = BTreeMap::new();
    for m in &matches {
        *per_round.entry((m.bracket, m.round)).or_default() += 1;
    }
    let winners = Some(BracketKind::Winners);
    let losers = Some(BracketKind::Losers);
    let finals = Some(BracketKind::Finals);
    assert_eq!(
        per_round.into_iter().collect::<Vec<_>>(),
        vec![
            ((winners, 1), 4),
            ((winners, 2), 2),
            ((winners, 3), 1),
            ((losers, 1), 2),
            ((losers, 2), 2),
            ((losers, 3), 1),
            ((losers, 4), 1),
            ((finals, 4), 1),
            ((finals, 5), 1),
        ]
    );

    let scheduled: Vec<_> = matches
        .iter()
        .filter(|m| m.status == MatchStatus::Scheduled)
        .collect();
    assert_eq!(scheduled.len(), 4);
    assert!(scheduled.iter().all(|m| m.bracket == winners && m.round == 1));

    let grand_finals = by_key(&matches, MatchKey::new(finals, 4, 1));
    let reset = by_key(&matches, MatchKey::new(finals, 5, 2));
    assert_eq!(grand_finals.scheduled_at, start() + Duration::days(6));
    assert_eq!(reset.scheduled_at, start() + Duration::days(7));
}

#[tokio::test]
async fn test_round_robin_three_entrants() {
    let store = tournament(TournamentFormat::RoundRobin, SeedingType::RegistrationOrder, 3).await;
    let engine = BracketEngine::new(store.clone(), LogNotifier);
    let matches = engine.generate_brackets(42).await.unwrap();

    assert_eq!(matches.len(), 3);
    assert!(matches.iter().all(|m| m.status == MatchStatus::Scheduled));
    let pairs: HashSet<(i64, i64)> = matches
        .iter()
        .map(|m| {
            let (a, b) = (m.slot_a.unwrap(), m.slot_b.unwrap());
            (a.min(b), a.max(b))
        })
        .collect();
    assert_eq!(
        pairs,
        HashSet::from([(101, 102), (101, 103), (102, 103)])
    );
    let rounds: Vec<u32> = matches.iter().map(|m| m.round).collect();
    assert_eq!(rounds, vec![1, 2, 3]);
    assert_eq!(matches[2].scheduled_at, start() + Duration::days(2));
}

#[tokio::test]
async fn test_ranked_seeding_orders_by_rating() {
    let store = tournament(TournamentFormat::SingleElimination, SeedingType::Ranked, 5).await;
    let engine = BracketEngine::new(store.clone(), LogNotifier);
    engine.generate_brackets(42).await.unwrap();

    let snapshot = engine.snapshot(42).await.unwrap();
    let order: Vec<i64> = snapshot.entrants.iter().map(|e| e.id).collect();
    // ratings: 101 -> 1100, 102 -> 1200, 103 -> 1300, 104 -> 1400, 105 -> 1000
    assert_eq!(order, vec![104, 103, 102, 101, 105]);
    let seeds: Vec<u32> = snapshot.entrants.iter().map(|e| e.seed).collect();
    assert_eq!(seeds, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_random_seeding_is_a_permutation() {
    let store = tournament(TournamentFormat::DoubleElimination, SeedingType::Random, 11).await;
    let engine = BracketEngine::new(store.clone(), LogNotifier);
    let mut seeder = RandomSeeding::with_seed(7);
    let matches = engine.generate_brackets_with(42, &mut seeder).await.unwrap();
    assert_eq!(matches.len(), 21);

    let snapshot = engine.snapshot(42).await.unwrap();
    let mut ids: Vec<i64> = snapshot.entrants.iter().map(|e| e.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, (101..=111).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_generation_errors() {
    let store = tournament(
        TournamentFormat::SingleElimination,
        SeedingType::RegistrationOrder,
        4,
    )
    .await;
    let engine = BracketEngine::new(store.clone(), LogNotifier);

    let missing = engine.generate_brackets(7).await.unwrap_err();
    assert!(matches!(missing, BracketError::TournamentNotFound(7)));

    engine.generate_brackets(42).await.unwrap();
    let again = engine.generate_brackets(42).await.unwrap_err();
    assert!(matches!(again, BracketError::AlreadyGenerated(42)));
    assert_eq!(store.matches(42).await.len(), 3);

    let tournament = store.tournament(42).await.unwrap();
    assert_eq!(tournament.status, TournamentStatus::InProgress);
}

#[test]
fn test_unknown_format_is_unsupported() {
    let err = "swiss".parse::<TournamentFormat>().unwrap_err();
    assert!(matches!(err, BracketError::UnsupportedFormat(ref f) if f == "swiss"));
}
