//! Concurrent operations on one tournament are serialised by the unit of work.

use bracket_engine::{
    BracketEngine, BracketError, TournamentFormat, TournamentInfo, TournamentStatus,
    bracket::{MatchKey, MatchStatus},
    db::InMemoryStore,
    notifications::LogNotifier,
    tournament::{Registration, SeedingType},
};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;

async fn engine(n: i64) -> Arc<BracketEngine<InMemoryStore, LogNotifier>> {
    let store = InMemoryStore::new();
    let start = Utc::now() + Duration::days(1);
    store
        .insert_tournament(TournamentInfo {
            id: 1,
            name: "Night Cup".to_string(),
            format: TournamentFormat::SingleElimination,
            seeding: SeedingType::RegistrationOrder,
            status: TournamentStatus::RegistrationClosed,
            max_players: 64,
            start_date: start,
            prize_pool: dec!(0),
            winner: None,
        })
        .await;
    for id in 1..=n {
        store
            .register(1, Registration::new(id, start - Duration::seconds(1000 - id)))
            .await;
    }
    Arc::new(BracketEngine::new(store, LogNotifier))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_generation_has_one_winner() {
    let engine = engine(8).await;

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.generate_brackets(1).await })
        })
        .collect();

    let mut created = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(matches) => {
                assert_eq!(matches.len(), 7);
                created += 1;
            }
            Err(BracketError::AlreadyGenerated(1)) => rejected += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!((created, rejected), (1, 1));
    assert_eq!(engine.store().matches(1).await.len(), 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sibling_reports_never_lose_a_slot() {
    for _ in 0..20 {
        let engine = engine(8).await;
        engine.generate_brackets(1).await.unwrap();

        let first_round: Vec<i64> = engine
            .store()
            .matches(1)
            .await
            .iter()
            .filter(|m| m.round == 1)
            .map(|m| m.id)
            .collect();
        assert_eq!(first_round.len(), 4);

        let handles: Vec<_> = first_round
            .into_iter()
            .map(|id| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.report_result(id, 1, 0).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let matches = engine.store().matches(1).await;
        for number in 1..=2 {
            let semi = matches
                .iter()
                .find(|m| m.key() == MatchKey::new(None, 2, number))
                .unwrap();
            assert!(semi.is_ready(), "semi-final {number} lost a slot");
            assert_eq!(semi.status, MatchStatus::Scheduled);
        }
        // slot A won every first-round match: seeds 1 to 4 go through
        let semis: Vec<_> = matches
            .iter()
            .filter(|m| m.round == 2)
            .map(|m| (m.slot_a, m.slot_b))
            .collect();
        assert_eq!(semis, vec![(Some(1), Some(2)), (Some(3), Some(4))]);
    }
}
