use bracket_engine::{
    TournamentFormat,
    bracket::{
        BracketLayout, BracketProgressor, Effect, Entrant, Match, MatchStatus, Progression, builder,
        progression, standings,
    },
};
use chrono::Utc;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn entrants(n: usize) -> Vec<Entrant> {
    (1..=n)
        .map(|i| Entrant {
            id: i as i64,
            seed: i as u32,
        })
        .collect()
}

/// Matches with IDs, as a store would return them
fn stored(format: TournamentFormat, n: usize) -> Vec<Match> {
    builder::build(format, &entrants(n), Utc::now())
        .unwrap()
        .into_iter()
        .enumerate()
        .map(|(idx, m)| m.into_match(idx as i64 + 1, 1))
        .collect()
}

/// Benchmark bracket construction per format and field size
fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    let start = Utc::now();
    for format in [
        TournamentFormat::SingleElimination,
        TournamentFormat::DoubleElimination,
        TournamentFormat::RoundRobin,
    ] {
        for n in [8, 64, 256] {
            let seeded = entrants(n);
            group.bench_with_input(BenchmarkId::new(format.as_str(), n), &seeded, |b, seeded| {
                b.iter(|| builder::build(format, black_box(seeded), start).unwrap());
            });
        }
    }
    group.finish();
}

/// Benchmark recomputing the layout from stored matches, done once per report
fn bench_layout_from_matches(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout_from_matches");
    for n in [16, 128, 512] {
        let matches = stored(TournamentFormat::DoubleElimination, n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &matches, |b, matches| {
            b.iter(|| {
                BracketLayout::from_matches(TournamentFormat::DoubleElimination, black_box(matches))
                    .unwrap()
            });
        });
    }
    group.finish();
}

/// Benchmark playing a whole double-elimination bracket, slot A always winning
fn bench_full_double_elimination(c: &mut Criterion) {
    let template = stored(TournamentFormat::DoubleElimination, 64);
    let seeded = entrants(64);

    c.bench_function("play_double_elimination_64", |b| {
        b.iter(|| {
            let mut matches = template.clone();
            let strategy =
                Progression::for_bracket(TournamentFormat::DoubleElimination, &matches).unwrap();
            while let Some(idx) = matches
                .iter()
                .position(|m| m.status == MatchStatus::Scheduled)
            {
                progression::record_result(&mut matches[idx], 1, 0, false, Utc::now()).unwrap();
                let decided = matches[idx].clone();
                for effect in strategy.advance(&decided, &matches, &seeded).unwrap() {
                    if let Effect::FillSlot { target, entrant } = effect {
                        if let Some(m) = matches.iter_mut().find(|m| m.key() == target.key) {
                            m.fill_slot(target.side, entrant).unwrap();
                        }
                    }
                }
            }
            matches
        });
    });
}

/// Benchmark standings over a finished round robin
fn bench_standings(c: &mut Criterion) {
    let seeded = entrants(32);
    let mut matches = stored(TournamentFormat::RoundRobin, 32);
    for (idx, m) in matches.iter_mut().enumerate() {
        let (a, b) = if idx % 3 == 0 { (1, 1) } else { (2, 0) };
        progression::record_result(m, a, b, true, Utc::now()).unwrap();
    }

    c.bench_function("standings_round_robin_32", |b| {
        b.iter(|| standings::compute(black_box(&matches), &seeded));
    });
}

criterion_group!(construction, bench_build, bench_layout_from_matches);

criterion_group!(progression_ops, bench_full_double_elimination, bench_standings);

criterion_main!(construction, progression_ops);
