//! Elimination bracket layout.
//!
//! A layout is a pure function of the format and the entrant count. It is
//! computed once from a feed graph: every node of a full power-of-two bracket
//! names where its two slots come from (a seeded entrant, the winner or loser
//! of another node, or nothing). Byes make some nodes degenerate:
//!
//! - a node with two live feeds is a real match and becomes a row;
//! - a node with one live feed passes that feed through to its consumers;
//! - a node with no live feeds vanishes.
//!
//! Passing feeds through is what advances a bye: the top seed of a bye
//! position lands directly in its round-2 slot, prefilled at build time.
//!
//! Real matches keep their relative order; rounds left without a real match
//! are dropped and the remaining ones renumbered from 1 per bracket. Both the
//! builder and the progression resolver use the same layout, so routing is
//! always consistent with what was built.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::errors::{BracketError, BracketResult};
use super::models::{BracketKind, Match, MatchKey, Side};
use crate::tournament::TournamentFormat;

/// Where a decided match sends one of its participants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    pub key: MatchKey,
    pub side: Side,
}

/// Outgoing edges of a match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Routes {
    pub winner: Option<SlotRef>,
    pub loser: Option<SlotRef>,
}

/// One match row of the layout. Slots hold seed indices (0 = seed 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutMatch {
    pub key: MatchKey,
    pub slot_a: Option<usize>,
    pub slot_b: Option<usize>,
}

type NodeId = usize;

#[derive(Debug, Clone, Copy)]
enum Feed {
    Entrant(usize),
    Winner(NodeId),
    Loser(NodeId),
    Empty,
}

#[derive(Debug, Clone, Copy)]
enum Live {
    Entrant(usize),
    WinnerOf(NodeId),
    LoserOf(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Real,
    PassThrough,
    Void,
}

#[derive(Debug)]
struct Node {
    bracket: Option<BracketKind>,
    round: u32,
    position: u32,
    feeds: [Feed; 2],
}

#[derive(Default)]
struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    fn push(&mut self, bracket: Option<BracketKind>, round: u32, position: u32, a: Feed, b: Feed) -> NodeId {
        self.nodes.push(Node {
            bracket,
            round,
            position,
            feeds: [a, b],
        });
        self.nodes.len() - 1
    }
}

/// Number of winners rounds for `entrants` players, `ceil(log2 n)`
pub fn winners_rounds(entrants: usize) -> u32 {
    entrants.max(2).next_power_of_two().trailing_zeros()
}

/// The computed shape of an elimination bracket
#[derive(Debug, Clone)]
pub struct BracketLayout {
    format: TournamentFormat,
    entrants: usize,
    winners_rounds: u32,
    losers_rounds: u32,
    matches: Vec<LayoutMatch>,
    routes: HashMap<MatchKey, Routes>,
}

impl BracketLayout {
    /// Compute the layout for `entrants` seeded players
    pub fn new(format: TournamentFormat, entrants: usize) -> BracketResult<Self> {
        if !format.is_elimination() {
            return Err(BracketError::UnsupportedFormat(format!(
                "{format} has no elimination layout"
            )));
        }
        if entrants < 2 {
            return Err(BracketError::InsufficientEntrants {
                needed: 2,
                current: entrants,
            });
        }

        let double = format == TournamentFormat::DoubleElimination;
        let rounds = winners_rounds(entrants);
        let graph = feed_graph(double, entrants, rounds);

        // Nodes are pushed after everything that feeds them, so one forward
        // pass resolves the whole graph.
        let mut kinds: Vec<NodeKind> = Vec::with_capacity(graph.nodes.len());
        let mut lives: Vec<[Option<Live>; 2]> = Vec::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            let live = node.feeds.map(|feed| resolve(feed, &kinds, &lives));
            let kind = match live.iter().flatten().count() {
                2 => NodeKind::Real,
                1 => NodeKind::PassThrough,
                _ => NodeKind::Void,
            };
            kinds.push(kind);
            lives.push(live);
        }

        // Compact rounds per bracket, then number real matches by position
        let mut raw_rounds: BTreeMap<Option<BracketKind>, BTreeSet<u32>> = BTreeMap::new();
        for (id, node) in graph.nodes.iter().enumerate() {
            if kinds[id] == NodeKind::Real {
                raw_rounds.entry(node.bracket).or_default().insert(node.round);
            }
        }
        let compact = |bracket: Option<BracketKind>, raw: u32| -> u32 {
            if bracket == Some(BracketKind::Finals) {
                return raw;
            }
            raw_rounds
                .get(&bracket)
                .and_then(|set| set.iter().position(|&r| r == raw))
                .map_or(raw, |idx| idx as u32 + 1)
        };

        let mut order: Vec<NodeId> = (0..graph.nodes.len())
            .filter(|&id| kinds[id] == NodeKind::Real)
            .collect();
        order.sort_by_key(|&id| {
            let node = &graph.nodes[id];
            (node.bracket, node.round, node.position)
        });

        let mut keys: HashMap<NodeId, MatchKey> = HashMap::new();
        let mut counters: HashMap<(Option<BracketKind>, u32), u32> = HashMap::new();
        let mut matches = Vec::with_capacity(order.len());
        for &id in &order {
            let node = &graph.nodes[id];
            let round = compact(node.bracket, node.round);
            let next = counters.entry((node.bracket, round)).or_insert(0);
            *next += 1;
            let key = MatchKey::new(node.bracket, round, *next);
            keys.insert(id, key);

            let seed = |live: Option<Live>| match live {
                Some(Live::Entrant(idx)) => Some(idx),
                _ => None,
            };
            matches.push(LayoutMatch {
                key,
                slot_a: seed(lives[id][0]),
                slot_b: seed(lives[id][1]),
            });
        }

        let mut routes: HashMap<MatchKey, Routes> = HashMap::new();
        for &id in &order {
            let target = keys[&id];
            for (live, side) in lives[id].iter().zip([Side::A, Side::B]) {
                let slot = SlotRef { key: target, side };
                match live {
                    Some(Live::WinnerOf(src)) => routes.entry(keys[src]).or_default().winner = Some(slot),
                    Some(Live::LoserOf(src)) => routes.entry(keys[src]).or_default().loser = Some(slot),
                    _ => {}
                }
            }
        }

        let losers_rounds = raw_rounds
            .get(&Some(BracketKind::Losers))
            .map_or(0, |set| set.len() as u32);

        if double {
            // Bracket reset: populated only by the finals logic
            matches.push(LayoutMatch {
                key: MatchKey::new(Some(BracketKind::Finals), rounds + 2, 2),
                slot_a: None,
                slot_b: None,
            });
        }

        Ok(Self {
            format,
            entrants,
            winners_rounds: rounds,
            losers_rounds,
            matches,
            routes,
        })
    }

    /// Recompute the layout a set of persisted matches was built from.
    ///
    /// The entrant count follows from the winners bracket alone: the last
    /// round number gives `R`, and round 1 holds `N - 2^(R-1)` real matches.
    pub fn from_matches(format: TournamentFormat, matches: &[Match]) -> BracketResult<Self> {
        let winners = match format {
            TournamentFormat::SingleElimination => None,
            TournamentFormat::DoubleElimination => Some(BracketKind::Winners),
            TournamentFormat::RoundRobin => {
                return Err(BracketError::UnsupportedFormat(format!(
                    "{format} has no elimination layout"
                )));
            }
        };
        let rounds = matches
            .iter()
            .filter(|m| m.bracket == winners)
            .map(|m| m.round)
            .max()
            .ok_or_else(|| BracketError::InvalidRecord("bracket has no matches".to_string()))?;
        let first_round = matches
            .iter()
            .filter(|m| m.bracket == winners && m.round == 1)
            .count();
        let entrants = first_round + (1usize << (rounds - 1));

        let layout = Self::new(format, entrants)?;
        if layout.winners_rounds != rounds || layout.matches.len() != matches.len() {
            return Err(BracketError::InvalidRecord(format!(
                "{} stored matches do not form a {format} bracket",
                matches.len()
            )));
        }
        Ok(layout)
    }

    pub fn format(&self) -> TournamentFormat {
        self.format
    }

    pub fn entrants(&self) -> usize {
        self.entrants
    }

    pub fn winners_rounds(&self) -> u32 {
        self.winners_rounds
    }

    pub fn losers_rounds(&self) -> u32 {
        self.losers_rounds
    }

    /// Match rows in creation order
    pub fn matches(&self) -> &[LayoutMatch] {
        &self.matches
    }

    pub fn routes(&self, key: &MatchKey) -> Routes {
        self.routes.get(key).copied().unwrap_or_default()
    }

    /// Bracket of the winners side (`None` for single elimination)
    pub fn winners_bracket(&self) -> Option<BracketKind> {
        match self.format {
            TournamentFormat::DoubleElimination => Some(BracketKind::Winners),
            _ => None,
        }
    }

    /// The match whose winner takes the tournament outright
    /// (grand finals match 1 for double elimination)
    pub fn final_key(&self) -> MatchKey {
        match self.format {
            TournamentFormat::DoubleElimination => {
                MatchKey::new(Some(BracketKind::Finals), self.winners_rounds + 1, 1)
            }
            _ => MatchKey::new(None, self.winners_rounds, 1),
        }
    }

    /// Grand finals match 2, double elimination only
    pub fn reset_key(&self) -> Option<MatchKey> {
        (self.format == TournamentFormat::DoubleElimination)
            .then(|| MatchKey::new(Some(BracketKind::Finals), self.winners_rounds + 2, 2))
    }

    /// Last losers-bracket match, whose loser takes third place
    pub fn losers_final_key(&self) -> Option<MatchKey> {
        (self.losers_rounds > 0)
            .then(|| MatchKey::new(Some(BracketKind::Losers), self.losers_rounds, 1))
    }
}

fn resolve(feed: Feed, kinds: &[NodeKind], lives: &[[Option<Live>; 2]]) -> Option<Live> {
    match feed {
        Feed::Entrant(idx) => Some(Live::Entrant(idx)),
        Feed::Empty => None,
        Feed::Winner(src) => match kinds[src] {
            NodeKind::Real => Some(Live::WinnerOf(src)),
            NodeKind::PassThrough => lives[src].iter().flatten().next().copied(),
            NodeKind::Void => None,
        },
        Feed::Loser(src) => match kinds[src] {
            NodeKind::Real => Some(Live::LoserOf(src)),
            _ => None,
        },
    }
}

/// Full power-of-two bracket before byes are resolved.
///
/// Winners round 1 position `p` pairs seed index `p-1` with `size-p`; the
/// partner is missing for the first `size-n` positions. Later rounds take the
/// winners of positions `2j-1` (slot A) and `2j` (slot B).
///
/// The losers bracket alternates: round 1 pairs the losers of winners round 1,
/// each even round receives the losers of the next winners round into slot B
/// against the previous losers winner in slot A, and each odd round after
/// that halves the field.
fn feed_graph(double: bool, n: usize, rounds: u32) -> Graph {
    let size = 1usize << rounds;
    let winners_kind = double.then_some(BracketKind::Winners);
    let mut graph = Graph::default();

    let mut winners: Vec<Vec<NodeId>> = Vec::with_capacity(rounds as usize);
    let first: Vec<NodeId> = (1..=size / 2)
        .map(|p| {
            let partner = size - p;
            let b = if partner < n { Feed::Entrant(partner) } else { Feed::Empty };
            graph.push(winners_kind, 1, p as u32, Feed::Entrant(p - 1), b)
        })
        .collect();
    winners.push(first);
    for round in 2..=rounds {
        let prev = &winners[winners.len() - 1];
        let current: Vec<NodeId> = prev
            .chunks(2)
            .enumerate()
            .map(|(idx, pair)| {
                graph.push(winners_kind, round, idx as u32 + 1, Feed::Winner(pair[0]), Feed::Winner(pair[1]))
            })
            .collect();
        winners.push(current);
    }

    if !double {
        return graph;
    }

    let winners_final = winners[winners.len() - 1][0];
    let losers_kind = Some(BracketKind::Losers);
    let mut losers_final = None;
    if rounds >= 2 {
        let mut raw = 1;
        let mut prev: Vec<NodeId> = winners[0]
            .chunks(2)
            .enumerate()
            .map(|(idx, pair)| {
                graph.push(losers_kind, raw, idx as u32 + 1, Feed::Loser(pair[0]), Feed::Loser(pair[1]))
            })
            .collect();

        for k in 1..rounds as usize {
            raw += 1;
            let dropping = &winners[k];
            let receive: Vec<NodeId> = prev
                .iter()
                .zip(dropping)
                .enumerate()
                .map(|(idx, (&survivor, &dropped))| {
                    graph.push(losers_kind, raw, idx as u32 + 1, Feed::Winner(survivor), Feed::Loser(dropped))
                })
                .collect();
            if k == rounds as usize - 1 {
                prev = receive;
                break;
            }
            raw += 1;
            prev = receive
                .chunks(2)
                .enumerate()
                .map(|(idx, pair)| {
                    graph.push(losers_kind, raw, idx as u32 + 1, Feed::Winner(pair[0]), Feed::Winner(pair[1]))
                })
                .collect();
        }
        losers_final = prev.first().copied();
    }

    let challenger = match losers_final {
        Some(node) => Feed::Winner(node),
        // Two entrants: the winners-final loser goes straight to the grand finals
        None => Feed::Loser(winners_final),
    };
    graph.push(
        Some(BracketKind::Finals),
        rounds + 1,
        1,
        Feed::Winner(winners_final),
        challenger,
    );
    graph
}
