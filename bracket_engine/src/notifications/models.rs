//! Notification payloads.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::bracket::{EntrantId, Match};
use crate::ledger::place_label;
use crate::tournament::TournamentInfo;

/// What a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TournamentStarted,
    MatchScheduled,
    MatchResult,
    MatchReminder,
    MatchRescheduled,
    TournamentCompleted,
    PrizeAwarded,
}

impl NotificationKind {
    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::TournamentStarted => "Tournament Started",
            NotificationKind::MatchScheduled => "Match Scheduled",
            NotificationKind::MatchResult => "Match Result",
            NotificationKind::MatchReminder => "Match Reminder",
            NotificationKind::MatchRescheduled => "Match Rescheduled",
            NotificationKind::TournamentCompleted => "Tournament Completed",
            NotificationKind::PrizeAwarded => "Prize Awarded",
        }
    }

    /// Stored `type` column: tournament-wide or match-level
    pub fn category(&self) -> &'static str {
        match self {
            NotificationKind::TournamentStarted
            | NotificationKind::TournamentCompleted
            | NotificationKind::PrizeAwarded => "tournament",
            _ => "match",
        }
    }

    /// `action` value in the data payload
    pub fn action(&self) -> &'static str {
        match self {
            NotificationKind::TournamentStarted => "started",
            NotificationKind::MatchScheduled => "scheduled",
            NotificationKind::MatchResult => "result",
            NotificationKind::MatchReminder => "reminder",
            NotificationKind::MatchRescheduled => "rescheduled",
            NotificationKind::TournamentCompleted => "completed",
            NotificationKind::PrizeAwarded => "prize_awarded",
        }
    }
}

/// A message for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: EntrantId,
    pub kind: NotificationKind,
    pub message: String,
    pub data: serde_json::Value,
}

impl Notification {
    fn new(user_id: EntrantId, kind: NotificationKind, message: String, data: serde_json::Value) -> Self {
        let mut data = data;
        data["action"] = json!(kind.action());
        Self {
            user_id,
            kind,
            message,
            data,
        }
    }

    pub fn title(&self) -> &'static str {
        self.kind.title()
    }

    pub fn tournament_started(user_id: EntrantId, tournament: &TournamentInfo) -> Self {
        Self::new(
            user_id,
            NotificationKind::TournamentStarted,
            format!(
                "The tournament {} has started. Check your matches!",
                tournament.name
            ),
            json!({ "tournament_id": tournament.id }),
        )
    }

    /// One notification per known participant of `m`
    pub fn match_scheduled(tournament: &TournamentInfo, m: &Match) -> Vec<Self> {
        let when = m.scheduled_at.format("%Y-%m-%d %H:%M");
        per_player(m, NotificationKind::MatchScheduled, |_| {
            format!(
                "Your match in {} has been scheduled for {when}",
                tournament.name
            )
        })
    }

    pub fn match_reminder(tournament: &TournamentInfo, m: &Match) -> Vec<Self> {
        let when = m.scheduled_at.format("%H:%M");
        per_player(m, NotificationKind::MatchReminder, |_| {
            format!(
                "Reminder: Your match in {} is scheduled for tomorrow at {when}",
                tournament.name
            )
        })
    }

    pub fn match_rescheduled(tournament: &TournamentInfo, m: &Match) -> Vec<Self> {
        let when = m.scheduled_at.format("%Y-%m-%d %H:%M");
        per_player(m, NotificationKind::MatchRescheduled, |_| {
            format!(
                "Your match in {} has been rescheduled to {when}",
                tournament.name
            )
        })
    }

    /// Result notices; draws produce none
    pub fn match_result(tournament: &TournamentInfo, m: &Match) -> Vec<Self> {
        let Some(winner) = m.winner else {
            return Vec::new();
        };
        per_player(m, NotificationKind::MatchResult, |player| {
            if player == winner {
                format!("Congratulations! You won your match in {}!", tournament.name)
            } else {
                format!(
                    "You lost your match in {}. Better luck next time!",
                    tournament.name
                )
            }
        })
        .into_iter()
        .map(|mut n| {
            n.data["is_winner"] = json!(n.user_id == winner);
            n
        })
        .collect()
    }

    pub fn tournament_completed(
        user_id: EntrantId,
        tournament: &TournamentInfo,
        winner: EntrantId,
    ) -> Self {
        let is_winner = user_id == winner;
        let message = if is_winner {
            format!("Congratulations! You are the champion of {}!", tournament.name)
        } else {
            format!(
                "The tournament {} has concluded. Thank you for participating!",
                tournament.name
            )
        };
        Self::new(
            user_id,
            NotificationKind::TournamentCompleted,
            message,
            json!({ "tournament_id": tournament.id, "is_winner": is_winner }),
        )
    }

    pub fn prize_awarded(
        user_id: EntrantId,
        tournament: &TournamentInfo,
        amount: Decimal,
        place: u32,
    ) -> Self {
        Self::new(
            user_id,
            NotificationKind::PrizeAwarded,
            format!(
                "You have been awarded ${} for {} place in {}!",
                amount.round_dp(2),
                place_label(place),
                tournament.name
            ),
            json!({
                "tournament_id": tournament.id,
                "amount": amount.to_string(),
                "position": place_label(place),
            }),
        )
    }
}

fn per_player(
    m: &Match,
    kind: NotificationKind,
    message: impl Fn(EntrantId) -> String,
) -> Vec<Notification> {
    m.occupants()
        .map(|player| {
            Notification::new(
                player,
                kind,
                message(player),
                json!({ "tournament_id": m.tournament_id, "match_id": m.id }),
            )
        })
        .collect()
}
