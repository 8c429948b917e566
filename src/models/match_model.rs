use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "match_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    Ongoing,
    Completed,
    Cancelled,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Scheduled => write!(f, "scheduled"),
            MatchStatus::Ongoing => write!(f, "ongoing"),
            MatchStatus::Completed => write!(f, "completed"),
            MatchStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Match {
    pub id: Uuid,
    pub session_id: Uuid,
    pub court_number: i32,
    pub team_a_player1: Uuid,
    pub team_a_player2: Option<Uuid>,
    pub team_b_player1: Uuid,
    pub team_b_player2: Option<Uuid>,
    pub team_a_score: Option<i32>,
    pub team_b_score: Option<i32>,
    pub score: Option<String>,
    pub winner_team: Option<String>,
    pub status: MatchStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Match {
    /// All player ids on this match, singles or doubles.
    pub fn player_ids(&self) -> Vec<Uuid> {
        let mut ids = vec![self.team_a_player1, self.team_b_player1];
        if let Some(id) = self.team_a_player2 {
            ids.push(id);
        }
        if let Some(id) = self.team_b_player2 {
            ids.push(id);
        }
        ids
    }

    pub fn team_a_ids(&self) -> Vec<Uuid> {
        let mut ids = vec![self.team_a_player1];
        if let Some(id) = self.team_a_player2 {
            ids.push(id);
        }
        ids
    }

    pub fn team_b_ids(&self) -> Vec<Uuid> {
        let mut ids = vec![self.team_b_player1];
        if let Some(id) = self.team_b_player2 {
            ids.push(id);
        }
        ids
    }
}

/// Manual match creation. When the team fields are absent the service runs
/// fair auto-matchmaking over the session's registered players instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateMatchRequest {
    #[validate(range(min = 1, max = 64))]
    pub court_number: Option<i32>,
    pub team_a_player1: Option<Uuid>,
    pub team_a_player2: Option<Uuid>,
    pub team_b_player1: Option<Uuid>,
    pub team_b_player2: Option<Uuid>,
}

impl CreateMatchRequest {
    pub fn has_players(&self) -> bool {
        self.team_a_player1.is_some() || self.team_b_player1.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateScoreRequest {
    #[validate(length(min = 1, max = 64))]
    pub score: String,
    pub winner_team: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteMatchRequest {
    pub winner_team: String,
}
