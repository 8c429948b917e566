use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Draft,
    Upcoming,
    Open,
    Full,
    Ongoing,
    Completed,
    Cancelled,
}

impl SessionStatus {
    /// Registrations are accepted while the session is open or full
    /// (full sessions still take waitlist entries).
    pub fn is_accepting(&self) -> bool {
        matches!(self, SessionStatus::Open | SessionStatus::Full)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Draft => write!(f, "draft"),
            SessionStatus::Upcoming => write!(f, "upcoming"),
            SessionStatus::Open => write!(f, "open"),
            SessionStatus::Full => write!(f, "full"),
            SessionStatus::Ongoing => write!(f, "ongoing"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub number_of_courts: i32,
    pub max_participants: i32,
    pub status: SessionStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 50))]
    pub number_of_courts: Option<i32>,
    #[validate(range(min = 2, max = 200))]
    pub max_participants: Option<i32>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSessionStatusRequest {
    pub status: SessionStatus,
}
