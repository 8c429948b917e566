use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub rating: f64,
    pub total_matches: i32,
    pub wins: i32,
    pub losses: i32,
    pub created_at: DateTime<Utc>,
}

/// Trimmed player view embedded in match/roster responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: Uuid,
    pub display_name: String,
    pub rating: f64,
}

impl From<&User> for PlayerSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
            rating: user.rating,
        }
    }
}
