use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "registration_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Confirmed,
    Waitlisted,
    Cancelled,
    Attended,
    NoShow,
}

impl RegistrationStatus {
    /// Confirmed and waitlisted rows count as an active registration;
    /// everything else can be overwritten by a new register call.
    pub fn is_active(&self) -> bool {
        matches!(self, RegistrationStatus::Confirmed | RegistrationStatus::Waitlisted)
    }

    /// Sort key for the roster view: confirmed first, waitlist in queue
    /// order, cancellations last.
    pub fn roster_ordinal(&self) -> u8 {
        match self {
            RegistrationStatus::Confirmed => 0,
            RegistrationStatus::Waitlisted => 1,
            RegistrationStatus::Attended => 2,
            RegistrationStatus::NoShow => 3,
            RegistrationStatus::Cancelled => 4,
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationStatus::Confirmed => write!(f, "confirmed"),
            RegistrationStatus::Waitlisted => write!(f, "waitlisted"),
            RegistrationStatus::Cancelled => write!(f, "cancelled"),
            RegistrationStatus::Attended => write!(f, "attended"),
            RegistrationStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRegistration {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub status: RegistrationStatus,
    pub waitlist_position: Option<i32>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}

/// Roster line for the registration listing: the registration row joined
/// with the player it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: Uuid,
    pub user: crate::models::user::PlayerSummary,
    pub status: RegistrationStatus,
    pub waitlist_position: Option<i32>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}

/// Identifies the acting user on register/cancel/check-in/check-out calls.
/// Token-based authentication is handled upstream of this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationActionRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub status: RegistrationStatus,
    pub waitlist_position: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub promoted_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInResponse {
    pub checked_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutResponse {
    pub checked_out_at: DateTime<Utc>,
}
