use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::models::session::{CreateSessionRequest, Session, SessionStatus};

pub struct SessionService {
    db_pool: DbPool,
}

impl SessionService {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }

    pub async fn create_session(&self, request: CreateSessionRequest) -> Result<Session, ApiError> {
        request.validate()?;

        let session_id = Uuid::new_v4();
        let now = Utc::now();

        let row = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions
                (id, title, description, location, start_time, end_time,
                 number_of_courts, max_participants, status, created_by,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.location)
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(request.number_of_courts.unwrap_or(1))
        .bind(request.max_participants.unwrap_or(20))
        .bind(SessionStatus::Open)
        .bind(request.created_by)
        .bind(now)
        .fetch_one(&self.db_pool)
        .await?;

        info!(session_id = %session_id, title = %request.title, "Session created");

        Ok(row)
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<Session, ApiError> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Session not found"))
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        let rows =
            sqlx::query_as::<_, Session>("SELECT * FROM sessions ORDER BY start_time DESC")
                .fetch_all(&self.db_pool)
                .await?;
        Ok(rows)
    }

    pub async fn update_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
    ) -> Result<Session, ApiError> {
        let row = sqlx::query_as::<_, Session>(
            "UPDATE sessions SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(session_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

        info!(session_id = %session_id, status = %status, "Session status updated");

        Ok(row)
    }
}
