use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::models::registration::{
    CancelResponse, CheckInResponse, CheckOutResponse, RegisterResponse, RegistrationStatus,
    RosterEntry, SessionRegistration,
};
use crate::models::session::{Session, SessionStatus};
use crate::models::user::{PlayerSummary, User};
use crate::notifier::{RegistrationAction, SessionEvent, SessionHub};
use crate::service::registration_ledger::{self, Placement};

/// Transactional glue around the registration ledger.
///
/// Every operation runs inside one transaction. Register and cancel lock
/// the session row first (`SELECT ... FOR UPDATE`) so concurrent requests
/// for the same session serialize; without that, racing capacity checks or
/// promotions could break the contiguous-waitlist and capacity invariants.
pub struct RegistrationService {
    db_pool: DbPool,
    hub: Arc<SessionHub>,
}

impl RegistrationService {
    pub fn new(db_pool: DbPool, hub: Arc<SessionHub>) -> Self {
        Self { db_pool, hub }
    }

    pub async fn register(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<RegisterResponse, ApiError> {
        let mut tx = self.db_pool.begin().await?;

        let session =
            sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1 FOR UPDATE")
                .bind(session_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| ApiError::not_found("Session not found"))?;

        let rows = sqlx::query_as::<_, SessionRegistration>(
            "SELECT * FROM session_registrations WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_all(&mut *tx)
        .await?;

        let outcome = registration_ledger::place_registration(&session, &rows, user_id)?;

        let (status, waitlist_position) = match outcome.placement {
            Placement::Confirmed => (RegistrationStatus::Confirmed, None),
            Placement::Waitlisted { position } => (RegistrationStatus::Waitlisted, Some(position)),
        };
        let now = Utc::now();

        match outcome.reused_row {
            Some(row_id) => {
                sqlx::query(
                    r#"
                    UPDATE session_registrations
                    SET status = $1,
                        waitlist_position = $2,
                        checked_in_at = NULL,
                        checked_out_at = NULL,
                        registered_at = $3
                    WHERE id = $4
                    "#,
                )
                .bind(status)
                .bind(waitlist_position)
                .bind(now)
                .bind(row_id)
                .execute(&mut *tx)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO session_registrations
                        (id, session_id, user_id, status, waitlist_position, registered_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(session_id)
                .bind(user_id)
                .bind(status)
                .bind(waitlist_position)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
        }

        if outcome.session_becomes_full {
            sqlx::query("UPDATE sessions SET status = $1, updated_at = $2 WHERE id = $3")
                .bind(SessionStatus::Full)
                .bind(now)
                .bind(session_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(
            session_id = %session_id,
            user_id = %user_id,
            status = %status,
            waitlist_position = ?waitlist_position,
            "Registration recorded"
        );

        self.hub.publish(
            session_id,
            SessionEvent::RegistrationUpdated {
                session_id,
                user_id,
                action: RegistrationAction::Registered,
                status,
                waitlist_position,
                promoted_user_id: None,
            },
        );

        Ok(RegisterResponse {
            status,
            waitlist_position,
        })
    }

    pub async fn cancel(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<CancelResponse, ApiError> {
        let mut tx = self.db_pool.begin().await?;

        // Lock the session row so the promote-then-renumber sequence cannot
        // interleave with a concurrent register on the same session.
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1 FOR UPDATE")
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("Session not found"))?;

        let rows = sqlx::query_as::<_, SessionRegistration>(
            "SELECT * FROM session_registrations WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_all(&mut *tx)
        .await?;

        let outcome = registration_ledger::cancel_registration(&rows, user_id)?;

        sqlx::query(
            "UPDATE session_registrations SET status = $1, waitlist_position = NULL WHERE id = $2",
        )
        .bind(RegistrationStatus::Cancelled)
        .bind(outcome.cancelled_row)
        .execute(&mut *tx)
        .await?;

        if let Some(promotion) = &outcome.promotion {
            sqlx::query(
                "UPDATE session_registrations SET status = $1, waitlist_position = NULL WHERE id = $2",
            )
            .bind(RegistrationStatus::Confirmed)
            .bind(promotion.row_id)
            .execute(&mut *tx)
            .await?;
        }

        for (row_id, position) in &outcome.renumbering {
            sqlx::query("UPDATE session_registrations SET waitlist_position = $1 WHERE id = $2")
                .bind(position)
                .bind(row_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        let promoted_user_id = outcome.promotion.map(|p| p.user_id);

        info!(
            session_id = %session_id,
            user_id = %user_id,
            promoted_user_id = ?promoted_user_id,
            "Registration cancelled"
        );

        self.hub.publish(
            session_id,
            SessionEvent::RegistrationUpdated {
                session_id,
                user_id,
                action: RegistrationAction::Cancelled,
                status: RegistrationStatus::Cancelled,
                waitlist_position: None,
                promoted_user_id,
            },
        );

        Ok(CancelResponse { promoted_user_id })
    }

    pub async fn check_in(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<CheckInResponse, ApiError> {
        let mut tx = self.db_pool.begin().await?;

        let rows = sqlx::query_as::<_, SessionRegistration>(
            "SELECT * FROM session_registrations WHERE session_id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        let row_id = registration_ledger::check_in(&rows, user_id)?;
        let now = Utc::now();

        sqlx::query(
            "UPDATE session_registrations SET status = $1, checked_in_at = $2 WHERE id = $3",
        )
        .bind(RegistrationStatus::Attended)
        .bind(now)
        .bind(row_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(session_id = %session_id, user_id = %user_id, "Player checked in");

        Ok(CheckInResponse { checked_in_at: now })
    }

    pub async fn check_out(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<CheckOutResponse, ApiError> {
        let mut tx = self.db_pool.begin().await?;

        let rows = sqlx::query_as::<_, SessionRegistration>(
            "SELECT * FROM session_registrations WHERE session_id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        let row_id = registration_ledger::check_out(&rows, user_id)?;
        let now = Utc::now();

        sqlx::query("UPDATE session_registrations SET checked_out_at = $1 WHERE id = $2")
            .bind(now)
            .bind(row_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(session_id = %session_id, user_id = %user_id, "Player checked out");

        Ok(CheckOutResponse {
            checked_out_at: now,
        })
    }

    /// Roster for a session, ordered confirmed first, waitlist in queue
    /// order, cancellations last. Each line carries a trimmed player view.
    pub async fn list_registrations(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<RosterEntry>, ApiError> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Session not found"))?;

        let mut rows = sqlx::query_as::<_, SessionRegistration>(
            "SELECT * FROM session_registrations WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.sort_by(registration_ledger::roster_order);

        let user_ids: Vec<Uuid> = rows.iter().map(|r| r.user_id).collect();
        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(&user_ids)
            .fetch_all(&self.db_pool)
            .await?;
        let users_by_id: HashMap<Uuid, User> =
            users.into_iter().map(|u| (u.id, u)).collect();

        let roster = rows
            .into_iter()
            .filter_map(|row| {
                users_by_id.get(&row.user_id).map(|user| RosterEntry {
                    id: row.id,
                    user: PlayerSummary::from(user),
                    status: row.status,
                    waitlist_position: row.waitlist_position,
                    checked_in_at: row.checked_in_at,
                    checked_out_at: row.checked_out_at,
                    registered_at: row.registered_at,
                })
            })
            .collect();
        Ok(roster)
    }
}
