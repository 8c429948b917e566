//! Registration ledger state machine.
//!
//! Decides register/cancel/check-in/check-out transitions for one session's
//! participant list. Operates on rows the caller loaded and returns effects
//! describing what to persist; the transactional service applies them and
//! commits. Keeping the decisions pure keeps the invariants testable
//! without a database:
//!
//! - one active (confirmed/waitlisted) row per (session, user)
//! - waitlist positions form a contiguous 1..N sequence in registration order
//! - confirmed count never exceeds the session capacity

use std::cmp::Ordering;

use thiserror::Error;
use uuid::Uuid;

use crate::models::registration::{RegistrationStatus, SessionRegistration};
use crate::models::session::Session;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("session is not open for registration")]
    SessionNotAccepting,

    #[error("already registered for this session")]
    AlreadyRegistered,

    #[error("active registration not found")]
    NotRegistered,

    #[error("confirmed registration not found")]
    NotConfirmed,

    #[error("checked-in registration not found")]
    NotCheckedIn,
}

/// Where a new registration lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Confirmed,
    Waitlisted { position: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterOutcome {
    pub placement: Placement,
    /// Prior inactive row for this user to overwrite instead of inserting,
    /// preserving the one-row-per-(session, user) constraint.
    pub reused_row: Option<Uuid>,
    /// The session's displayed status flips to full when the new
    /// registration is waitlisted.
    pub session_becomes_full: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub row_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOutcome {
    pub cancelled_row: Uuid,
    pub was_confirmed: bool,
    /// Lowest-positioned waitlisted row to confirm, if the cancellation
    /// freed a confirmed slot and the waitlist is non-empty. None means no
    /// promotion was needed, not that one failed.
    pub promotion: Option<Promotion>,
    /// (row id, new position) pairs that close the gap left behind,
    /// restoring the contiguous 1..N queue.
    pub renumbering: Vec<(Uuid, i32)>,
}

/// Waitlist order: position ascending, then earliest registration. Positions
/// are unique in practice so the time tie-break is moot.
fn waitlist_order(a: &SessionRegistration, b: &SessionRegistration) -> Ordering {
    match (a.waitlist_position, b.waitlist_position) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.registered_at.cmp(&b.registered_at))
}

/// Deterministic roster view: confirmed first, waitlist in queue order,
/// cancellations last.
pub fn roster_order(a: &SessionRegistration, b: &SessionRegistration) -> Ordering {
    a.status
        .roster_ordinal()
        .cmp(&b.status.roster_ordinal())
        .then_with(|| match (a.waitlist_position, b.waitlist_position) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(&y),
        })
        .then_with(|| a.registered_at.cmp(&b.registered_at))
}

/// Decides where a register call for `user_id` lands given the session and
/// its current registration rows.
pub fn place_registration(
    session: &Session,
    rows: &[SessionRegistration],
    user_id: Uuid,
) -> Result<RegisterOutcome, LedgerError> {
    if !session.status.is_accepting() {
        return Err(LedgerError::SessionNotAccepting);
    }

    let existing = rows.iter().find(|r| r.user_id == user_id);
    if existing.is_some_and(|r| r.status.is_active()) {
        return Err(LedgerError::AlreadyRegistered);
    }

    let confirmed_count = rows
        .iter()
        .filter(|r| r.status == RegistrationStatus::Confirmed)
        .count() as i32;

    let (placement, session_becomes_full) = if confirmed_count < session.max_participants {
        (Placement::Confirmed, false)
    } else {
        let max_position = rows
            .iter()
            .filter(|r| r.status == RegistrationStatus::Waitlisted)
            .filter_map(|r| r.waitlist_position)
            .max()
            .unwrap_or(0);
        (
            Placement::Waitlisted {
                position: max_position + 1,
            },
            true,
        )
    };

    Ok(RegisterOutcome {
        placement,
        reused_row: existing.map(|r| r.id),
        session_becomes_full,
    })
}

/// Decides the effects of cancelling `user_id`'s active registration:
/// which row to cancel, who to promote and how to renumber the queue.
pub fn cancel_registration(
    rows: &[SessionRegistration],
    user_id: Uuid,
) -> Result<CancelOutcome, LedgerError> {
    let target = rows
        .iter()
        .find(|r| r.user_id == user_id && r.status.is_active())
        .ok_or(LedgerError::NotRegistered)?;

    let was_confirmed = target.status == RegistrationStatus::Confirmed;

    let mut queue: Vec<&SessionRegistration> = rows
        .iter()
        .filter(|r| r.status == RegistrationStatus::Waitlisted && r.id != target.id)
        .collect();
    queue.sort_by(|a, b| waitlist_order(a, b));

    let promotion = if was_confirmed {
        let promoted = queue.first().map(|r| Promotion {
            row_id: r.id,
            user_id: r.user_id,
        });
        if promoted.is_some() {
            queue.remove(0);
        }
        promoted
    } else {
        None
    };

    // Renumber whatever queue remains so positions stay contiguous. Unlike
    // the promotion path this also covers cancelling a waitlisted row
    // mid-queue.
    let renumbering = queue
        .iter()
        .enumerate()
        .filter(|(idx, r)| r.waitlist_position != Some(*idx as i32 + 1))
        .map(|(idx, r)| (r.id, idx as i32 + 1))
        .collect();

    Ok(CancelOutcome {
        cancelled_row: target.id,
        was_confirmed,
        promotion,
        renumbering,
    })
}

/// Check-in is only valid from a confirmed registration; the row becomes
/// attended. Returns the row to stamp.
pub fn check_in(rows: &[SessionRegistration], user_id: Uuid) -> Result<Uuid, LedgerError> {
    rows.iter()
        .find(|r| r.user_id == user_id && r.status == RegistrationStatus::Confirmed)
        .map(|r| r.id)
        .ok_or(LedgerError::NotConfirmed)
}

/// Check-out stamps a timestamp on an attended row; the status does not
/// change back.
pub fn check_out(rows: &[SessionRegistration], user_id: Uuid) -> Result<Uuid, LedgerError> {
    rows.iter()
        .find(|r| r.user_id == user_id && r.status == RegistrationStatus::Attended)
        .map(|r| r.id)
        .ok_or(LedgerError::NotCheckedIn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::SessionStatus;
    use chrono::{Duration, Utc};

    /// In-memory session that applies ledger outcomes the way the
    /// transactional service would.
    struct TestSession {
        session: Session,
        rows: Vec<SessionRegistration>,
    }

    impl TestSession {
        fn new(capacity: i32) -> Self {
            let now = Utc::now();
            Self {
                session: Session {
                    id: Uuid::new_v4(),
                    title: "tuesday night doubles".to_string(),
                    description: None,
                    location: None,
                    start_time: now + Duration::hours(2),
                    end_time: None,
                    number_of_courts: 2,
                    max_participants: capacity,
                    status: SessionStatus::Open,
                    created_by: Uuid::new_v4(),
                    created_at: now,
                    updated_at: now,
                },
                rows: Vec::new(),
            }
        }

        fn register(&mut self, user_id: Uuid) -> Result<RegisterOutcome, LedgerError> {
            let outcome = place_registration(&self.session, &self.rows, user_id)?;
            let (status, position) = match outcome.placement {
                Placement::Confirmed => (RegistrationStatus::Confirmed, None),
                Placement::Waitlisted { position } => {
                    (RegistrationStatus::Waitlisted, Some(position))
                }
            };
            let now = Utc::now();
            match outcome.reused_row {
                Some(row_id) => {
                    let row = self
                        .rows
                        .iter_mut()
                        .find(|r| r.id == row_id)
                        .expect("reused row exists");
                    row.status = status;
                    row.waitlist_position = position;
                    row.checked_in_at = None;
                    row.checked_out_at = None;
                    row.registered_at = now;
                }
                None => self.rows.push(SessionRegistration {
                    id: Uuid::new_v4(),
                    session_id: self.session.id,
                    user_id,
                    status,
                    waitlist_position: position,
                    checked_in_at: None,
                    checked_out_at: None,
                    registered_at: now,
                }),
            }
            if outcome.session_becomes_full {
                self.session.status = SessionStatus::Full;
            }
            Ok(outcome)
        }

        fn cancel(&mut self, user_id: Uuid) -> Result<CancelOutcome, LedgerError> {
            let outcome = cancel_registration(&self.rows, user_id)?;
            for row in self.rows.iter_mut() {
                if row.id == outcome.cancelled_row {
                    row.status = RegistrationStatus::Cancelled;
                    row.waitlist_position = None;
                } else if outcome.promotion.as_ref().is_some_and(|p| p.row_id == row.id) {
                    row.status = RegistrationStatus::Confirmed;
                    row.waitlist_position = None;
                } else if let Some(&(_, pos)) =
                    outcome.renumbering.iter().find(|(id, _)| *id == row.id)
                {
                    row.waitlist_position = Some(pos);
                }
            }
            Ok(outcome)
        }

        fn confirmed_count(&self) -> usize {
            self.rows
                .iter()
                .filter(|r| r.status == RegistrationStatus::Confirmed)
                .count()
        }

        fn waitlist_positions(&self) -> Vec<i32> {
            let mut positions: Vec<i32> = self
                .rows
                .iter()
                .filter(|r| r.status == RegistrationStatus::Waitlisted)
                .filter_map(|r| r.waitlist_position)
                .collect();
            positions.sort();
            positions
        }

        fn assert_waitlist_contiguous(&self) {
            let positions = self.waitlist_positions();
            let expected: Vec<i32> = (1..=positions.len() as i32).collect();
            assert_eq!(positions, expected, "waitlist positions must be 1..N");
        }

        fn row(&self, user_id: Uuid) -> &SessionRegistration {
            self.rows
                .iter()
                .find(|r| r.user_id == user_id)
                .expect("row exists")
        }
    }

    #[test]
    fn test_register_confirms_until_capacity() {
        let mut s = TestSession::new(2);
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();

        assert_eq!(s.register(u1).unwrap().placement, Placement::Confirmed);
        assert_eq!(s.register(u2).unwrap().placement, Placement::Confirmed);
        assert_eq!(s.confirmed_count(), 2);
    }

    #[test]
    fn test_register_waitlists_beyond_capacity() {
        let mut s = TestSession::new(1);
        s.register(Uuid::new_v4()).unwrap();

        let outcome = s.register(Uuid::new_v4()).unwrap();
        assert_eq!(outcome.placement, Placement::Waitlisted { position: 1 });
        assert!(outcome.session_becomes_full);
        assert_eq!(s.session.status, SessionStatus::Full);

        let outcome = s.register(Uuid::new_v4()).unwrap();
        assert_eq!(outcome.placement, Placement::Waitlisted { position: 2 });
    }

    #[test]
    fn test_register_rejects_duplicates_and_closed_sessions() {
        let mut s = TestSession::new(4);
        let u1 = Uuid::new_v4();
        s.register(u1).unwrap();
        assert_eq!(s.register(u1).unwrap_err(), LedgerError::AlreadyRegistered);

        s.session.status = SessionStatus::Completed;
        let err = s.register(Uuid::new_v4()).unwrap_err();
        assert_eq!(err, LedgerError::SessionNotAccepting);
    }

    #[test]
    fn test_reregistration_reuses_cancelled_row() {
        let mut s = TestSession::new(4);
        let u1 = Uuid::new_v4();
        s.register(u1).unwrap();
        let row_id = s.row(u1).id;

        s.cancel(u1).unwrap();
        let outcome = s.register(u1).unwrap();

        assert_eq!(outcome.reused_row, Some(row_id));
        assert_eq!(s.rows.len(), 1);
        assert_eq!(s.row(u1).status, RegistrationStatus::Confirmed);
    }

    #[test]
    fn test_cancel_without_registration_fails() {
        let mut s = TestSession::new(2);
        let err = s.cancel(Uuid::new_v4()).unwrap_err();
        assert_eq!(err, LedgerError::NotRegistered);
    }

    #[test]
    fn test_confirmed_cancel_promotes_head_of_waitlist() {
        let mut s = TestSession::new(2);
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let u3 = Uuid::new_v4();
        let u4 = Uuid::new_v4();
        s.register(u1).unwrap();
        s.register(u2).unwrap();
        s.register(u3).unwrap();
        s.register(u4).unwrap();
        assert_eq!(s.row(u3).waitlist_position, Some(1));
        assert_eq!(s.row(u4).waitlist_position, Some(2));

        let outcome = s.cancel(u1).unwrap();
        assert!(outcome.was_confirmed);
        assert_eq!(
            outcome.promotion.as_ref().map(|p| p.user_id),
            Some(u3),
            "position 1 must be promoted"
        );

        assert_eq!(s.row(u3).status, RegistrationStatus::Confirmed);
        assert_eq!(s.row(u3).waitlist_position, None);
        assert_eq!(s.row(u4).waitlist_position, Some(1));
        assert_eq!(s.confirmed_count(), 2);
        s.assert_waitlist_contiguous();
    }

    #[test]
    fn test_waitlisted_cancel_closes_the_gap() {
        let mut s = TestSession::new(1);
        let confirmed = Uuid::new_v4();
        let w1 = Uuid::new_v4();
        let w2 = Uuid::new_v4();
        let w3 = Uuid::new_v4();
        s.register(confirmed).unwrap();
        s.register(w1).unwrap();
        s.register(w2).unwrap();
        s.register(w3).unwrap();

        // Cancelling mid-queue must not leave a hole at position 2.
        let outcome = s.cancel(w2).unwrap();
        assert!(!outcome.was_confirmed);
        assert!(outcome.promotion.is_none());

        assert_eq!(s.row(w1).waitlist_position, Some(1));
        assert_eq!(s.row(w3).waitlist_position, Some(2));
        s.assert_waitlist_contiguous();
    }

    #[test]
    fn test_capacity_never_exceeded_across_churn() {
        let mut s = TestSession::new(2);
        let users: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
        for &u in &users {
            s.register(u).unwrap();
            assert!(s.confirmed_count() <= 2);
            s.assert_waitlist_contiguous();
        }
        for &u in &users[..4] {
            s.cancel(u).unwrap();
            assert!(s.confirmed_count() <= 2);
            s.assert_waitlist_contiguous();
        }
        assert_eq!(s.confirmed_count(), 2);
        assert!(s.waitlist_positions().is_empty());
    }

    #[test]
    fn test_full_lifecycle_capacity_two() {
        // capacity=2: U1, U2 confirmed; U3 waitlisted at 1; cancelling U1
        // promotes U3 and empties the waitlist.
        let mut s = TestSession::new(2);
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let u3 = Uuid::new_v4();

        assert_eq!(s.register(u1).unwrap().placement, Placement::Confirmed);
        assert_eq!(s.register(u2).unwrap().placement, Placement::Confirmed);
        assert_eq!(
            s.register(u3).unwrap().placement,
            Placement::Waitlisted { position: 1 }
        );

        let outcome = s.cancel(u1).unwrap();
        assert_eq!(outcome.promotion.map(|p| p.user_id), Some(u3));
        assert_eq!(s.row(u3).status, RegistrationStatus::Confirmed);
        assert_eq!(s.row(u3).waitlist_position, None);
        assert!(s.waitlist_positions().is_empty());
        assert_eq!(s.row(u1).status, RegistrationStatus::Cancelled);
    }

    #[test]
    fn test_check_in_requires_confirmed() {
        let mut s = TestSession::new(1);
        let confirmed = Uuid::new_v4();
        let waitlisted = Uuid::new_v4();
        s.register(confirmed).unwrap();
        s.register(waitlisted).unwrap();

        assert_eq!(
            check_in(&s.rows, waitlisted).unwrap_err(),
            LedgerError::NotConfirmed
        );

        let row_id = check_in(&s.rows, confirmed).unwrap();
        assert_eq!(row_id, s.row(confirmed).id);
    }

    #[test]
    fn test_check_out_requires_attended() {
        let mut s = TestSession::new(2);
        let u1 = Uuid::new_v4();
        s.register(u1).unwrap();

        assert_eq!(
            check_out(&s.rows, u1).unwrap_err(),
            LedgerError::NotCheckedIn
        );

        let row_id = check_in(&s.rows, u1).unwrap();
        let row = s.rows.iter_mut().find(|r| r.id == row_id).unwrap();
        row.status = RegistrationStatus::Attended;
        row.checked_in_at = Some(Utc::now());

        assert_eq!(check_out(&s.rows, u1).unwrap(), row_id);
    }

    #[test]
    fn test_roster_order_groups_by_status_then_queue() {
        let mut s = TestSession::new(1);
        let confirmed = Uuid::new_v4();
        let w1 = Uuid::new_v4();
        let w2 = Uuid::new_v4();
        let gone = Uuid::new_v4();
        s.register(confirmed).unwrap();
        s.register(gone).unwrap();
        s.register(w1).unwrap();
        s.register(w2).unwrap();
        s.cancel(gone).unwrap();

        let mut roster = s.rows.clone();
        roster.sort_by(roster_order);

        let order: Vec<Uuid> = roster.iter().map(|r| r.user_id).collect();
        assert_eq!(order, vec![confirmed, w1, w2, gone]);
    }
}
