use std::collections::HashMap;
use std::sync::Mutex;

use actix::{Message, Recipient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::models::registration::RegistrationStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationAction {
    Registered,
    Cancelled,
}

/// Events published on a session's channel. One tagged variant per event
/// kind so subscribers never see untyped payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    RegistrationUpdated {
        session_id: Uuid,
        user_id: Uuid,
        action: RegistrationAction,
        status: RegistrationStatus,
        waitlist_position: Option<i32>,
        promoted_user_id: Option<Uuid>,
    },
    MatchStarted {
        session_id: Uuid,
        match_id: Uuid,
        started_at: DateTime<Utc>,
    },
    ScoreUpdated {
        session_id: Uuid,
        match_id: Uuid,
        score: Option<String>,
        winner_team: Option<String>,
    },
}

#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct SessionEventMessage(pub SessionEvent);

/// Registry of live WebSocket connections per session channel.
///
/// Delivery is fire-and-forget: publishers never wait for subscribers, and
/// a session with no subscribers drops the event on the floor.
#[derive(Default)]
pub struct SessionHub {
    subscribers: Mutex<HashMap<Uuid, Vec<(Uuid, Recipient<SessionEventMessage>)>>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Vec<(Uuid, Recipient<SessionEventMessage>)>>> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn subscribe(
        &self,
        session_id: Uuid,
        conn_id: Uuid,
        recipient: Recipient<SessionEventMessage>,
    ) {
        let mut map = self.lock();
        let subs = map.entry(session_id).or_default();
        if !subs.iter().any(|(id, _)| *id == conn_id) {
            subs.push((conn_id, recipient));
        }
    }

    pub fn unsubscribe(&self, session_id: Uuid, conn_id: Uuid) {
        let mut map = self.lock();
        if let Some(subs) = map.get_mut(&session_id) {
            subs.retain(|(id, _)| *id != conn_id);
            if subs.is_empty() {
                map.remove(&session_id);
            }
        }
    }

    /// Drops a connection from every channel it joined.
    pub fn disconnect(&self, conn_id: Uuid) {
        let mut map = self.lock();
        map.retain(|_, subs| {
            subs.retain(|(id, _)| *id != conn_id);
            !subs.is_empty()
        });
    }

    pub fn publish(&self, session_id: Uuid, event: SessionEvent) {
        let map = self.lock();
        if let Some(subs) = map.get(&session_id) {
            debug!(
                session_id = %session_id,
                subscribers = subs.len(),
                "Publishing session event"
            );
            for (_, recipient) in subs {
                recipient.do_send(SessionEventMessage(event.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_event_serialization() {
        let event = SessionEvent::RegistrationUpdated {
            session_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            action: RegistrationAction::Registered,
            status: RegistrationStatus::Waitlisted,
            waitlist_position: Some(3),
            promoted_user_id: None,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("registration_updated"));
        assert!(json.contains("waitlisted"));

        let decoded: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_score_event_serialization() {
        let event = SessionEvent::ScoreUpdated {
            session_id: Uuid::new_v4(),
            match_id: Uuid::new_v4(),
            score: Some("21-15".to_string()),
            winner_team: Some("A".to_string()),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("score_updated"));
        assert!(json.contains("21-15"));
    }

    #[test]
    fn test_match_started_event_serialization() {
        let event = SessionEvent::MatchStarted {
            session_id: Uuid::new_v4(),
            match_id: Uuid::new_v4(),
            started_at: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("match_started"));
    }
}
