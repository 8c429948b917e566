use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::models::match_model::{
    CompleteMatchRequest, CreateMatchRequest, Match, MatchStatus, UpdateScoreRequest,
};
use crate::models::registration::RegistrationStatus;
use crate::models::session::Session;
use crate::models::user::User;
use crate::notifier::{SessionEvent, SessionHub};
use crate::service::matchmaking::{
    self, CandidatePlayer, PartnerHistory, TeamPairing,
};

const RATING_GAIN_WIN: f64 = 5.0;
const RATING_LOSS_DEFEAT: f64 = 3.0;
const RATING_FLOOR: f64 = 100.0;

/// Match CRUD plus the auto-matchmaking entry point. Builds the candidate
/// pool and partner history snapshots the pure engine consumes.
pub struct MatchService {
    db_pool: DbPool,
    hub: Arc<SessionHub>,
}

impl MatchService {
    pub fn new(db_pool: DbPool, hub: Arc<SessionHub>) -> Self {
        Self { db_pool, hub }
    }

    /// Creates a match for the session. With explicit teams the players are
    /// validated against the session roster; with no players given, four
    /// are chosen by the fair matchmaking engine.
    pub async fn create_match(
        &self,
        session_id: Uuid,
        request: Option<CreateMatchRequest>,
    ) -> Result<Match, ApiError> {
        self.get_session(session_id).await?;

        let registered = self.registered_player_ids(session_id).await?;

        let request = match request {
            Some(req) if req.has_players() => {
                req.validate()?;
                req
            }
            _ => self.build_auto_match(session_id, &registered).await?,
        };

        let team_a_player1 = request
            .team_a_player1
            .ok_or_else(|| ApiError::bad_request("team_a_player1 is required"))?;
        let team_b_player1 = request
            .team_b_player1
            .ok_or_else(|| ApiError::bad_request("team_b_player1 is required"))?;

        let mut players = vec![team_a_player1, team_b_player1];
        players.extend(request.team_a_player2);
        players.extend(request.team_b_player2);

        let mut deduped = players.clone();
        deduped.sort();
        deduped.dedup();
        if deduped.len() != players.len() {
            return Err(ApiError::bad_request("Players in a match must be unique"));
        }

        if !players.iter().all(|id| registered.contains(id)) {
            return Err(ApiError::bad_request(
                "All players must be registered in this session",
            ));
        }

        let court_number = match request.court_number {
            Some(court) => court,
            None => self.next_court_number(session_id).await?,
        };

        let match_id = Uuid::new_v4();
        let row = sqlx::query_as::<_, Match>(
            r#"
            INSERT INTO matches
                (id, session_id, court_number,
                 team_a_player1, team_a_player2, team_b_player1, team_b_player2, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(match_id)
        .bind(session_id)
        .bind(court_number)
        .bind(team_a_player1)
        .bind(request.team_a_player2)
        .bind(team_b_player1)
        .bind(request.team_b_player2)
        .bind(MatchStatus::Scheduled)
        .fetch_one(&self.db_pool)
        .await?;

        info!(
            match_id = %match_id,
            session_id = %session_id,
            court_number = court_number,
            "Match created"
        );

        Ok(row)
    }

    pub async fn get_match(&self, match_id: Uuid) -> Result<Match, ApiError> {
        sqlx::query_as::<_, Match>("SELECT * FROM matches WHERE id = $1")
            .bind(match_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Match not found"))
    }

    pub async fn list_matches(&self, session_id: Uuid) -> Result<Vec<Match>, ApiError> {
        self.get_session(session_id).await?;

        let rows = sqlx::query_as::<_, Match>(
            "SELECT * FROM matches WHERE session_id = $1 ORDER BY created_at DESC",
        )
        .bind(session_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows)
    }

    pub async fn start_match(&self, match_id: Uuid) -> Result<Match, ApiError> {
        let existing = self.get_match(match_id).await?;
        if existing.status == MatchStatus::Completed {
            return Err(ApiError::bad_request("Completed match cannot be started"));
        }

        let started_at = existing.started_at.unwrap_or_else(Utc::now);
        let row = sqlx::query_as::<_, Match>(
            "UPDATE matches SET status = $1, started_at = $2 WHERE id = $3 RETURNING *",
        )
        .bind(MatchStatus::Ongoing)
        .bind(started_at)
        .bind(match_id)
        .fetch_one(&self.db_pool)
        .await?;

        info!(match_id = %match_id, "Match started");

        self.hub.publish(
            row.session_id,
            SessionEvent::MatchStarted {
                session_id: row.session_id,
                match_id,
                started_at,
            },
        );

        Ok(row)
    }

    pub async fn update_score(
        &self,
        match_id: Uuid,
        request: UpdateScoreRequest,
    ) -> Result<Match, ApiError> {
        request.validate()?;

        let existing = self.get_match(match_id).await?;

        // Score updates on a scheduled match mean play has begun.
        let status = if existing.status == MatchStatus::Scheduled {
            MatchStatus::Ongoing
        } else {
            existing.status
        };

        let row = sqlx::query_as::<_, Match>(
            "UPDATE matches SET score = $1, winner_team = $2, status = $3 WHERE id = $4 RETURNING *",
        )
        .bind(&request.score)
        .bind(&request.winner_team)
        .bind(status)
        .bind(match_id)
        .fetch_one(&self.db_pool)
        .await?;

        self.hub.publish(
            row.session_id,
            SessionEvent::ScoreUpdated {
                session_id: row.session_id,
                match_id,
                score: row.score.clone(),
                winner_team: row.winner_team.clone(),
            },
        );

        Ok(row)
    }

    /// Completes the match and applies the rating adjustments: winners gain
    /// 5 points and a win, losers drop 3 points floored at 100.
    pub async fn complete_match(
        &self,
        match_id: Uuid,
        request: CompleteMatchRequest,
    ) -> Result<Match, ApiError> {
        if request.winner_team != "A" && request.winner_team != "B" {
            return Err(ApiError::bad_request("winner_team must be 'A' or 'B'"));
        }

        let existing = self.get_match(match_id).await?;
        if existing.status == MatchStatus::Completed {
            return Err(ApiError::bad_request("Match already completed"));
        }

        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;

        let row = sqlx::query_as::<_, Match>(
            r#"
            UPDATE matches
            SET status = $1,
                winner_team = $2,
                started_at = COALESCE(started_at, $3),
                completed_at = $3
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(MatchStatus::Completed)
        .bind(&request.winner_team)
        .bind(now)
        .bind(match_id)
        .fetch_one(&mut *tx)
        .await?;

        let (winner_ids, loser_ids) = if request.winner_team == "A" {
            (row.team_a_ids(), row.team_b_ids())
        } else {
            (row.team_b_ids(), row.team_a_ids())
        };

        sqlx::query(
            r#"
            UPDATE users
            SET rating = rating + $1,
                wins = wins + 1,
                total_matches = total_matches + 1
            WHERE id = ANY($2)
            "#,
        )
        .bind(RATING_GAIN_WIN)
        .bind(&winner_ids)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE users
            SET rating = GREATEST($1, rating - $2),
                losses = losses + 1,
                total_matches = total_matches + 1
            WHERE id = ANY($3)
            "#,
        )
        .bind(RATING_FLOOR)
        .bind(RATING_LOSS_DEFEAT)
        .bind(&loser_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            match_id = %match_id,
            winner_team = %request.winner_team,
            "Match completed"
        );

        Ok(row)
    }

    // -------------------------------------------------------------------
    // Auto-matchmaking support
    // -------------------------------------------------------------------

    /// Builds the fairness snapshot for the session and asks the engine for
    /// a balanced pairing.
    async fn build_auto_match(
        &self,
        session_id: Uuid,
        registered: &[Uuid],
    ) -> Result<CreateMatchRequest, ApiError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(registered)
            .fetch_all(&self.db_pool)
            .await?;

        let matches = sqlx::query_as::<_, Match>("SELECT * FROM matches WHERE session_id = $1")
            .bind(session_id)
            .fetch_all(&self.db_pool)
            .await?;

        let mut match_counts: HashMap<Uuid, u32> = HashMap::new();
        let mut last_played: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
        for m in &matches {
            let played_at = m.completed_at.or(m.started_at).unwrap_or(m.created_at);
            for uid in m.player_ids() {
                *match_counts.entry(uid).or_insert(0) += 1;
                let entry = last_played.entry(uid).or_insert(played_at);
                if played_at > *entry {
                    *entry = played_at;
                }
            }
        }

        let candidates: Vec<CandidatePlayer> = users
            .iter()
            .map(|u| CandidatePlayer {
                user_id: u.id,
                rating: u.rating,
                matches_played: match_counts.get(&u.id).copied().unwrap_or(0),
                last_played_at: last_played.get(&u.id).copied(),
            })
            .collect();

        let partner_history = partner_history_from_matches(&matches);

        let pairing: TeamPairing =
            matchmaking::generate_fair_doubles_match(&candidates, &partner_history, Utc::now())?;

        info!(
            session_id = %session_id,
            balance_gap = pairing.balance_gap,
            "Auto-matchmaking produced a pairing"
        );

        Ok(CreateMatchRequest {
            court_number: None,
            team_a_player1: Some(pairing.team_a.0),
            team_a_player2: Some(pairing.team_a.1),
            team_b_player1: Some(pairing.team_b.0),
            team_b_player2: Some(pairing.team_b.1),
        })
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Session, ApiError> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Session not found"))
    }

    /// Players eligible for matches: confirmed or checked in.
    async fn registered_player_ids(&self, session_id: Uuid) -> Result<Vec<Uuid>, ApiError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM session_registrations WHERE session_id = $1 AND status = ANY($2)",
        )
        .bind(session_id)
        .bind(vec![
            RegistrationStatus::Confirmed,
            RegistrationStatus::Attended,
        ])
        .fetch_all(&self.db_pool)
        .await?;

        Ok(ids)
    }

    async fn next_court_number(&self, session_id: Uuid) -> Result<i32, ApiError> {
        let max_court = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(court_number) FROM matches WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(max_court.unwrap_or(0) + 1)
    }
}

/// Counts prior partnerships per sorted player pair across the session's
/// recorded matches.
pub fn partner_history_from_matches(matches: &[Match]) -> PartnerHistory {
    let mut history = PartnerHistory::new();
    for m in matches {
        if let Some(partner) = m.team_a_player2 {
            *history
                .entry(matchmaking::pair_key(m.team_a_player1, partner))
                .or_insert(0) += 1;
        }
        if let Some(partner) = m.team_b_player2 {
            *history
                .entry(matchmaking::pair_key(m.team_b_player1, partner))
                .or_insert(0) += 1;
        }
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubles_match(a1: Uuid, a2: Uuid, b1: Uuid, b2: Uuid) -> Match {
        let now = Utc::now();
        Match {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            court_number: 1,
            team_a_player1: a1,
            team_a_player2: Some(a2),
            team_b_player1: b1,
            team_b_player2: Some(b2),
            team_a_score: None,
            team_b_score: None,
            score: None,
            winner_team: None,
            status: MatchStatus::Completed,
            started_at: Some(now),
            completed_at: Some(now),
            created_at: now,
        }
    }

    #[test]
    fn test_partner_history_counts_both_teams() {
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let matches = vec![doubles_match(a, b, c, d), doubles_match(a, b, d, c)];

        let history = partner_history_from_matches(&matches);

        assert_eq!(history.get(&matchmaking::pair_key(a, b)), Some(&2));
        assert_eq!(history.get(&matchmaking::pair_key(c, d)), Some(&2));
        assert_eq!(history.get(&matchmaking::pair_key(a, c)), None);
    }

    #[test]
    fn test_partner_history_skips_singles() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut m = doubles_match(a, Uuid::new_v4(), b, Uuid::new_v4());
        m.team_a_player2 = None;
        m.team_b_player2 = None;

        let history = partner_history_from_matches(&[m]);
        assert!(history.is_empty());
    }
}
