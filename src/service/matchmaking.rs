//! Fair doubles matchmaking.
//!
//! Pure functions over caller-supplied player stats: no I/O, no shared
//! state, safe to call from any number of request handlers at once. The
//! caller snapshots the candidate pool and partner history; a stale
//! snapshot yields a less fair pairing, never an unsafe one.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// A player eligible for selection, with fairness stats derived from the
/// session's match records.
#[derive(Debug, Clone)]
pub struct CandidatePlayer {
    pub user_id: Uuid,
    pub rating: f64,
    pub matches_played: u32,
    /// None means the player has not played yet and counts as maximally
    /// rested.
    pub last_played_at: Option<DateTime<Utc>>,
}

impl CandidatePlayer {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            rating: 1000.0,
            matches_played: 0,
            last_played_at: None,
        }
    }
}

/// Times each sorted pair of players has already partnered in this session.
pub type PartnerHistory = HashMap<(Uuid, Uuid), u32>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchmakingError {
    #[error("not enough players for matchmaking: need {needed}, got {got}")]
    InsufficientPlayers { needed: usize, got: usize },

    #[error("balanced doubles requires exactly 4 players, got {got}")]
    InvalidTeamSize { got: usize },
}

/// Winning split of four players into two doubles teams. Pairs are sorted
/// by id; together they partition exactly the selected four players.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamPairing {
    pub team_a: (Uuid, Uuid),
    pub team_b: (Uuid, Uuid),
    pub balance_gap: f64,
}

/// One repeated partnership outweighs any realistic rating gap.
pub const REPEAT_PARTNER_PENALTY: f64 = 200.0;

/// Rest credited to a player who has not played at all.
const NEVER_PLAYED_REST_MINUTES: f64 = 10_000.0;

/// Canonical order-independent key into a [`PartnerHistory`].
pub fn pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn minutes_since(last_played_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match last_played_at {
        None => NEVER_PLAYED_REST_MINUTES,
        Some(t) => ((now - t).num_seconds() as f64 / 60.0).max(0.0),
    }
}

/// Scales into [0, 1] against the pool's min/max; a degenerate pool where
/// every value is equal maps to a neutral 0.5.
fn normalize(value: f64, low: f64, high: f64) -> f64 {
    if high <= low {
        return 0.5;
    }
    (value - low) / (high - low)
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Ranks the pool by composite fairness priority and returns the top
/// `target_count` players.
///
/// Priority weighs fewer matches played (0.6), longer rest (0.3) and a
/// small anti-starvation boost for lower-rated players (0.1), each
/// component normalized against the pool. Ties keep the caller's input
/// order (the sort is stable); that order is not a semantic guarantee.
pub fn select_fair_players(
    pool: &[CandidatePlayer],
    target_count: usize,
    now: DateTime<Utc>,
) -> Result<Vec<CandidatePlayer>, MatchmakingError> {
    if pool.len() < target_count {
        return Err(MatchmakingError::InsufficientPlayers {
            needed: target_count,
            got: pool.len(),
        });
    }

    let rests: Vec<f64> = pool
        .iter()
        .map(|p| minutes_since(p.last_played_at, now))
        .collect();

    let (min_m, max_m) = min_max(pool.iter().map(|p| p.matches_played as f64));
    let (min_rest, max_rest) = min_max(rests.iter().copied());
    let (min_rt, max_rt) = min_max(pool.iter().map(|p| p.rating));

    let mut ranked: Vec<(f64, &CandidatePlayer)> = pool
        .iter()
        .zip(rests.iter())
        .map(|(p, &rest)| {
            let match_score = 1.0 - normalize(p.matches_played as f64, min_m, max_m);
            let rest_score = normalize(rest, min_rest, max_rest);
            let rating_score = 1.0 - normalize(p.rating, min_rt, max_rt);
            let priority = 0.6 * match_score + 0.3 * rest_score + 0.1 * rating_score;
            (priority, p)
        })
        .collect();

    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    Ok(ranked
        .into_iter()
        .take(target_count)
        .map(|(_, p)| p.clone())
        .collect())
}

/// Splits exactly four players into the two-vs-two pairing that minimizes
/// `repeated_partners * 200 + |rating_a - rating_b|`.
///
/// Avoiding repeat partnerships dominates; rating balance decides among
/// history-free splits and breaks ties.
pub fn create_balanced_teams(
    selected_players: &[CandidatePlayer],
    partner_history: &PartnerHistory,
) -> Result<TeamPairing, MatchmakingError> {
    if selected_players.len() != 4 {
        return Err(MatchmakingError::InvalidTeamSize {
            got: selected_players.len(),
        });
    }

    let rating_of: HashMap<Uuid, f64> = selected_players
        .iter()
        .map(|p| (p.user_id, p.rating))
        .collect();
    let ids: Vec<Uuid> = selected_players.iter().map(|p| p.user_id).collect();

    // The 3 distinct 2+2 splits: fix the first player, choose their partner.
    let splits = [(1usize, 2usize, 3usize), (2, 1, 3), (3, 1, 2)];

    let mut scored: Vec<(f64, TeamPairing)> = splits
        .iter()
        .map(|&(partner, b1, b2)| {
            let team_a = pair_key(ids[0], ids[partner]);
            let team_b = pair_key(ids[b1], ids[b2]);

            let rating_a = rating_of[&team_a.0] + rating_of[&team_a.1];
            let rating_b = rating_of[&team_b.0] + rating_of[&team_b.1];
            let balance_gap = (rating_a - rating_b).abs();

            let repeated_partners = partner_history.get(&team_a).copied().unwrap_or(0)
                + partner_history.get(&team_b).copied().unwrap_or(0);

            let score = repeated_partners as f64 * REPEAT_PARTNER_PENALTY + balance_gap;

            (
                score,
                TeamPairing {
                    team_a,
                    team_b,
                    balance_gap,
                },
            )
        })
        .collect();

    let mut best = 0;
    for i in 1..scored.len() {
        if scored[i].0 < scored[best].0 {
            best = i;
        }
    }

    Ok(scored.swap_remove(best).1)
}

/// Entry point for auto match creation: pick four fair players, then
/// balance them into teams. Errors propagate unchanged for the handler to
/// surface as a client failure.
pub fn generate_fair_doubles_match(
    players: &[CandidatePlayer],
    partner_history: &PartnerHistory,
    now: DateTime<Utc>,
) -> Result<TeamPairing, MatchmakingError> {
    let selected = select_fair_players(players, 4, now)?;
    create_balanced_teams(&selected, partner_history)
}
