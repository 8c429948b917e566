use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::service::matchmaking::MatchmakingError;
use crate::service::registration_ledger::LedgerError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }
}

impl From<MatchmakingError> for ApiError {
    fn from(err: MatchmakingError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotRegistered | LedgerError::NotConfirmed | LedgerError::NotCheckedIn => {
                ApiError::NotFound(err.to_string())
            }
            LedgerError::SessionNotAccepting | LedgerError::AlreadyRegistered => {
                ApiError::BadRequest(err.to_string())
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let (status, message) = match self {
            ApiError::BadRequest(_) => (actix_web::http::StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::NotFound(_) => (actix_web::http::StatusCode::NOT_FOUND, self.to_string()),
            ApiError::DatabaseError(_) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            ApiError::ValidationError(_) => {
                (actix_web::http::StatusCode::BAD_REQUEST, self.to_string())
            }
        };

        let error_response = ErrorResponse {
            error: message,
            code: status.as_u16(),
        };

        HttpResponse::build(status).json(error_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_map_to_client_statuses() {
        let err: ApiError = LedgerError::NotRegistered.into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError = LedgerError::AlreadyRegistered.into();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err: ApiError = LedgerError::SessionNotAccepting.into();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_matchmaking_error_maps_to_bad_request() {
        let err: ApiError = MatchmakingError::InsufficientPlayers { needed: 4, got: 2 }.into();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
