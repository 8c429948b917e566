// Service layer: pure core algorithms plus the transactional glue that
// persists their decisions.
pub mod match_service;
pub mod matchmaking;
pub mod registration_ledger;
pub mod registration_service;
pub mod session_service;

pub use match_service::MatchService;
pub use registration_service::RegistrationService;
pub use session_service::SessionService;
