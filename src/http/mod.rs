pub mod health;
pub mod match_handler;
pub mod registration_handler;
pub mod session_handler;
pub mod session_ws_handler;
