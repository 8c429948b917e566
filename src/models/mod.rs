// Core models
pub mod match_model;
pub mod registration;
pub mod session;
pub mod user;

// Re-export commonly used types
pub use match_model::*;
pub use registration::*;
pub use session::*;
pub use user::*;
