//! Business logic services layer

pub mod session_service;
pub mod user_service;

pub use session_service::{authorize, LoginOutcome, RefreshOutcome, SessionService};
pub use user_service::UserService;
