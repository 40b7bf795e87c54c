pub mod api;
pub mod config;
pub mod model;
pub mod retry;
pub mod sign;

pub use api::dispatcher::Dispatcher;
pub use api::session::{SessionManager, SessionState};
pub use api::Error;
