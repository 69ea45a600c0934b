pub mod agents;
pub mod auth;
pub mod health;
pub mod policies;
pub mod routes;
pub mod users;

pub use routes::{create_router, AppState};
