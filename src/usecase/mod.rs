pub mod agents;
pub mod policies;
pub mod users;

pub use agents::AgentUsecase;
pub use policies::{PolicyUpdate, PolicyUsecase};
pub use users::UserUsecase;
