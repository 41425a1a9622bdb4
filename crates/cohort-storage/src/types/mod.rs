//! Type definitions for cohort storage.

mod cohorts;
mod ids;
mod messages;
mod tasks;
mod users;

// Re-export all types from submodules
pub use cohorts::*;
pub use ids::*;
pub use messages::*;
pub use tasks::*;
pub use users::*;
