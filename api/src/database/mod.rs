pub mod core;
pub mod favorites;
pub mod link_shares;
pub mod projects;
pub mod saved_filters;
pub mod tasks;
pub mod types;
pub mod users;

// Re-export main types
pub use tasks::{Task, TaskInput, TASK_COLUMNS};
pub use types::{Database, SyncState};

#[cfg(test)]
pub mod test_helpers;

#[cfg(test)]
mod tests;
