pub mod common;
pub mod system;
pub mod tasks;

pub use system::SystemApi;
pub use tasks::TasksApi;

use poem_openapi::OpenApi;

/// Combines all API modules into a single OpenAPI specification
pub fn create_combined_api() -> impl OpenApi {
    (SystemApi, TasksApi)
}

#[cfg(test)]
mod tests;
