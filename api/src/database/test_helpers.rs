/// Shared test helpers for database tests
use super::Database;
use sqlx::sqlite::SqlitePoolOptions;

/// Set up an in-memory test database with all migrations applied.
/// A single connection that never expires keeps the database alive for the
/// whole test.
pub async fn setup_test_db() -> Database {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    Database::from_pool(pool)
        .await
        .expect("Migration failed")
}
