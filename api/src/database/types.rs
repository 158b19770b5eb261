use sqlx::SqlitePool;

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("connections", &self.pool.size())
            .finish()
    }
}

/// Resync watermark of one index collection. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SyncState {
    pub collection: String,
    pub sync_started_at: i64,
    /// `None` until the first run completes
    pub sync_finished_at: Option<i64>,
}
