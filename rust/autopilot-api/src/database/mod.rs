//! Persistence layer.
//!
//! Repository traits in [`repository`] are implemented by [`SqliteStore`].

pub mod repository;
pub mod schema;
pub mod sqlite;

pub use repository::{
    ArticleRepository, ContentRepository, CreditRepository, DueSchedule, ProjectRepository,
    ScheduleRepository,
};
pub use sqlite::SqliteStore;

use crate::config::DatabaseConfig;

/// Open the configured store. `:memory:` selects a private in-memory database.
pub async fn open_store(config: &DatabaseConfig) -> anyhow::Result<SqliteStore> {
    if config.path == ":memory:" {
        tracing::warn!("Using in-memory database, data is lost on restart");
        return SqliteStore::in_memory();
    }
    SqliteStore::open(&config.path).await
}
