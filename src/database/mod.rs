//! SQLite Database Module
//!
//! Provides structured data storage for campaigns, entities, and the
//! content-analysis job/item tables the rest of the service is built
//! around.

mod migrations;
mod models;

pub mod campaigns;
pub mod entities;
pub mod jobs;
pub mod entity_logs;
pub mod relationships;
pub mod constraint_overrides;
pub mod source_fields;
pub mod chunks;

pub use migrations::run_migrations;
pub use models::*;

pub use campaigns::CampaignOps;
pub use entities::EntityOps;
pub use jobs::{JobOps, NewAnalysisItem};
pub use entity_logs::EntityLogOps;
pub use relationships::RelationshipOps;
pub use constraint_overrides::ConstraintOverrideOps;
pub use chunks::ChunkOps;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Database connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
}

impl Database {
    /// Open (creating if missing) the database at `db_path` and run any
    /// pending migrations.
    pub async fn new(db_path: &Path) -> Result<Self, sqlx::Error> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .min_connections(1)
            .connect_with(options)
            .await?;

        let db = Self {
            pool,
            path: db_path.to_path_buf(),
        };

        migrations::run_migrations(&db.pool).await?;

        Ok(db)
    }

    /// Open an in-memory database. Used by tests; migrations still run.
    pub async fn new_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let db = Self {
            pool,
            path: PathBuf::from(":memory:"),
        };
        migrations::run_migrations(&db.pool).await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
