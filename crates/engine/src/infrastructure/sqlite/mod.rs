//! SQLite persistence for sessions and story paths.
//!
//! Timestamps are stored as RFC 3339 text with microsecond precision and a
//! `Z` suffix, so lexical order equals chronological order.

mod path_node_repo;
mod session_repo;


use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite};

use crate::infrastructure::ports::RepoError;

pub use path_node_repo::SqlitePathNodeRepo;
pub use session_repo::SqliteGameSessionRepo;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS game_sessions (
        id TEXT PRIMARY KEY NOT NULL,
        character_name TEXT,
        current_story_node_id TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        started_at TEXT NOT NULL,
        ended_at TEXT,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS story_path (
        id TEXT PRIMARY KEY NOT NULL,
        game_session_id TEXT NOT NULL REFERENCES game_sessions(id) ON DELETE CASCADE,
        content TEXT NOT NULL,
        step_order INTEGER NOT NULL CHECK (step_order >= 0),
        branch_id TEXT NOT NULL,
        parent_path_id TEXT,
        is_active INTEGER NOT NULL DEFAULT 0,
        selected_choice_text TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_story_path_session ON story_path (game_session_id, is_active)",
    "CREATE INDEX IF NOT EXISTS idx_story_path_session_step ON story_path (game_session_id, step_order)",
    "CREATE INDEX IF NOT EXISTS idx_story_path_parent ON story_path (parent_path_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_story_path_branch_step ON story_path (branch_id, step_order)",
    "CREATE INDEX IF NOT EXISTS idx_game_sessions_started ON game_sessions (started_at)",
];

/// Shared connection pool handing out the concrete repositories.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database file at `path`.
    pub async fn open(path: &str) -> Result<Self, RepoError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))
            .map_err(|e| RepoError::database("open", e))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| RepoError::database("open", e))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        tracing::info!(path, "Story database ready");
        Ok(store)
    }

    /// Private in-memory database. A single connection that never expires,
    /// since each new connection would see an empty database.
    pub async fn in_memory() -> Result<Self, RepoError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| RepoError::database("open", e))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| RepoError::database("open", e))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), RepoError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| RepoError::database("ensure_schema", e))?;
        }
        Ok(())
    }

    pub fn session_repo(&self) -> SqliteGameSessionRepo {
        SqliteGameSessionRepo::new(self.pool.clone())
    }

    pub fn path_node_repo(&self) -> SqlitePathNodeRepo {
        SqlitePathNodeRepo::new(self.pool.clone())
    }

    /// Wait for open connections to finish and close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// =============================================================================
// Row helpers
// =============================================================================

pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepoError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| RepoError::serialization(format!("Invalid timestamp '{}': {}", raw, e)))
}

pub(crate) fn parse_id<T>(raw: &str) -> Result<T, RepoError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| RepoError::serialization(format!("Invalid id '{}': {}", raw, e)))
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepoError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| RepoError::serialization(format!("Column '{}': {}", name, e)))
}

/// Map a failed write, surfacing unique-index hits as constraint violations.
pub(crate) fn write_error(operation: &'static str, error: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db) = &error {
        if db.is_unique_violation() || db.is_foreign_key_violation() {
            return RepoError::constraint(format!("{}: {}", operation, db.message()));
        }
    }
    RepoError::database(operation, error)
}
