//! SQLite game session repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use storyweave_domain::{GameSession, GameSessionId, PathNode};

use super::path_node_repo::insert_node;
use super::{column, format_timestamp, parse_id, parse_timestamp, write_error};
use crate::infrastructure::ports::{GameSessionRepo, RepoError};

const SESSION_COLUMNS: &str =
    "id, character_name, current_story_node_id, is_active, started_at, ended_at, updated_at";

pub struct SqliteGameSessionRepo {
    pool: SqlitePool,
}

impl SqliteGameSessionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GameSessionRepo for SqliteGameSessionRepo {
    async fn get(&self, id: GameSessionId) -> Result<Option<GameSession>, RepoError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM game_sessions WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::database("get_session", e))?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn list(&self, limit: u32) -> Result<Vec<GameSession>, RepoError> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM game_sessions \
             ORDER BY started_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_sessions", e))?;

        rows.iter().map(session_from_row).collect()
    }

    async fn create_with_root(
        &self,
        session: &GameSession,
        root: &PathNode,
    ) -> Result<(), RepoError> {
        if root.game_session_id != session.id {
            return Err(RepoError::constraint(format!(
                "Root node {} belongs to session {}, not {}",
                root.id, root.game_session_id, session.id
            )));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("create_session", e))?;

        sqlx::query(
            r#"
            INSERT INTO game_sessions
                (id, character_name, current_story_node_id, is_active, started_at, ended_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(session.character_name.as_deref())
        .bind(Some(root.id.to_string()))
        .bind(session.is_active)
        .bind(format_timestamp(session.started_at))
        .bind(session.ended_at.map(format_timestamp))
        .bind(format_timestamp(session.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error("create_session", e))?;

        let root = root.clone().activated();
        insert_node(&mut *tx, &root).await?;

        tx.commit()
            .await
            .map_err(|e| RepoError::database("create_session", e))?;

        Ok(())
    }

    async fn mark_ended(
        &self,
        id: GameSessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        let stamp = format_timestamp(ended_at);
        let result = sqlx::query(
            "UPDATE game_sessions SET is_active = 0, ended_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&stamp)
        .bind(&stamp)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("end_session", e))?;

        if result.rows_affected() == 0 {
            return Err(RepoError::not_found("GameSession", id));
        }
        Ok(())
    }
}

fn session_from_row(row: &SqliteRow) -> Result<GameSession, RepoError> {
    let id: String = column(row, "id")?;
    let current: Option<String> = column(row, "current_story_node_id")?;
    let started_at: String = column(row, "started_at")?;
    let ended_at: Option<String> = column(row, "ended_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(GameSession {
        id: parse_id(&id)?,
        character_name: column(row, "character_name")?,
        current_story_node_id: current.as_deref().map(parse_id).transpose()?,
        is_active: column(row, "is_active")?,
        started_at: parse_timestamp(&started_at)?,
        ended_at: ended_at.as_deref().map(parse_timestamp).transpose()?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}
