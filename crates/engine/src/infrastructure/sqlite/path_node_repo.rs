//! SQLite story path repository.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Sqlite};
use storyweave_domain::{BranchId, GameSessionId, PathNode, PathNodeId};

use super::{column, format_timestamp, parse_id, parse_timestamp, write_error};
use crate::infrastructure::ports::{PathCommit, PathNodeRepo, RepoError};

const NODE_COLUMNS: &str = "id, game_session_id, content, step_order, branch_id, \
                            parent_path_id, is_active, selected_choice_text, created_at";

/// Stays well under SQLite's bound-parameter limit.
const ACTIVATE_CHUNK: usize = 500;

pub struct SqlitePathNodeRepo {
    pool: SqlitePool,
}

impl SqlitePathNodeRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PathNodeRepo for SqlitePathNodeRepo {
    async fn get(&self, id: PathNodeId) -> Result<Option<PathNode>, RepoError> {
        let row = sqlx::query(&format!("SELECT {NODE_COLUMNS} FROM story_path WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_path_node", e))?;

        row.as_ref().map(node_from_row).transpose()
    }

    async fn insert(&self, node: &PathNode) -> Result<(), RepoError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| RepoError::database("insert_path_node", e))?;
        insert_node(&mut *conn, node).await
    }

    async fn list_by_branch(&self, branch_id: &BranchId) -> Result<Vec<PathNode>, RepoError> {
        let rows = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM story_path WHERE branch_id = ? \
             ORDER BY step_order, created_at, rowid"
        ))
        .bind(branch_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_branch_nodes", e))?;

        rows.iter().map(node_from_row).collect()
    }

    async fn list_by_session(
        &self,
        session_id: GameSessionId,
    ) -> Result<Vec<PathNode>, RepoError> {
        let rows = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM story_path WHERE game_session_id = ? \
             ORDER BY step_order, created_at, rowid"
        ))
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_session_nodes", e))?;

        rows.iter().map(node_from_row).collect()
    }

    async fn list_children(&self, parent_id: PathNodeId) -> Result<Vec<PathNode>, RepoError> {
        let rows = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM story_path WHERE parent_path_id = ? \
             ORDER BY created_at, rowid"
        ))
        .bind(parent_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_children", e))?;

        rows.iter().map(node_from_row).collect()
    }

    async fn set_active(
        &self,
        session_id: GameSessionId,
        node_ids: &[PathNodeId],
    ) -> Result<(), RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("set_active", e))?;

        replace_active_path(&mut *tx, session_id, node_ids).await?;

        tx.commit()
            .await
            .map_err(|e| RepoError::database("set_active", e))
    }

    async fn commit_path(&self, commit: &PathCommit) -> Result<(), RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("commit_path", e))?;

        if let Some(node) = &commit.created {
            if node.game_session_id != commit.session_id {
                return Err(RepoError::constraint(format!(
                    "Node {} belongs to session {}, not {}",
                    node.id, node.game_session_id, commit.session_id
                )));
            }
            insert_node(&mut *tx, node).await?;
        }

        replace_active_path(&mut *tx, commit.session_id, &commit.active_path).await?;

        let moved = sqlx::query(
            r#"
            UPDATE game_sessions
            SET current_story_node_id = ?, updated_at = ?
            WHERE id = ? AND is_active = 1 AND current_story_node_id IS ?
            "#,
        )
        .bind(commit.current_node_id.to_string())
        .bind(format_timestamp(commit.updated_at))
        .bind(commit.session_id.to_string())
        .bind(commit.expected_current.map(|id| id.to_string()))
        .execute(&mut *tx)
        .await
        .map_err(|e| RepoError::database("commit_path", e))?;

        if moved.rows_affected() == 0 {
            // Dropping `tx` rolls back the insert and flag changes.
            return Err(RepoError::conflict(format!(
                "Session {} no longer points at {}",
                commit.session_id,
                commit
                    .expected_current
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "nothing".to_string())
            )));
        }

        tx.commit()
            .await
            .map_err(|e| RepoError::database("commit_path", e))?;

        tracing::debug!(
            session_id = %commit.session_id,
            current_node_id = %commit.current_node_id,
            created = commit.created.is_some(),
            path_len = commit.active_path.len(),
            "Committed story path"
        );
        Ok(())
    }
}

pub(super) async fn insert_node(
    conn: &mut SqliteConnection,
    node: &PathNode,
) -> Result<(), RepoError> {
    sqlx::query(
        r#"
        INSERT INTO story_path
            (id, game_session_id, content, step_order, branch_id,
             parent_path_id, is_active, selected_choice_text, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(node.id.to_string())
    .bind(node.game_session_id.to_string())
    .bind(&node.content)
    .bind(i64::from(node.step_order))
    .bind(node.branch_id.as_str())
    .bind(node.parent_path_id.map(|id| id.to_string()))
    .bind(node.is_active)
    .bind(node.selected_choice_text.as_deref())
    .bind(format_timestamp(node.created_at))
    .execute(conn)
    .await
    .map_err(|e| write_error("insert_path_node", e))?;

    Ok(())
}

/// Deactivate the session's nodes, then activate exactly `node_ids`.
///
/// Fails when any id is missing or belongs to another session, leaving the
/// caller's transaction to roll back.
async fn replace_active_path(
    conn: &mut SqliteConnection,
    session_id: GameSessionId,
    node_ids: &[PathNodeId],
) -> Result<(), RepoError> {
    sqlx::query("UPDATE story_path SET is_active = 0 WHERE game_session_id = ? AND is_active = 1")
        .bind(session_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| RepoError::database("set_active", e))?;

    let mut activated = 0u64;
    for chunk in node_ids.chunks(ACTIVATE_CHUNK) {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE story_path SET is_active = 1 WHERE game_session_id = ");
        builder.push_bind(session_id.to_string());
        builder.push(" AND id IN (");
        let mut ids = builder.separated(", ");
        for id in chunk {
            ids.push_bind(id.to_string());
        }
        ids.push_unseparated(")");

        activated += builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(|e| RepoError::database("set_active", e))?
            .rows_affected();
    }

    if activated != node_ids.len() as u64 {
        return Err(RepoError::constraint(format!(
            "Active path for session {} names {} nodes but only {} belong to it",
            session_id,
            node_ids.len(),
            activated
        )));
    }
    Ok(())
}

fn node_from_row(row: &SqliteRow) -> Result<PathNode, RepoError> {
    let id: String = column(row, "id")?;
    let session_id: String = column(row, "game_session_id")?;
    let step_order: i64 = column(row, "step_order")?;
    let branch_id: String = column(row, "branch_id")?;
    let parent: Option<String> = column(row, "parent_path_id")?;
    let created_at: String = column(row, "created_at")?;

    Ok(PathNode {
        id: parse_id(&id)?,
        game_session_id: parse_id(&session_id)?,
        content: column(row, "content")?,
        step_order: u32::try_from(step_order).map_err(|_| {
            RepoError::serialization(format!("Step order {} out of range", step_order))
        })?,
        branch_id: BranchId::new(branch_id).map_err(RepoError::serialization)?,
        parent_path_id: parent.as_deref().map(parse_id).transpose()?,
        is_active: column(row, "is_active")?,
        selected_choice_text: column(row, "selected_choice_text")?,
        created_at: parse_timestamp(&created_at)?,
    })
}
