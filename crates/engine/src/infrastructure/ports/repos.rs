//! Repository port traits for database access.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use storyweave_domain::{BranchId, GameSession, GameSessionId, PathNode, PathNodeId};

use super::error::RepoError;
use super::types::PathCommit;

// =============================================================================
// Game Sessions
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameSessionRepo: Send + Sync {
    async fn get(&self, id: GameSessionId) -> Result<Option<GameSession>, RepoError>;

    /// Most recently started first.
    async fn list(&self, limit: u32) -> Result<Vec<GameSession>, RepoError>;

    /// Create a session together with its opening node in one transaction.
    async fn create_with_root(
        &self,
        session: &GameSession,
        root: &PathNode,
    ) -> Result<(), RepoError>;

    /// Flag the session finished. Leaves the current node pointer untouched.
    async fn mark_ended(
        &self,
        id: GameSessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<(), RepoError>;
}

// =============================================================================
// Story Path Nodes
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PathNodeRepo: Send + Sync {
    // CRUD
    async fn get(&self, id: PathNodeId) -> Result<Option<PathNode>, RepoError>;
    async fn insert(&self, node: &PathNode) -> Result<(), RepoError>;

    // Queries (ordered by step order, then creation time)
    async fn list_by_branch(&self, branch_id: &BranchId) -> Result<Vec<PathNode>, RepoError>;
    async fn list_by_session(&self, session_id: GameSessionId)
        -> Result<Vec<PathNode>, RepoError>;
    async fn list_children(&self, parent_id: PathNodeId) -> Result<Vec<PathNode>, RepoError>;

    // Active path
    /// Mark exactly `node_ids` active and every other node of the session inactive.
    async fn set_active(
        &self,
        session_id: GameSessionId,
        node_ids: &[PathNodeId],
    ) -> Result<(), RepoError>;

    /// Apply a branch mutation atomically. See [`PathCommit`].
    async fn commit_path(&self, commit: &PathCommit) -> Result<(), RepoError>;
}
