//! Game session entity operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use storyweave_domain::{GameSession, GameSessionId, PathNode};

use crate::infrastructure::ports::{GameSessionRepo, RepoError};

/// Game session persistence operations.
pub struct Sessions {
    repo: Arc<dyn GameSessionRepo>,
}

impl Sessions {
    pub fn new(repo: Arc<dyn GameSessionRepo>) -> Self {
        Self { repo }
    }

    /// Get a session, failing with `NotFound` when absent.
    pub async fn get(&self, id: GameSessionId) -> Result<GameSession, RepoError> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| RepoError::not_found("GameSession", id))
    }

    pub async fn list(&self, limit: u32) -> Result<Vec<GameSession>, RepoError> {
        self.repo.list(limit).await
    }

    pub async fn create_with_root(
        &self,
        session: &GameSession,
        root: &PathNode,
    ) -> Result<(), RepoError> {
        self.repo.create_with_root(session, root).await
    }

    pub async fn mark_ended(
        &self,
        id: GameSessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        self.repo.mark_ended(id, ended_at).await
    }
}
