//! GameSession entity - The anchor of a playthrough
//!
//! A session owns a pointer to its current story node. Only the branch
//! resolver moves that pointer, and only while holding the session's
//! mutation lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storyweave_domain::{DomainError, GameSessionId, PathNodeId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub id: GameSessionId,
    /// Display name of the character played in this session
    pub character_name: Option<String>,
    /// Node the player is currently viewing; `None` until the opening node exists
    pub current_story_node_id: Option<PathNodeId>,
    pub is_active: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl GameSession {
    pub fn new(id: GameSessionId, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            character_name: None,
            current_story_node_id: None,
            is_active: true,
            started_at,
            ended_at: None,
            updated_at: started_at,
        }
    }

    pub fn with_character_name(mut self, name: impl Into<String>) -> Self {
        self.character_name = Some(name.into());
        self
    }

    pub fn with_current_node(mut self, node_id: PathNodeId) -> Self {
        self.current_story_node_id = Some(node_id);
        self
    }

    /// Fail unless the session still accepts story mutations.
    pub fn ensure_active(&self) -> Result<(), DomainError> {
        if self.is_active {
            Ok(())
        } else {
            Err(DomainError::invalid_state_transition(format!(
                "Game session {} has ended",
                self.id
            )))
        }
    }

    /// Mark the session as finished.
    pub fn end(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_active()?;
        self.is_active = false;
        self.ended_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}
