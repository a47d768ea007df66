//! Session lifecycle: start, read, and end a playthrough.

use std::sync::Arc;

use storyweave_domain::{GameSession, GameSessionId, PathNode, StoryContent};

use crate::entities::{Sessions, StoryPath};
use crate::infrastructure::ports::{ClockPort, RandomPort};
use crate::infrastructure::session_lock::SessionLocks;
use crate::use_cases::story::StoryPathError;

const MAX_CHARACTER_NAME_LENGTH: usize = 100;

/// Upper bound for one page of sessions.
pub const MAX_SESSION_PAGE: u32 = 100;

/// Default page size when the caller does not ask for one.
pub const DEFAULT_SESSION_PAGE: u32 = 20;

/// A freshly started session and its opening node.
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session: GameSession,
    pub opening_node: PathNode,
}

pub struct SessionLifecycle {
    sessions: Arc<Sessions>,
    story_path: Arc<StoryPath>,
    locks: Arc<SessionLocks>,
    clock: Arc<dyn ClockPort>,
    random: Arc<dyn RandomPort>,
}

impl SessionLifecycle {
    pub fn new(
        sessions: Arc<Sessions>,
        story_path: Arc<StoryPath>,
        locks: Arc<SessionLocks>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        Self {
            sessions,
            story_path,
            locks,
            clock,
            random,
        }
    }

    /// Create a session whose opening node is its active root.
    pub async fn start(
        &self,
        character_name: Option<String>,
        opening: StoryContent,
    ) -> Result<StartedSession, StoryPathError> {
        let character_name = character_name
            .map(|name| normalize_character_name(&name))
            .transpose()?
            .flatten();

        let session_id = GameSessionId::from_uuid(self.random.gen_uuid());
        let opening_node = self
            .story_path
            .prepare_node(session_id, None, opening, None, None)
            .await?
            .activated();

        let mut session = GameSession::new(session_id, opening_node.created_at)
            .with_current_node(opening_node.id);
        session.character_name = character_name;

        self.sessions.create_with_root(&session, &opening_node).await?;

        tracing::info!(
            session_id = %session_id,
            root_node_id = %opening_node.id,
            branch_id = %opening_node.branch_id,
            "Started game session"
        );

        Ok(StartedSession {
            session,
            opening_node,
        })
    }

    pub async fn get(&self, session_id: GameSessionId) -> Result<GameSession, StoryPathError> {
        Ok(self.sessions.get(session_id).await?)
    }

    /// Most recently started first.
    pub async fn list(&self, limit: Option<u32>) -> Result<Vec<GameSession>, StoryPathError> {
        let limit = limit
            .unwrap_or(DEFAULT_SESSION_PAGE)
            .clamp(1, MAX_SESSION_PAGE);
        Ok(self.sessions.list(limit).await?)
    }

    /// Finish a session. Its story stays readable but no longer changes.
    pub async fn end(&self, session_id: GameSessionId) -> Result<GameSession, StoryPathError> {
        let _guard = self.locks.acquire(session_id).await?;

        let mut session = self.sessions.get(session_id).await?;
        let now = self.clock.now();
        session
            .end(now)
            .map_err(|_| StoryPathError::SessionEnded(session_id))?;
        self.sessions.mark_ended(session_id, now).await?;

        tracing::info!(session_id = %session_id, "Ended game session");
        Ok(session)
    }
}

/// Trim the name; blank names mean "no name".
fn normalize_character_name(name: &str) -> Result<Option<String>, StoryPathError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_CHARACTER_NAME_LENGTH {
        return Err(StoryPathError::Validation(format!(
            "Character name cannot exceed {} characters",
            MAX_CHARACTER_NAME_LENGTH
        )));
    }
    Ok(Some(trimmed.to_string()))
}
