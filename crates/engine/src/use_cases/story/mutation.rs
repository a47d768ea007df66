//! Branch mutations: advance, diverge, and switch.
//!
//! Each mutation holds the session lock from the first read until its
//! `PathCommit` lands, so two requests for one session cannot both extend the
//! same leaf.

use std::sync::Arc;

use storyweave_domain::{ChoiceText, GameSession, GameSessionId, PathNode, PathNodeId, StoryContent};

use super::{BranchResolver, StoryPathError};
use crate::entities::StoryPath;
use crate::infrastructure::ports::{ClockPort, PathCommit};
use crate::infrastructure::session_lock::SessionLocks;

/// Content for one new story step.
#[derive(Debug, Clone)]
pub struct StepInput {
    pub content: StoryContent,
    pub selected_choice_text: Option<ChoiceText>,
    /// Current node the client saw; a mismatch means the request is stale
    pub expected_current_node_id: Option<PathNodeId>,
}

impl StepInput {
    pub fn new(content: StoryContent) -> Self {
        Self {
            content,
            selected_choice_text: None,
            expected_current_node_id: None,
        }
    }

    pub fn with_choice(mut self, choice: ChoiceText) -> Self {
        self.selected_choice_text = Some(choice);
        self
    }

    pub fn expecting(mut self, current: PathNodeId) -> Self {
        self.expected_current_node_id = Some(current);
        self
    }
}

pub struct BranchMutations {
    resolver: Arc<BranchResolver>,
    story_path: Arc<StoryPath>,
    locks: Arc<SessionLocks>,
    clock: Arc<dyn ClockPort>,
}

impl BranchMutations {
    pub fn new(
        resolver: Arc<BranchResolver>,
        story_path: Arc<StoryPath>,
        locks: Arc<SessionLocks>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            resolver,
            story_path,
            locks,
            clock,
        }
    }

    /// Extend the story from the session's current node and make the new node
    /// current.
    pub async fn advance(
        &self,
        session_id: GameSessionId,
        step: StepInput,
    ) -> Result<PathNode, StoryPathError> {
        let _guard = self.locks.acquire(session_id).await?;

        let session = self.resolver.active_session(session_id).await?;
        let current = session
            .current_story_node_id
            .ok_or(StoryPathError::NoCurrentNode(session_id))?;
        check_expected(&session, &step)?;

        let path = self.resolver.walk_to_root(session_id, current).await?;
        self.extend(&session, path, step).await
    }

    /// Generate from an earlier node and switch the active path to the result.
    ///
    /// A node that already has children keeps them untouched; the new node
    /// opens a fresh branch next to them.
    pub async fn diverge(
        &self,
        session_id: GameSessionId,
        from_node_id: PathNodeId,
        step: StepInput,
    ) -> Result<PathNode, StoryPathError> {
        let _guard = self.locks.acquire(session_id).await?;

        let session = self.resolver.active_session(session_id).await?;
        check_expected(&session, &step)?;

        let from = self
            .story_path
            .find_node(from_node_id)
            .await?
            .ok_or_else(|| StoryPathError::InvalidParent {
                parent_id: from_node_id,
                reason: "parent does not exist".to_string(),
            })?;
        if from.game_session_id != session_id {
            return Err(StoryPathError::InvalidParent {
                parent_id: from_node_id,
                reason: format!("parent belongs to session {}", from.game_session_id),
            });
        }

        let path = self.resolver.walk_to_root(session_id, from_node_id).await?;
        self.extend(&session, path, step).await
    }

    /// Move the active path to an existing node without creating content.
    pub async fn switch_to(
        &self,
        session_id: GameSessionId,
        node_id: PathNodeId,
    ) -> Result<Vec<PathNode>, StoryPathError> {
        let _guard = self.locks.acquire(session_id).await?;
        self.resolver.resolve_path(session_id, node_id).await
    }

    /// Create a child of the last node of `parent_path` and commit it as the
    /// new current node, together with the path's activation flags.
    async fn extend(
        &self,
        session: &GameSession,
        parent_path: Vec<PathNode>,
        step: StepInput,
    ) -> Result<PathNode, StoryPathError> {
        let from = parent_path
            .last()
            .ok_or(StoryPathError::NoCurrentNode(session.id))?;
        self.resolver.ensure_room_for_child(&parent_path)?;
        let branch_id = self.resolver.branch_for_extension(from).await?;

        let node = self
            .story_path
            .prepare_node(
                session.id,
                Some(from.id),
                step.content,
                step.selected_choice_text,
                branch_id,
            )
            .await?;

        let commit = PathCommit::extend(
            session.id,
            node.clone(),
            parent_path.iter().map(|n| n.id).collect(),
            session.current_story_node_id,
            self.clock.now(),
        );
        self.story_path.commit(&commit).await?;

        tracing::info!(
            session_id = %session.id,
            node_id = %node.id,
            parent_id = %from.id,
            branch_id = %node.branch_id,
            step_order = node.step_order,
            diverged = node.diverges_from(from),
            "Extended story path"
        );

        Ok(node.activated())
    }
}

fn check_expected(session: &GameSession, step: &StepInput) -> Result<(), StoryPathError> {
    match step.expected_current_node_id {
        Some(expected) if session.current_story_node_id != Some(expected) => {
            tracing::warn!(
                session_id = %session.id,
                expected = %expected,
                "Rejected stale story mutation"
            );
            Err(StoryPathError::ConcurrentMutation(format!(
                "session {} moved past node {}",
                session.id, expected
            )))
        }
        _ => Ok(()),
    }
}
