//! PathNode entity - One step of a session's story
//!
//! Nodes form a tree through `parent_path_id` back-references. The tree is an
//! arena keyed by `PathNodeId`: parents are looked up by id, never owned.
//!
//! A node never changes branch or parent after creation. Branching happens by
//! creating a new node with a new `branch_id`; superseded history is kept and
//! only flagged inactive.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storyweave_domain::{
    BranchId, ChoiceText, DomainError, GameSessionId, PathNodeId, StoryContent,
};

/// A single step of narrative content and its link to the step it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathNode {
    pub id: PathNodeId,
    pub game_session_id: GameSessionId,
    /// Narrative text produced by the story generator (opaque to the engine)
    pub content: String,
    /// Position within the branch; the session's opening node is step 0
    pub step_order: u32,
    pub branch_id: BranchId,
    /// Node this one was generated from; `None` for a root
    pub parent_path_id: Option<PathNodeId>,
    /// Whether this node lies on the session's currently selected path
    pub is_active: bool,
    /// The choice that led from the parent to this node
    pub selected_choice_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PathNode {
    /// Create a root node (step 0, no parent).
    pub fn root(
        id: PathNodeId,
        game_session_id: GameSessionId,
        branch_id: BranchId,
        content: StoryContent,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            game_session_id,
            content: content.into_inner(),
            step_order: 0,
            branch_id,
            parent_path_id: None,
            is_active: false,
            selected_choice_text: None,
            created_at,
        }
    }

    /// Create a node generated from `parent`.
    ///
    /// The child belongs to the parent's session and sits one step after it.
    /// Without an explicit `branch_id` it continues the parent's branch.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the parent's step order is already
    /// at the maximum, or if `created_at` precedes the parent's creation.
    pub fn child_of(
        id: PathNodeId,
        parent: &PathNode,
        branch_id: Option<BranchId>,
        content: StoryContent,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let step_order = parent
            .step_order
            .checked_add(1)
            .ok_or_else(|| DomainError::validation("Step order overflow"))?;

        if created_at < parent.created_at {
            return Err(DomainError::validation(
                "A node cannot be created before its parent",
            ));
        }

        Ok(Self {
            id,
            game_session_id: parent.game_session_id,
            content: content.into_inner(),
            step_order,
            branch_id: branch_id.unwrap_or_else(|| parent.branch_id.clone()),
            parent_path_id: Some(parent.id),
            is_active: false,
            selected_choice_text: None,
            created_at,
        })
    }

    pub fn with_choice(mut self, choice: Option<ChoiceText>) -> Self {
        self.selected_choice_text = choice.map(ChoiceText::into_inner);
        self
    }

    pub fn activated(mut self) -> Self {
        self.is_active = true;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_path_id.is_none()
    }

    /// Whether this node opened a new branch off its parent.
    pub fn diverges_from(&self, parent: &PathNode) -> bool {
        self.parent_path_id == Some(parent.id) && self.branch_id != parent.branch_id
    }

    /// Timeline ordering: step order first, creation time as tie-break.
    pub fn timeline_cmp(&self, other: &PathNode) -> Ordering {
        self.step_order
            .cmp(&other.step_order)
            .then_with(|| self.created_at.cmp(&other.created_at))
    }
}
