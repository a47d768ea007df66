//! Helper types for port operations.

use chrono::{DateTime, Utc};
use storyweave_domain::{GameSessionId, PathNode, PathNodeId};

// =============================================================================
// Story Path Unit of Work
// =============================================================================

/// Everything one branch mutation writes, committed as a single transaction.
///
/// The store inserts `created` (if any), marks exactly `active_path` active
/// for the session, and moves the session's current node pointer. The
/// pointer move is a compare-and-set against `expected_current`; losing it
/// rolls the whole commit back with `RepoError::Conflict`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathCommit {
    pub session_id: GameSessionId,
    /// Node created by this mutation, if any
    pub created: Option<PathNode>,
    /// Root-to-target node ids that form the new active path
    pub active_path: Vec<PathNodeId>,
    /// New value of the session's current story node
    pub current_node_id: PathNodeId,
    /// The current node the mutation was computed against
    pub expected_current: Option<PathNodeId>,
    pub updated_at: DateTime<Utc>,
}

impl PathCommit {
    /// Commit that only switches the active path.
    pub fn switch(
        session_id: GameSessionId,
        active_path: Vec<PathNodeId>,
        expected_current: Option<PathNodeId>,
        updated_at: DateTime<Utc>,
    ) -> Option<Self> {
        let current_node_id = *active_path.last()?;
        Some(Self {
            session_id,
            created: None,
            active_path,
            current_node_id,
            expected_current,
            updated_at,
        })
    }

    /// Commit that inserts `node` and makes it the end of the active path.
    pub fn extend(
        session_id: GameSessionId,
        node: PathNode,
        parent_path: Vec<PathNodeId>,
        expected_current: Option<PathNodeId>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let current_node_id = node.id;
        let mut active_path = parent_path;
        active_path.push(node.id);
        Self {
            session_id,
            created: Some(node),
            active_path,
            current_node_id,
            expected_current,
            updated_at,
        }
    }
}
