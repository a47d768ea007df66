//! Errors raised by the branch protocol.

use storyweave_domain::{DomainError, GameSessionId, PathNodeId};

use crate::entities::CreateNodeError;
use crate::infrastructure::ports::{LlmError, RepoError};
use crate::infrastructure::session_lock::LockTimeout;

#[derive(Debug, thiserror::Error)]
pub enum StoryPathError {
    /// Parent absent or owned by another session
    #[error("Invalid parent {parent_id}: {reason}")]
    InvalidParent {
        parent_id: PathNodeId,
        reason: String,
    },
    /// A node's parent reference points at nothing
    #[error("Broken chain: node {node_id} references missing parent {missing_parent_id}")]
    BrokenChain {
        node_id: PathNodeId,
        missing_parent_id: PathNodeId,
    },
    /// Chain walk revisited a node or exceeded the depth bound
    #[error("Cycle suspected walking back from {start_node_id} (gave up after {depth} nodes)")]
    CycleSuspected {
        start_node_id: PathNodeId,
        depth: usize,
    },
    #[error("Node {node_id} belongs to session {owner}, not {session_id}")]
    CrossSession {
        node_id: PathNodeId,
        owner: GameSessionId,
        session_id: GameSessionId,
    },
    /// Another mutation on the same session won; retry with fresh state
    #[error("Concurrent mutation: {0}")]
    ConcurrentMutation(String),
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("Session {0} has ended")]
    SessionEnded(GameSessionId),
    #[error("Session {0} has no current story node")]
    NoCurrentNode(GameSessionId),
    /// Rejected text or an unbuildable node (step overflow, clock skew)
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Story generation failed: {0}")]
    Generation(#[from] LlmError),
    #[error("Repository error: {0}")]
    Repo(RepoError),
}

impl StoryPathError {
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Chain-integrity failures that indicate corrupted writes.
    pub fn is_consistency_alarm(&self) -> bool {
        matches!(
            self,
            Self::BrokenChain { .. } | Self::CycleSuspected { .. } | Self::CrossSession { .. }
        )
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::ConcurrentMutation(_) | Self::Generation(_))
    }
}

impl From<RepoError> for StoryPathError {
    fn from(error: RepoError) -> Self {
        match error {
            RepoError::NotFound { entity_type, id } => Self::NotFound { entity_type, id },
            RepoError::Conflict(reason) => Self::ConcurrentMutation(reason),
            other => Self::Repo(other),
        }
    }
}

impl From<DomainError> for StoryPathError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::NotFound { entity_type, id } => Self::NotFound { entity_type, id },
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<LockTimeout> for StoryPathError {
    fn from(timeout: LockTimeout) -> Self {
        Self::ConcurrentMutation(timeout.to_string())
    }
}

impl From<CreateNodeError> for StoryPathError {
    fn from(error: CreateNodeError) -> Self {
        match error {
            CreateNodeError::MissingParent { parent_id } => Self::InvalidParent {
                parent_id,
                reason: "parent does not exist".to_string(),
            },
            CreateNodeError::ForeignParent {
                parent_id, owner, ..
            } => Self::InvalidParent {
                parent_id,
                reason: format!("parent belongs to session {}", owner),
            },
            CreateNodeError::Invalid(message) => Self::Validation(message),
            CreateNodeError::Repo(e) => e.into(),
        }
    }
}
