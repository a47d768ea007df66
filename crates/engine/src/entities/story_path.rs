//! Story path node operations.

use std::sync::Arc;

use storyweave_domain::{
    BranchId, ChoiceText, GameSessionId, PathNode, PathNodeId, StoryContent,
};

use crate::infrastructure::ports::{ClockPort, PathCommit, PathNodeRepo, RandomPort, RepoError};

#[derive(Debug, thiserror::Error)]
pub enum CreateNodeError {
    #[error("Parent node {parent_id} does not exist")]
    MissingParent { parent_id: PathNodeId },
    #[error("Parent node {parent_id} belongs to session {owner}, not {session_id}")]
    ForeignParent {
        parent_id: PathNodeId,
        owner: GameSessionId,
        session_id: GameSessionId,
    },
    #[error("Invalid node: {0}")]
    Invalid(String),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

/// Path node store operations.
///
/// Builds nodes (step order, branch inheritance, timestamps) and reads the
/// node tree. Active-path writes go through [`PathNodeRepo::commit_path`]
/// from the branch resolver.
pub struct StoryPath {
    repo: Arc<dyn PathNodeRepo>,
    clock: Arc<dyn ClockPort>,
    random: Arc<dyn RandomPort>,
}

impl StoryPath {
    pub fn new(
        repo: Arc<dyn PathNodeRepo>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
    ) -> Self {
        Self {
            repo,
            clock,
            random,
        }
    }

    /// Allocate a fresh branch id.
    pub fn new_branch_id(&self) -> BranchId {
        BranchId::generate(self.random.gen_uuid())
    }

    /// Build (but do not persist) a node.
    ///
    /// With a parent, the node sits one step after it and inherits its branch
    /// unless `branch_id` is given. Without a parent it is a step-0 root on
    /// `branch_id` or a fresh branch.
    pub async fn prepare_node(
        &self,
        session_id: GameSessionId,
        parent_id: Option<PathNodeId>,
        content: StoryContent,
        selected_choice_text: Option<ChoiceText>,
        branch_id: Option<BranchId>,
    ) -> Result<PathNode, CreateNodeError> {
        let id = PathNodeId::from_uuid(self.random.gen_uuid());

        let node = match parent_id {
            None => {
                let branch_id = branch_id.unwrap_or_else(|| self.new_branch_id());
                PathNode::root(id, session_id, branch_id, content, self.clock.now())
            }
            Some(parent_id) => {
                let parent = self
                    .repo
                    .get(parent_id)
                    .await?
                    .ok_or(CreateNodeError::MissingParent { parent_id })?;

                if parent.game_session_id != session_id {
                    return Err(CreateNodeError::ForeignParent {
                        parent_id,
                        owner: parent.game_session_id,
                        session_id,
                    });
                }

                let now = self.clock.now().max(parent.created_at);
                PathNode::child_of(id, &parent, branch_id, content, now)
                    .map_err(|e| CreateNodeError::Invalid(e.to_string()))?
            }
        };

        Ok(node.with_choice(selected_choice_text))
    }

    /// Create and persist an inactive node.
    pub async fn create_node(
        &self,
        session_id: GameSessionId,
        parent_id: Option<PathNodeId>,
        content: StoryContent,
        selected_choice_text: Option<ChoiceText>,
        branch_id: Option<BranchId>,
    ) -> Result<PathNode, CreateNodeError> {
        let node = self
            .prepare_node(session_id, parent_id, content, selected_choice_text, branch_id)
            .await?;
        self.repo.insert(&node).await?;

        tracing::debug!(
            node_id = %node.id,
            session_id = %session_id,
            branch_id = %node.branch_id,
            step_order = node.step_order,
            "Created path node"
        );
        Ok(node)
    }

    /// Get a node, failing with `NotFound` when absent.
    pub async fn get_node(&self, id: PathNodeId) -> Result<PathNode, RepoError> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| RepoError::not_found("PathNode", id))
    }

    pub async fn find_node(&self, id: PathNodeId) -> Result<Option<PathNode>, RepoError> {
        self.repo.get(id).await
    }

    /// Nodes of one branch by step order.
    pub async fn list_branch_nodes(&self, branch_id: &BranchId) -> Result<Vec<PathNode>, RepoError> {
        self.repo.list_by_branch(branch_id).await
    }

    /// Every node of a session, historical branches included.
    pub async fn list_session_nodes(
        &self,
        session_id: GameSessionId,
    ) -> Result<Vec<PathNode>, RepoError> {
        self.repo.list_by_session(session_id).await
    }

    /// Direct children in creation order.
    pub async fn list_children(&self, node_id: PathNodeId) -> Result<Vec<PathNode>, RepoError> {
        self.repo.list_children(node_id).await
    }

    /// Mark exactly `node_ids` active for the session, atomically.
    ///
    /// Standalone store operation. Branch mutations go through `commit`, which
    /// sets the flags inside the same `commit_path` transaction as the pointer.
    pub async fn set_active(
        &self,
        session_id: GameSessionId,
        node_ids: &[PathNodeId],
    ) -> Result<(), RepoError> {
        self.repo.set_active(session_id, node_ids).await
    }

    /// Apply a branch mutation in one transaction.
    pub async fn commit(&self, commit: &PathCommit) -> Result<(), RepoError> {
        self.repo.commit_path(commit).await
    }
}
