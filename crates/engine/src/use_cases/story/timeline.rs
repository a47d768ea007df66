//! Timeline navigator: read-only views of a session's story tree.
//!
//! Reads take no session lock. A history fetched while a mutation commits may
//! be one step behind, which is fine for display.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use storyweave_domain::{BranchId, GameSessionId, PathNode, PathNodeId};

use super::{BranchResolver, StoryPathError};
use crate::entities::{Sessions, StoryPath};

/// A session's active path alongside every node it has ever produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathHistory {
    pub session_id: GameSessionId,
    pub current_node_id: Option<PathNodeId>,
    /// Root-to-current node ids
    pub current_path: Vec<PathNodeId>,
    /// Root-to-current nodes
    pub path_nodes: Vec<PathNode>,
    /// All nodes of the session, inactive branches included
    pub all_nodes: Vec<PathNode>,
    /// Distinct branches across `all_nodes`
    pub branch_count: usize,
    /// Branches with no node on the current path
    pub unexplored_branch_count: usize,
}

pub struct TimelineNavigator {
    resolver: Arc<BranchResolver>,
    story_path: Arc<StoryPath>,
    sessions: Arc<Sessions>,
}

impl TimelineNavigator {
    pub fn new(
        resolver: Arc<BranchResolver>,
        story_path: Arc<StoryPath>,
        sessions: Arc<Sessions>,
    ) -> Self {
        Self {
            resolver,
            story_path,
            sessions,
        }
    }

    /// Reconstruct the session's path history from its current node.
    pub async fn get_path_history(
        &self,
        session_id: GameSessionId,
    ) -> Result<PathHistory, StoryPathError> {
        let session = self.sessions.get(session_id).await?;

        let path_nodes = match session.current_story_node_id {
            Some(current) => self.resolver.walk_to_root(session_id, current).await?,
            None => Vec::new(),
        };
        let mut all_nodes = self.story_path.list_session_nodes(session_id).await?;
        all_nodes.sort_by(PathNode::timeline_cmp);

        let branches: HashSet<&BranchId> = all_nodes.iter().map(|n| &n.branch_id).collect();
        let on_path: HashSet<&BranchId> = path_nodes.iter().map(|n| &n.branch_id).collect();
        let branch_count = branches.len();
        let unexplored_branch_count = branches.difference(&on_path).count();

        Ok(PathHistory {
            session_id,
            current_node_id: session.current_story_node_id,
            current_path: path_nodes.iter().map(|n| n.id).collect(),
            path_nodes,
            all_nodes,
            branch_count,
            unexplored_branch_count,
        })
    }

    /// Root-to-node chain for any node of the session, without switching to it.
    pub async fn path_to(
        &self,
        session_id: GameSessionId,
        node_id: PathNodeId,
    ) -> Result<Vec<PathNode>, StoryPathError> {
        self.resolver.walk_to_root(session_id, node_id).await
    }

    /// Branches that split from the same parent as `node_id`, in creation order.
    ///
    /// A root has no parent and therefore no siblings.
    pub async fn list_sibling_branches(
        &self,
        node_id: PathNodeId,
    ) -> Result<Vec<BranchId>, StoryPathError> {
        let node = self.story_path.get_node(node_id).await?;
        let Some(parent_id) = node.parent_path_id else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let siblings = self
            .story_path
            .list_children(parent_id)
            .await?
            .into_iter()
            .filter(|child| child.branch_id != node.branch_id)
            .map(|child| child.branch_id)
            .filter(|branch| seen.insert(branch.clone()))
            .collect();

        Ok(siblings)
    }

    pub async fn get_node(&self, node_id: PathNodeId) -> Result<PathNode, StoryPathError> {
        Ok(self.story_path.get_node(node_id).await?)
    }

    pub async fn list_branch_nodes(
        &self,
        branch_id: &BranchId,
    ) -> Result<Vec<PathNode>, StoryPathError> {
        Ok(self.story_path.list_branch_nodes(branch_id).await?)
    }
}
