//! Branch resolver: computes and commits a session's active path.
//!
//! The active path is the chain of `parent_path_id` links from a target node
//! back to a root. Resolving a path commits three writes together: the node
//! activation flags, the session's current node pointer, and (for advance and
//! diverge) the newly created node.
//!
//! Callers that mutate must hold the session lock from `SessionLocks`.

use std::collections::HashSet;
use std::sync::Arc;

use storyweave_domain::{
    BranchId, ChoiceText, GameSession, GameSessionId, PathNode, PathNodeId, StoryContent,
};

use super::StoryPathError;
use crate::entities::{Sessions, StoryPath};
use crate::infrastructure::ports::{ClockPort, PathCommit};

pub struct BranchResolver {
    story_path: Arc<StoryPath>,
    sessions: Arc<Sessions>,
    clock: Arc<dyn ClockPort>,
    max_chain_depth: usize,
}

impl BranchResolver {
    pub fn new(
        story_path: Arc<StoryPath>,
        sessions: Arc<Sessions>,
        clock: Arc<dyn ClockPort>,
        max_chain_depth: usize,
    ) -> Self {
        Self {
            story_path,
            sessions,
            clock,
            max_chain_depth: max_chain_depth.max(1),
        }
    }

    /// Walk parent links from `target_id` to its root without writing.
    ///
    /// Returns nodes ordered root to target.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the target does not exist
    /// - `CrossSession` if any node on the chain belongs to another session
    /// - `BrokenChain` if a parent reference points at a missing node
    /// - `CycleSuspected` if a node repeats or the chain exceeds the depth bound
    pub async fn walk_to_root(
        &self,
        session_id: GameSessionId,
        target_id: PathNodeId,
    ) -> Result<Vec<PathNode>, StoryPathError> {
        let mut node = self
            .story_path
            .find_node(target_id)
            .await?
            .ok_or_else(|| StoryPathError::not_found("PathNode", target_id))?;

        let mut path = Vec::new();
        let mut seen = HashSet::new();

        loop {
            if node.game_session_id != session_id {
                tracing::error!(
                    session_id = %session_id,
                    node_id = %node.id,
                    owner = %node.game_session_id,
                    "Story chain crosses into another session"
                );
                return Err(StoryPathError::CrossSession {
                    node_id: node.id,
                    owner: node.game_session_id,
                    session_id,
                });
            }

            seen.insert(node.id);
            let parent_id = node.parent_path_id;
            let child_id = node.id;
            path.push(node);

            let Some(parent_id) = parent_id else {
                break;
            };

            if seen.contains(&parent_id) || path.len() >= self.max_chain_depth {
                tracing::error!(
                    session_id = %session_id,
                    start_node_id = %target_id,
                    depth = path.len(),
                    max_depth = self.max_chain_depth,
                    "Story chain walk did not reach a root"
                );
                return Err(StoryPathError::CycleSuspected {
                    start_node_id: target_id,
                    depth: path.len(),
                });
            }

            node = match self.story_path.find_node(parent_id).await? {
                Some(parent) => parent,
                None => {
                    tracing::error!(
                        session_id = %session_id,
                        node_id = %child_id,
                        missing_parent_id = %parent_id,
                        "Story chain references a missing parent"
                    );
                    return Err(StoryPathError::BrokenChain {
                        node_id: child_id,
                        missing_parent_id: parent_id,
                    });
                }
            };
        }

        path.reverse();
        Ok(path)
    }

    /// Make the chain ending at `target_id` the session's active path.
    ///
    /// Flags and pointer are committed in one transaction. Resolving the node
    /// that is already current rewrites the same state and is harmless.
    pub async fn resolve_path(
        &self,
        session_id: GameSessionId,
        target_id: PathNodeId,
    ) -> Result<Vec<PathNode>, StoryPathError> {
        let session = self.active_session(session_id).await?;
        let path = self.walk_to_root(session_id, target_id).await?;
        let path_ids: Vec<PathNodeId> = path.iter().map(|n| n.id).collect();

        let commit = PathCommit::switch(
            session_id,
            path_ids,
            session.current_story_node_id,
            self.clock.now(),
        )
        .ok_or_else(|| StoryPathError::not_found("PathNode", target_id))?;
        self.story_path.commit(&commit).await?;

        tracing::info!(
            session_id = %session_id,
            node_id = %target_id,
            path_len = path.len(),
            "Switched active path"
        );

        Ok(path.into_iter().map(PathNode::activated).collect())
    }

    /// Create an inactive node on a fresh branch hanging off `from_node_id`.
    ///
    /// The branch becomes active only when the caller resolves a path to it.
    pub async fn create_branch(
        &self,
        session_id: GameSessionId,
        from_node_id: PathNodeId,
        content: StoryContent,
        selected_choice_text: Option<ChoiceText>,
    ) -> Result<PathNode, StoryPathError> {
        let parent_path = match self.walk_to_root(session_id, from_node_id).await {
            Err(StoryPathError::NotFound { .. }) => {
                return Err(StoryPathError::InvalidParent {
                    parent_id: from_node_id,
                    reason: "parent does not exist".to_string(),
                })
            }
            Err(StoryPathError::CrossSession { node_id, owner, .. }) if node_id == from_node_id => {
                return Err(StoryPathError::InvalidParent {
                    parent_id: from_node_id,
                    reason: format!("parent belongs to session {}", owner),
                })
            }
            other => other?,
        };
        self.ensure_room_for_child(&parent_path)?;

        let branch_id = self.story_path.new_branch_id();
        let node = self
            .story_path
            .create_node(
                session_id,
                Some(from_node_id),
                content,
                selected_choice_text,
                Some(branch_id),
            )
            .await?;

        tracing::info!(
            session_id = %session_id,
            from_node_id = %from_node_id,
            branch_id = %node.branch_id,
            "Created branch"
        );
        Ok(node)
    }

    /// Branch for a node generated from `from`.
    ///
    /// `None` continues `from`'s branch; that only happens while `from` has no
    /// children. Otherwise the earlier continuation is kept and a fresh branch
    /// is returned.
    pub async fn branch_for_extension(
        &self,
        from: &PathNode,
    ) -> Result<Option<BranchId>, StoryPathError> {
        let children = self.story_path.list_children(from.id).await?;
        if children.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.story_path.new_branch_id()))
        }
    }

    /// Reject a child of the last node of `parent_path` once the chain is at
    /// the depth bound, so every committed node stays walkable.
    pub fn ensure_room_for_child(&self, parent_path: &[PathNode]) -> Result<(), StoryPathError> {
        if parent_path.len() < self.max_chain_depth {
            return Ok(());
        }
        tracing::warn!(
            parent_id = ?parent_path.last().map(|n| n.id),
            depth = parent_path.len(),
            max_depth = self.max_chain_depth,
            "Story path is at the depth bound"
        );
        Err(StoryPathError::Validation(format!(
            "Story path already holds {} nodes, the maximum is {}",
            parent_path.len(),
            self.max_chain_depth
        )))
    }

    /// Load a session that still accepts mutations.
    pub async fn active_session(
        &self,
        session_id: GameSessionId,
    ) -> Result<GameSession, StoryPathError> {
        let session = self.sessions.get(session_id).await?;
        session
            .ensure_active()
            .map_err(|_| StoryPathError::SessionEnded(session_id))?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::ports::{
        MockGameSessionRepo, MockPathNodeRepo, MockRandomPort, RepoError,
    };
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0)
            .single()
            .expect("valid timestamp")
    }

    fn content(text: &str) -> StoryContent {
        StoryContent::new(text).expect("valid content")
    }

    fn chain(session_id: GameSessionId, len: usize) -> Vec<PathNode> {
        let mut nodes = vec![PathNode::root(
            PathNodeId::new(),
            session_id,
            BranchId::new("b1").expect("branch"),
            content("Root."),
            at(0),
        )];
        for step in 1..len {
            let parent = nodes.last().expect("parent").clone();
            nodes.push(
                PathNode::child_of(PathNodeId::new(), &parent, None, content("Next."), at(step as i64))
                    .expect("child"),
            );
        }
        nodes
    }

    fn node_repo(nodes: Vec<PathNode>) -> MockPathNodeRepo {
        let by_id: HashMap<PathNodeId, PathNode> =
            nodes.into_iter().map(|n| (n.id, n)).collect();
        let mut repo = MockPathNodeRepo::new();
        repo.expect_get()
            .returning(move |id| Ok(by_id.get(&id).cloned()));
        repo
    }

    fn resolver(
        nodes: MockPathNodeRepo,
        sessions: MockGameSessionRepo,
        max_depth: usize,
    ) -> BranchResolver {
        let mut random = MockRandomPort::new();
        random.expect_gen_uuid().returning(uuid::Uuid::new_v4);
        let clock: Arc<dyn ClockPort> = Arc::new(FixedClock(at(100)));
        let story_path = Arc::new(StoryPath::new(
            Arc::new(nodes),
            clock.clone(),
            Arc::new(random),
        ));
        BranchResolver::new(
            story_path,
            Arc::new(Sessions::new(Arc::new(sessions))),
            clock,
            max_depth,
        )
    }

    #[tokio::test]
    async fn walk_returns_root_to_target() {
        let session_id = GameSessionId::new();
        let nodes = chain(session_id, 4);
        let ids: Vec<PathNodeId> = nodes.iter().map(|n| n.id).collect();
        let target = ids[3];

        let resolver = resolver(node_repo(nodes), MockGameSessionRepo::new(), 100);
        let path = resolver.walk_to_root(session_id, target).await.expect("walk");

        assert_eq!(path.iter().map(|n| n.id).collect::<Vec<_>>(), ids);
    }

    #[tokio::test]
    async fn missing_parent_is_broken_chain() {
        let session_id = GameSessionId::new();
        let mut nodes = chain(session_id, 3);
        let orphaned = nodes[2].id;
        let missing = nodes[1].id;
        nodes.remove(1);

        let resolver = resolver(node_repo(nodes), MockGameSessionRepo::new(), 100);
        let err = resolver
            .walk_to_root(session_id, orphaned)
            .await
            .expect_err("broken chain");

        match err {
            StoryPathError::BrokenChain {
                node_id,
                missing_parent_id,
            } => {
                assert_eq!(node_id, orphaned);
                assert_eq!(missing_parent_id, missing);
            }
            other => panic!("Expected BrokenChain, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn foreign_node_on_chain_is_cross_session() {
        let session_id = GameSessionId::new();
        let mut nodes = chain(session_id, 3);
        nodes[0].game_session_id = GameSessionId::new();
        let target = nodes[2].id;

        let resolver = resolver(node_repo(nodes), MockGameSessionRepo::new(), 100);
        let err = resolver
            .walk_to_root(session_id, target)
            .await
            .expect_err("cross session");

        assert!(matches!(err, StoryPathError::CrossSession { .. }));
        assert!(err.is_consistency_alarm());
    }

    #[tokio::test]
    async fn parent_loop_is_cycle_suspected() {
        let session_id = GameSessionId::new();
        let mut nodes = chain(session_id, 3);
        // Corrupt the root so it points back at the leaf
        nodes[0].parent_path_id = Some(nodes[2].id);
        let target = nodes[2].id;

        let resolver = resolver(node_repo(nodes), MockGameSessionRepo::new(), 100);
        let err = resolver
            .walk_to_root(session_id, target)
            .await
            .expect_err("cycle");

        assert!(matches!(err, StoryPathError::CycleSuspected { depth: 3, .. }));
    }

    #[tokio::test]
    async fn chain_longer_than_bound_is_cycle_suspected() {
        let session_id = GameSessionId::new();
        let nodes = chain(session_id, 6);
        let target = nodes[5].id;

        let resolver = resolver(node_repo(nodes), MockGameSessionRepo::new(), 5);
        let err = resolver
            .walk_to_root(session_id, target)
            .await
            .expect_err("too deep");

        assert!(matches!(err, StoryPathError::CycleSuspected { .. }));
    }

    #[tokio::test]
    async fn chain_at_bound_is_accepted() {
        let session_id = GameSessionId::new();
        let nodes = chain(session_id, 5);
        let target = nodes[4].id;

        let resolver = resolver(node_repo(nodes), MockGameSessionRepo::new(), 5);
        let path = resolver.walk_to_root(session_id, target).await.expect("walk");

        assert_eq!(path.len(), 5);
    }

    #[test]
    fn full_chain_has_no_room_for_a_child() {
        let session_id = GameSessionId::new();
        let resolver = resolver(MockPathNodeRepo::new(), MockGameSessionRepo::new(), 5);

        assert!(resolver.ensure_room_for_child(&chain(session_id, 4)).is_ok());
        let err = resolver
            .ensure_room_for_child(&chain(session_id, 5))
            .expect_err("at bound");
        assert!(matches!(err, StoryPathError::Validation(_)));
    }

    #[tokio::test]
    async fn create_branch_on_full_chain_writes_nothing() {
        let session_id = GameSessionId::new();
        let nodes = chain(session_id, 3);
        let leaf = nodes[2].id;
        let mut repo = node_repo(nodes);
        repo.expect_insert().never();

        let resolver = resolver(repo, MockGameSessionRepo::new(), 3);
        let err = resolver
            .create_branch(session_id, leaf, content("Too deep."), None)
            .await
            .expect_err("at bound");

        assert!(matches!(err, StoryPathError::Validation(_)));
    }

    #[tokio::test]
    async fn create_branch_from_missing_node_is_invalid_parent() {
        let session_id = GameSessionId::new();
        let resolver = resolver(node_repo(vec![]), MockGameSessionRepo::new(), 5);

        let err = resolver
            .create_branch(session_id, PathNodeId::new(), content("Nowhere."), None)
            .await
            .expect_err("missing parent");

        assert!(matches!(err, StoryPathError::InvalidParent { .. }));
    }

    #[tokio::test]
    async fn resolve_commits_path_and_pointer_together() {
        let session_id = GameSessionId::new();
        let nodes = chain(session_id, 3);
        let ids: Vec<PathNodeId> = nodes.iter().map(|n| n.id).collect();
        let session = GameSession::new(session_id, at(0)).with_current_node(ids[2]);

        let mut node_mock = node_repo(nodes);
        let expected_path = vec![ids[0], ids[1]];
        let previous = ids[2];
        node_mock
            .expect_commit_path()
            .withf(move |commit| {
                commit.created.is_none()
                    && commit.active_path == expected_path
                    && commit.current_node_id == expected_path[1]
                    && commit.expected_current == Some(previous)
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut sessions = MockGameSessionRepo::new();
        sessions
            .expect_get()
            .returning(move |_| Ok(Some(session.clone())));

        let resolver = resolver(node_mock, sessions, 100);
        let path = resolver
            .resolve_path(session_id, ids[1])
            .await
            .expect("resolve");

        assert_eq!(path.len(), 2);
        assert!(path.iter().all(|n| n.is_active));
    }

    #[tokio::test]
    async fn lost_compare_and_set_is_concurrent_mutation() {
        let session_id = GameSessionId::new();
        let nodes = chain(session_id, 2);
        let target = nodes[1].id;
        let session = GameSession::new(session_id, at(0)).with_current_node(target);

        let mut node_mock = node_repo(nodes);
        node_mock
            .expect_commit_path()
            .returning(|_| Err(RepoError::conflict("pointer moved")));

        let mut sessions = MockGameSessionRepo::new();
        sessions
            .expect_get()
            .returning(move |_| Ok(Some(session.clone())));

        let resolver = resolver(node_mock, sessions, 100);
        let err = resolver
            .resolve_path(session_id, target)
            .await
            .expect_err("conflict");

        assert!(matches!(err, StoryPathError::ConcurrentMutation(_)));
    }

    #[tokio::test]
    async fn ended_session_cannot_resolve() {
        let session_id = GameSessionId::new();
        let mut session = GameSession::new(session_id, at(0));
        session.end(at(1)).expect("end");

        let mut sessions = MockGameSessionRepo::new();
        sessions
            .expect_get()
            .returning(move |_| Ok(Some(session.clone())));
        let mut node_mock = MockPathNodeRepo::new();
        node_mock.expect_commit_path().never();

        let resolver = resolver(node_mock, sessions, 100);
        let err = resolver
            .resolve_path(session_id, PathNodeId::new())
            .await
            .expect_err("ended");

        assert!(matches!(err, StoryPathError::SessionEnded(id) if id == session_id));
    }

    #[tokio::test]
    async fn leaf_continues_its_branch_but_parent_with_children_branches() {
        let session_id = GameSessionId::new();
        let nodes = chain(session_id, 2);
        let root = nodes[0].clone();
        let leaf = nodes[1].clone();
        let leaf_id = leaf.id;

        let mut node_mock = node_repo(nodes);
        let child = leaf.clone();
        node_mock.expect_list_children().returning(move |id| {
            if id == leaf_id {
                Ok(vec![])
            } else {
                Ok(vec![child.clone()])
            }
        });

        let resolver = resolver(node_mock, MockGameSessionRepo::new(), 100);

        assert_eq!(resolver.branch_for_extension(&leaf).await.expect("leaf"), None);
        let fresh = resolver
            .branch_for_extension(&root)
            .await
            .expect("root")
            .expect("fresh branch");
        assert_ne!(fresh, root.branch_id);
    }
}
