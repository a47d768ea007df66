//! Branch protocol scenarios against the SQLite store.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use storyweave_domain::{ChoiceText, PathNodeId};

use super::{StepInput, StoryPathError};
use crate::infrastructure::config::EngineConfig;
use crate::test_fixtures::{content, StoryHarness};

fn step(text: &str) -> StepInput {
    StepInput::new(content(text))
}

fn choice(text: &str) -> ChoiceText {
    ChoiceText::new(text).expect("valid choice")
}

#[tokio::test]
async fn replay_and_diverge_scenario() {
    let harness = StoryHarness::new().await;
    let (session, n0) = harness.seed_session("b1", "You stand at a fork.").await;

    let n1 = harness
        .mutations
        .advance(session.id, step("You go straight.").with_choice(choice("go straight")))
        .await
        .expect("advance");
    assert_eq!(n1.branch_id.as_str(), "b1");
    assert_eq!(n1.step_order, 1);

    harness
        .mutations
        .switch_to(session.id, n0.id)
        .await
        .expect("switch back");

    let n2 = harness
        .mutations
        .diverge(session.id, n0.id, step("You go left.").with_choice(choice("go left")))
        .await
        .expect("diverge");
    assert_ne!(n2.branch_id.as_str(), "b1");
    assert_eq!(n2.parent_path_id, Some(n0.id));
    assert_eq!(n2.step_order, 1);

    assert_eq!(harness.active_ids(session.id).await, vec![n0.id, n2.id]);
    assert!(!harness.node(n1.id).await.is_active);
    assert_eq!(
        harness.session(session.id).await.current_story_node_id,
        Some(n2.id)
    );

    let siblings = harness
        .timeline
        .list_sibling_branches(n1.id)
        .await
        .expect("siblings");
    assert_eq!(siblings, vec![n2.branch_id.clone()]);
}

#[tokio::test]
async fn advance_extends_the_leaf_branch() {
    let harness = StoryHarness::new().await;
    let started = harness.start("A quiet village.").await;
    let session_id = started.session.id;

    let mut leaf = started.opening_node;
    for text in ["A knock.", "A stranger.", "A map."] {
        let next = harness
            .mutations
            .advance(session_id, step(text))
            .await
            .expect("advance");
        assert_eq!(next.branch_id, leaf.branch_id);
        assert_eq!(next.step_order, leaf.step_order + 1);
        assert_eq!(next.parent_path_id, Some(leaf.id));
        leaf = next;
    }

    let history = harness.history(session_id).await;
    assert_eq!(history.current_node_id, Some(leaf.id));
    assert_eq!(history.current_path.len(), 4);
    assert_eq!(history.branch_count, 1);
    assert_eq!(history.unexplored_branch_count, 0);
}

#[tokio::test]
async fn diverge_leaves_existing_children_untouched() {
    let harness = StoryHarness::new().await;
    let started = harness.start("A river.").await;
    let session_id = started.session.id;
    let root = started.opening_node;

    let swim = harness
        .mutations
        .advance(session_id, step("You swim."))
        .await
        .expect("swim");
    let bridge = harness
        .mutations
        .diverge(session_id, root.id, step("You find a bridge."))
        .await
        .expect("bridge");
    let boat = harness
        .mutations
        .diverge(session_id, root.id, step("You take a boat."))
        .await
        .expect("boat");

    let child_branches: HashSet<_> = [&swim.branch_id, &bridge.branch_id, &boat.branch_id]
        .into_iter()
        .collect();
    assert_eq!(child_branches.len(), 3);

    // Earlier continuations keep their branch, parent and step
    for earlier in [&swim, &bridge] {
        let stored = harness.node(earlier.id).await;
        assert_eq!(stored.branch_id, earlier.branch_id);
        assert_eq!(stored.parent_path_id, Some(root.id));
        assert!(!stored.is_active);
    }
    assert_eq!(harness.active_ids(session_id).await, vec![root.id, boat.id]);

    let history = harness.history(session_id).await;
    assert_eq!(history.branch_count, 3);
    // `swim` continued the root's branch, so only the bridge is unexplored
    assert_eq!(history.unexplored_branch_count, 1);
}

#[tokio::test]
async fn diverge_from_a_leaf_continues_its_branch() {
    let harness = StoryHarness::new().await;
    let started = harness.start("A tower.").await;
    let session_id = started.session.id;

    let climb = harness
        .mutations
        .advance(session_id, step("You climb."))
        .await
        .expect("climb");
    let next = harness
        .mutations
        .diverge(session_id, climb.id, step("You reach the top."))
        .await
        .expect("continue");

    assert_eq!(next.branch_id, climb.branch_id);
    assert_eq!(next.step_order, 2);
}

#[tokio::test]
async fn switch_is_idempotent() {
    let harness = StoryHarness::new().await;
    let started = harness.start("A maze.").await;
    let session_id = started.session.id;
    let root = started.opening_node;

    let left = harness
        .mutations
        .advance(session_id, step("Left turn."))
        .await
        .expect("left");
    harness
        .mutations
        .diverge(session_id, root.id, step("Right turn."))
        .await
        .expect("right");

    let first = harness
        .mutations
        .switch_to(session_id, left.id)
        .await
        .expect("first switch");
    let active_after_first = harness.active_ids(session_id).await;
    let second = harness
        .mutations
        .switch_to(session_id, left.id)
        .await
        .expect("second switch");

    let ids = |path: &[storyweave_domain::PathNode]| path.iter().map(|n| n.id).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(ids(&first), vec![root.id, left.id]);
    assert_eq!(harness.active_ids(session_id).await, active_after_first);
}

#[tokio::test]
async fn active_nodes_always_form_one_chain_to_current() {
    let harness = StoryHarness::new().await;
    let started = harness.start("A forest.").await;
    let session_id = started.session.id;
    let root = started.opening_node;

    let a = harness.mutations.advance(session_id, step("A.")).await.expect("a");
    let b = harness.mutations.advance(session_id, step("B.")).await.expect("b");
    let c = harness
        .mutations
        .diverge(session_id, a.id, step("C."))
        .await
        .expect("c");
    harness.mutations.switch_to(session_id, b.id).await.expect("to b");
    let d = harness
        .mutations
        .diverge(session_id, root.id, step("D."))
        .await
        .expect("d");
    harness.mutations.switch_to(session_id, c.id).await.expect("to c");

    let history = harness.history(session_id).await;
    let active: Vec<PathNodeId> = history
        .all_nodes
        .iter()
        .filter(|n| n.is_active)
        .map(|n| n.id)
        .collect();
    assert_eq!(active, history.current_path);
    assert_eq!(history.current_path, vec![root.id, a.id, c.id]);
    assert!(!harness.node(d.id).await.is_active);
    assert!(!harness.node(b.id).await.is_active);

    // Every node walks back to a root within the bound
    for node in &history.all_nodes {
        let path = harness
            .timeline
            .path_to(session_id, node.id)
            .await
            .expect("acyclic");
        assert_eq!(path.first().map(|n| n.id), Some(root.id));
    }
}

#[tokio::test]
async fn concurrent_advances_persist_one_node() {
    let harness = StoryHarness::new().await;
    let started = harness.start("The bell rings.").await;
    let session_id = started.session.id;
    let leaf = started.opening_node.id;

    let submit = |text: &'static str| {
        let mutations = Arc::clone(&harness.mutations);
        tokio::spawn(async move {
            mutations
                .advance(session_id, step(text).expecting(leaf))
                .await
        })
    };
    let first = submit("You answer the door.");
    let second = submit("You answer the door.");

    let results = [
        first.await.expect("join first"),
        second.await.expect("join second"),
    ];

    let created: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(created.len(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(StoryPathError::ConcurrentMutation(_)))));

    let history = harness.history(session_id).await;
    assert_eq!(history.all_nodes.len(), 2);
    assert_eq!(history.current_node_id, Some(created[0].id));
}

#[tokio::test]
async fn concurrent_advances_without_expectation_chain_up() {
    let harness = StoryHarness::new().await;
    let started = harness.start("Rain.").await;
    let session_id = started.session.id;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let mutations = Arc::clone(&harness.mutations);
            tokio::spawn(async move { mutations.advance(session_id, step("More rain.")).await })
        })
        .collect();
    for handle in handles {
        handle.await.expect("join").expect("advance");
    }

    let history = harness.history(session_id).await;
    let steps: Vec<u32> = history.path_nodes.iter().map(|n| n.step_order).collect();
    assert_eq!(steps, vec![0, 1, 2, 3, 4]);
    assert_eq!(history.branch_count, 1);
}

#[tokio::test]
async fn switching_to_another_sessions_node_is_rejected() {
    let harness = StoryHarness::new().await;
    let mine = harness.start("Mine.").await;
    let theirs = harness.start("Theirs.").await;

    let err = harness
        .mutations
        .switch_to(mine.session.id, theirs.opening_node.id)
        .await
        .expect_err("cross session");

    assert!(matches!(err, StoryPathError::CrossSession { .. }));
    assert_eq!(
        harness.active_ids(mine.session.id).await,
        vec![mine.opening_node.id]
    );
}

#[tokio::test]
async fn ended_session_rejects_mutations_but_stays_readable() {
    let harness = StoryHarness::new().await;
    let started = harness.start("The end is near.").await;
    let session_id = started.session.id;

    harness.lifecycle.end(session_id).await.expect("end");

    let err = harness
        .mutations
        .advance(session_id, step("Too late."))
        .await
        .expect_err("ended");
    assert!(matches!(err, StoryPathError::SessionEnded(_)));

    let history = harness.history(session_id).await;
    assert_eq!(history.current_path, vec![started.opening_node.id]);
}

#[tokio::test]
async fn unknown_switch_target_is_not_found() {
    let harness = StoryHarness::new().await;
    let started = harness.start("Fog.").await;

    let err = harness
        .mutations
        .switch_to(started.session.id, PathNodeId::new())
        .await
        .expect_err("unknown node");

    assert!(matches!(err, StoryPathError::NotFound { .. }));
}

#[tokio::test]
async fn depth_bound_keeps_every_path_readable() {
    let harness = StoryHarness::with_config(EngineConfig {
        max_chain_depth: 3,
        lock_timeout: Duration::from_secs(1),
        ..EngineConfig::default()
    })
    .await;
    let started = harness.start("Stairs down.").await;
    let session_id = started.session.id;
    let root = started.opening_node;

    harness.mutations.advance(session_id, step("Down.")).await.expect("second node");
    let leaf = harness
        .mutations
        .advance(session_id, step("Down."))
        .await
        .expect("third node");
    assert_eq!(harness.history(session_id).await.current_path.len(), 3);

    let err = harness
        .mutations
        .advance(session_id, step("Down."))
        .await
        .expect_err("depth bound");
    assert!(matches!(err, StoryPathError::Validation(_)));
    let err = harness
        .mutations
        .diverge(session_id, leaf.id, step("Sideways."))
        .await
        .expect_err("depth bound");
    assert!(matches!(err, StoryPathError::Validation(_)));
    let err = harness
        .resolver
        .create_branch(session_id, leaf.id, content("Sideways."), None)
        .await
        .expect_err("depth bound");
    assert!(matches!(err, StoryPathError::Validation(_)));

    // Rejected steps leave the session walkable and unchanged
    let history = harness.history(session_id).await;
    assert_eq!(history.current_node_id, Some(leaf.id));
    assert_eq!(history.all_nodes.len(), 3);
    harness.mutations.switch_to(session_id, leaf.id).await.expect("switch");

    // Shallower nodes still accept new branches
    harness
        .mutations
        .diverge(session_id, root.id, step("Back up."))
        .await
        .expect("diverge from root");
}

#[tokio::test]
async fn created_branch_is_inactive_until_resolved() {
    let harness = StoryHarness::new().await;
    let started = harness.start("A chest.").await;
    let session_id = started.session.id;
    let root = started.opening_node;

    let branch = harness
        .resolver
        .create_branch(session_id, root.id, content("It is empty."), Some(choice("open")))
        .await
        .expect("create branch");
    assert!(!harness.node(branch.id).await.is_active);
    assert_ne!(branch.branch_id, root.branch_id);
    assert_eq!(harness.active_ids(session_id).await, vec![root.id]);

    harness
        .mutations
        .switch_to(session_id, branch.id)
        .await
        .expect("switch");
    assert_eq!(harness.active_ids(session_id).await, vec![root.id, branch.id]);
}
