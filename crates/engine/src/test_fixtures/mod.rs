//! Test harness wiring the real use cases to an in-memory SQLite store.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_fixtures::StoryHarness;
//!
//! #[tokio::test]
//! async fn test_advance() {
//!     let harness = StoryHarness::new().await;
//!     let started = harness.start("You wake in a cellar.").await;
//!     // ... test logic
//! }
//! ```

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use storyweave_domain::{
    BranchId, GameSession, GameSessionId, PathNode, PathNodeId, StoryContent,
};

use crate::app::{App, Repositories};
use crate::infrastructure::clock::{SteppingClock, SystemRandom};
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::ports::{ClockPort, GameSessionRepo, MockLlmPort};
use crate::infrastructure::sqlite::SqliteStore;
use crate::use_cases::session::{SessionLifecycle, StartedSession};
use crate::use_cases::story::{
    BranchMutations, BranchResolver, PathHistory, TimelineNavigator,
};
use crate::use_cases::MakeChoice;

pub struct StoryHarness {
    pub app: Arc<App>,
    pub store: SqliteStore,
    pub clock: Arc<SteppingClock>,
    pub resolver: Arc<BranchResolver>,
    pub timeline: Arc<TimelineNavigator>,
    pub mutations: Arc<BranchMutations>,
    pub lifecycle: Arc<SessionLifecycle>,
    pub make_choice: Arc<MakeChoice>,
}

impl StoryHarness {
    /// Harness whose story generator must not be called.
    pub async fn new() -> Self {
        Self::build(MockLlmPort::new(), EngineConfig::default()).await
    }

    pub async fn with_llm(llm: MockLlmPort) -> Self {
        Self::build(llm, EngineConfig::default()).await
    }

    pub async fn with_config(config: EngineConfig) -> Self {
        Self::build(MockLlmPort::new(), config).await
    }

    async fn build(llm: MockLlmPort, config: EngineConfig) -> Self {
        let store = SqliteStore::in_memory().await.expect("in-memory store");
        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .expect("valid start time");
        let clock = Arc::new(SteppingClock::new(start));
        let clock_port: Arc<dyn ClockPort> = clock.clone();

        let app = Arc::new(App::with_ports(
            Repositories::sqlite(&store),
            Arc::new(llm),
            clock_port,
            Arc::new(SystemRandom::new()),
            &config,
        ));

        Self {
            resolver: app.use_cases.story.resolver.clone(),
            timeline: app.use_cases.story.timeline.clone(),
            mutations: app.use_cases.story.mutations.clone(),
            lifecycle: app.use_cases.session.lifecycle.clone(),
            make_choice: app.use_cases.make_choice.clone(),
            app,
            store,
            clock,
        }
    }

    /// Start a session through the lifecycle use case.
    pub async fn start(&self, opening: &str) -> StartedSession {
        self.lifecycle
            .start(None, StoryContent::new(opening).expect("valid opening"))
            .await
            .expect("start session")
    }

    /// Insert a session whose root sits on a caller-chosen branch.
    pub async fn seed_session(&self, branch: &str, opening: &str) -> (GameSession, PathNode) {
        let session_id = GameSessionId::new();
        let now = self.clock.now();
        let root = PathNode::root(
            PathNodeId::new(),
            session_id,
            BranchId::new(branch).expect("valid branch"),
            StoryContent::new(opening).expect("valid opening"),
            now,
        )
        .activated();
        let session = GameSession::new(session_id, now).with_current_node(root.id);

        self.store
            .session_repo()
            .create_with_root(&session, &root)
            .await
            .expect("seed session");
        (session, root)
    }

    pub async fn node(&self, id: PathNodeId) -> PathNode {
        self.timeline.get_node(id).await.expect("node exists")
    }

    pub async fn history(&self, session_id: GameSessionId) -> PathHistory {
        self.timeline
            .get_path_history(session_id)
            .await
            .expect("path history")
    }

    pub async fn session(&self, session_id: GameSessionId) -> GameSession {
        self.lifecycle.get(session_id).await.expect("session exists")
    }

    /// Ids of the session's active nodes in timeline order.
    pub async fn active_ids(&self, session_id: GameSessionId) -> Vec<PathNodeId> {
        self.history(session_id)
            .await
            .all_nodes
            .into_iter()
            .filter(|n| n.is_active)
            .map(|n| n.id)
            .collect()
    }
}

pub fn content(text: &str) -> StoryContent {
    StoryContent::new(text).expect("valid content")
}
