//! Application state and composition.

use std::sync::Arc;

use crate::entities::{Sessions, StoryPath};
use crate::infrastructure::{
    clock::{SystemClock, SystemRandom},
    config::EngineConfig,
    ports::{ClockPort, GameSessionRepo, LlmPort, PathNodeRepo, RandomPort},
    session_lock::SessionLocks,
    sqlite::SqliteStore,
};
use crate::use_cases::{
    self,
    session::SessionLifecycle,
    story::{BranchMutations, BranchResolver, TimelineNavigator},
    MakeChoice,
};

/// Main application state.
///
/// Holds the repository ports and use cases.
/// Passed to HTTP handlers via Axum state.
pub struct App {
    pub repositories: Repositories,
    pub use_cases: UseCases,
}

/// Container for the repository ports.
pub struct Repositories {
    pub sessions: Arc<dyn GameSessionRepo>,
    pub path_nodes: Arc<dyn PathNodeRepo>,
}

impl Repositories {
    pub fn sqlite(store: &SqliteStore) -> Self {
        Self {
            sessions: Arc::new(store.session_repo()),
            path_nodes: Arc::new(store.path_node_repo()),
        }
    }
}

/// Container for all use cases.
pub struct UseCases {
    pub story: use_cases::StoryUseCases,
    pub session: use_cases::SessionUseCases,
    pub make_choice: Arc<MakeChoice>,
}

impl App {
    /// Create a new App wired with the system clock and random source.
    pub fn new(repositories: Repositories, llm: Arc<dyn LlmPort>, config: &EngineConfig) -> Self {
        Self::with_ports(
            repositories,
            llm,
            Arc::new(SystemClock::new()),
            Arc::new(SystemRandom::new()),
            config,
        )
    }

    /// Create a new App with explicit clock and random ports.
    pub fn with_ports(
        repositories: Repositories,
        llm: Arc<dyn LlmPort>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
        config: &EngineConfig,
    ) -> Self {
        let locks = Arc::new(SessionLocks::new(config.lock_timeout));

        // Entities
        let story_path = Arc::new(StoryPath::new(
            repositories.path_nodes.clone(),
            clock.clone(),
            random.clone(),
        ));
        let sessions = Arc::new(Sessions::new(repositories.sessions.clone()));

        // Story branch protocol
        let resolver = Arc::new(BranchResolver::new(
            story_path.clone(),
            sessions.clone(),
            clock.clone(),
            config.max_chain_depth,
        ));
        let timeline = Arc::new(TimelineNavigator::new(
            resolver.clone(),
            story_path.clone(),
            sessions.clone(),
        ));
        let mutations = Arc::new(BranchMutations::new(
            resolver.clone(),
            story_path.clone(),
            locks.clone(),
            clock.clone(),
        ));

        let lifecycle = Arc::new(SessionLifecycle::new(
            sessions,
            story_path,
            locks,
            clock,
            random,
        ));
        let make_choice = Arc::new(MakeChoice::new(
            resolver.clone(),
            timeline.clone(),
            mutations.clone(),
            llm,
        ));

        let use_cases = UseCases {
            story: use_cases::StoryUseCases::new(resolver, timeline, mutations),
            session: use_cases::SessionUseCases::new(lifecycle),
            make_choice,
        };

        Self {
            repositories,
            use_cases,
        }
    }
}
