//! Story path use cases.
//!
//! The branch protocol: resolving the active path, reading the timeline, and
//! the advance/diverge/switch mutations built on both.

use std::sync::Arc;

mod error;
mod mutation;
mod resolver;
mod timeline;

#[cfg(test)]
mod scenario_tests;

pub use error::StoryPathError;
pub use mutation::{BranchMutations, StepInput};
pub use resolver::BranchResolver;
pub use timeline::{PathHistory, TimelineNavigator};

/// Container for story path use cases.
pub struct StoryUseCases {
    pub resolver: Arc<BranchResolver>,
    pub timeline: Arc<TimelineNavigator>,
    pub mutations: Arc<BranchMutations>,
}

impl StoryUseCases {
    pub fn new(
        resolver: Arc<BranchResolver>,
        timeline: Arc<TimelineNavigator>,
        mutations: Arc<BranchMutations>,
    ) -> Self {
        Self {
            resolver,
            timeline,
            mutations,
        }
    }
}
