//! Session use cases.
//!
//! Starting, listing, and ending playthroughs.

use std::sync::Arc;

mod lifecycle;

pub use lifecycle::{SessionLifecycle, StartedSession, DEFAULT_SESSION_PAGE, MAX_SESSION_PAGE};

/// Container for session use cases.
pub struct SessionUseCases {
    pub lifecycle: Arc<SessionLifecycle>,
}

impl SessionUseCases {
    pub fn new(lifecycle: Arc<SessionLifecycle>) -> Self {
        Self { lifecycle }
    }
}
