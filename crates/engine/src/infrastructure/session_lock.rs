//! Per-session mutation locks.
//!
//! Every operation that creates nodes or rewrites the active path takes the
//! session's lock first, so two requests for the same session never
//! interleave their read-then-write steps. Different sessions never contend.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use storyweave_domain::GameSessionId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock table is pruned once it grows past this many entries.
const PRUNE_THRESHOLD: usize = 1024;

/// Held for the duration of one mutation. Dropping it releases the session.
pub type SessionGuard = OwnedMutexGuard<()>;

#[derive(Debug, thiserror::Error)]
#[error("Timed out after {timeout:?} waiting for session {session_id}")]
pub struct LockTimeout {
    pub session_id: GameSessionId,
    pub timeout: Duration,
}

pub struct SessionLocks {
    locks: DashMap<GameSessionId, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl SessionLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    /// Wait for exclusive access to a session, up to the configured timeout.
    pub async fn acquire(&self, session_id: GameSessionId) -> Result<SessionGuard, LockTimeout> {
        let lock = {
            let entry = self
                .locks
                .entry(session_id)
                .or_insert_with(|| Arc::new(Mutex::new(())));
            Arc::clone(entry.value())
        };

        let guard = tokio::time::timeout(self.timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!(
                    session_id = %session_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Session lock wait timed out"
                );
                LockTimeout {
                    session_id,
                    timeout: self.timeout,
                }
            })?;

        if self.locks.len() > PRUNE_THRESHOLD {
            self.prune_idle();
        }

        Ok(guard)
    }

    /// Drop lock entries nobody holds or waits on.
    pub fn prune_idle(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
