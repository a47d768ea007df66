//! Storyweave domain types.
//!
//! Plain records for story sessions and their branching paths. No I/O lives
//! here: persistence, locking, and generation are engine concerns.

extern crate self as storyweave_domain;

pub mod entities;
pub mod error;
pub mod ids;
pub mod value_objects;

pub use entities::{GameSession, PathNode};

pub use error::DomainError;

// Re-export ID types
pub use ids::{GameSessionId, PathNodeId};

// Re-export value objects
pub use value_objects::{BranchId, ChoiceText, StoryContent, BRANCH_ID_PREFIX};
