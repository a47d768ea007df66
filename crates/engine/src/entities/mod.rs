//! Entity modules - Domain capability encapsulation.
//!
//! Each module wraps operations for a domain entity type.
//! They depend on repository ports and provide the building blocks for use cases.

pub mod game_session;
pub mod story_path;

pub use game_session::Sessions;
pub use story_path::{CreateNodeError, StoryPath};
